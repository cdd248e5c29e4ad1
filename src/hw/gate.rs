/*
 * This file is part of psumon.
 *
 * Copyright (C) 2025 psumon contributors
 *
 * psumon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 2 of the License, or
 * (at your option) any later version.
 *
 * psumon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with psumon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Power-good gate
//!
//! Touching a PSU whose output rail has failed can wedge its microcontroller, so
//! the poll engine asks a gate before every transaction. The gate is supplied by
//! the platform (typically a CPLD exposing PSU status bits) and registered per
//! device; with no gate registered the engine assumes power is good.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// External source of PSU power-good and presence status
pub trait PowerGoodGate: Send + Sync {
    fn get_powergood(&self) -> bool;

    fn get_presence(&self) -> bool;
}

/// Gate backed by sysfs-style status files containing `0` or `1`
///
/// Unreadable or malformed files count as "not good" / "absent".
#[derive(Debug, Clone)]
pub struct SysfsStatusGate {
    powergood_path: PathBuf,
    presence_path: Option<PathBuf>,
}

impl SysfsStatusGate {
    pub fn new(powergood_path: impl Into<PathBuf>, presence_path: Option<PathBuf>) -> Self {
        Self {
            powergood_path: powergood_path.into(),
            presence_path,
        }
    }

    fn read_flag(path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(content) => match content.trim().parse::<i64>() {
                Ok(value) => value != 0,
                Err(e) => {
                    debug!("Malformed status in {}: {:?} ({})", path.display(), content.trim(), e);
                    false
                }
            },
            Err(e) => {
                debug!("Failed to read {}: {}", path.display(), e);
                false
            }
        }
    }
}

impl PowerGoodGate for SysfsStatusGate {
    fn get_powergood(&self) -> bool {
        Self::read_flag(&self.powergood_path)
    }

    /// Without a presence file the PSU is assumed present while power is good
    fn get_presence(&self) -> bool {
        match &self.presence_path {
            Some(path) => Self::read_flag(path),
            None => self.get_powergood(),
        }
    }
}
