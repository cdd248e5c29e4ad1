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

//! Chip variants
//!
//! The PSU family shares one register map but the models disagree on a few
//! details: which temperature channels exist, how VOUT is encoded, and whether
//! the serial number register can be read. Every such decision is answered here
//! so the poll engine and the read surface only ever ask the variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{access_interval, YM1401A_MODEL_PREFIX, YPEB1200AM_FAN_DIRECTION};
use crate::error::PsuError;

/// Supported power supply models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipVariant {
    #[serde(rename = "ym2651")]
    Ym2651,
    #[serde(rename = "ym2401")]
    Ym2401,
    #[serde(rename = "ym2851")]
    Ym2851,
    #[serde(rename = "ym1401a")]
    Ym1401a,
    #[serde(rename = "ype1200am")]
    Ypeb1200am,
    #[serde(rename = "ym1151d")]
    Ym1151d,
    #[serde(rename = "umec_upd150sa")]
    UmecUpd150sa,
    #[serde(rename = "umec_up1k21r")]
    UmecUp1k21r,
}

/// Models whose MFR_SERIAL register is safe to read. No shipping model is
/// listed; a device config can still opt in.
const MFR_SERIAL_SUPPORTED: &[ChipVariant] = &[];

impl ChipVariant {
    pub const ALL: [ChipVariant; 8] = [
        ChipVariant::Ym2651,
        ChipVariant::Ym2401,
        ChipVariant::Ym2851,
        ChipVariant::Ym1401a,
        ChipVariant::Ypeb1200am,
        ChipVariant::Ym1151d,
        ChipVariant::UmecUpd150sa,
        ChipVariant::UmecUp1k21r,
    ];

    /// Device id name, as used in configuration files
    pub fn id_name(self) -> &'static str {
        match self {
            ChipVariant::Ym2651 => "ym2651",
            ChipVariant::Ym2401 => "ym2401",
            ChipVariant::Ym2851 => "ym2851",
            ChipVariant::Ym1401a => "ym1401a",
            ChipVariant::Ypeb1200am => "ype1200am",
            ChipVariant::Ym1151d => "ym1151d",
            ChipVariant::UmecUpd150sa => "umec_upd150sa",
            ChipVariant::UmecUp1k21r => "umec_up1k21r",
        }
    }

    /// Access interval applied at attach time
    pub fn default_access_interval(self) -> u32 {
        match self {
            ChipVariant::Ym1151d => access_interval::YM1151D_DEFAULT,
            _ => 0,
        }
    }

    /// Whether READ_TEMPERATURE_2/3 exist. Reading them on other models can
    /// upset the PSU firmware, so they are skipped outright.
    pub fn has_extra_temperatures(self) -> bool {
        matches!(self, ChipVariant::UmecUpd150sa | ChipVariant::UmecUp1k21r)
    }

    /// Whether VOUT and its limits are LINEAR16 scaled by VOUT_MODE
    pub fn uses_vout_mode(self) -> bool {
        matches!(self, ChipVariant::Ym2401 | ChipVariant::Ym1401a)
    }

    pub fn mfr_serial_supported(self) -> bool {
        MFR_SERIAL_SUPPORTED.contains(&self)
    }

    /// Whether a cycle should read MFR_SERIAL. YM-1401A never answers it.
    pub fn reads_serial(self, serial_supported: bool) -> bool {
        serial_supported && self != ChipVariant::Ym1401a
    }

    /// Fan direction this model reports regardless of the register
    pub fn fixed_fan_direction(self) -> Option<&'static str> {
        match self {
            ChipVariant::Ypeb1200am => Some(YPEB1200AM_FAN_DIRECTION),
            _ => None,
        }
    }

    /// The variant a decoded model string proves this device to be, if it
    /// differs from the current one. YM-1401A is terminal.
    pub fn reclassified_by_model(self, model: &str) -> Option<ChipVariant> {
        if self != ChipVariant::Ym1401a && model.starts_with(YM1401A_MODEL_PREFIX) {
            Some(ChipVariant::Ym1401a)
        } else {
            None
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_name())
    }
}

impl FromStr for ChipVariant {
    type Err = PsuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ChipVariant::ALL
            .iter()
            .copied()
            .find(|v| v.id_name() == wanted)
            .ok_or_else(|| PsuError::UnknownVariant(s.to_string()))
    }
}
