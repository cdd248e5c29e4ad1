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

//! psumon - PMBus power supply telemetry engine
//!
//! Polls a PSU over SMBus on a fixed cadence, decodes its PMBus registers on
//! demand, and keeps an always-available snapshot for any number of readers.
//! When the device cannot be read the snapshot degrades to a fail-safe image
//! (power off, power-good failed, temperatures at the fault sentinel) instead
//! of going stale.
//!
//! ```no_run
//! use psumon::{DeviceOptions, Psu, SmbusTransport, ChipVariant};
//!
//! let bus = SmbusTransport::open("/dev/i2c-10", 0x58)?;
//! let psu = Psu::attach(bus, DeviceOptions::new(ChipVariant::Ym2651))?;
//! if let Some(mv) = psu.vout() {
//!     println!("vout: {} mV", mv);
//! }
//! # Ok::<(), psumon::PsuError>(())
//! ```

pub mod attributes;
pub mod config;
pub mod constants;
pub mod data;
pub mod decode;
pub mod device;
pub mod engine;
pub mod error;
pub mod hw;
pub mod logger;

#[cfg(test)]
pub(crate) mod test_utils;

pub use attributes::{Attribute, AttributeValue};
pub use config::{config_path, load_config, validate_config, DeviceConfig, PowerGateConfig};
pub use data::{ChipVariant, RegisterSnapshot};
pub use device::{DeviceOptions, Psu};
pub use error::{PsuError, Result};
pub use hw::{BusError, BusTransport, PowerGoodGate, SmbusTransport, SysfsStatusGate};
