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

//! Constants for psumon
//!
//! Centralizes register addresses, limits, buffer capacities and timing defaults.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// PMBus command codes read or written by the poll engine
pub mod registers {
    pub const FAN_COMMAND_1: u8 = 0x3B;
    pub const FAN_COMMAND_2: u8 = 0x3C;
    pub const CAPABILITY: u8 = 0x19;
    pub const VOUT_MODE: u8 = 0x20;
    pub const STATUS_WORD: u8 = 0x79;
    pub const STATUS_TEMPERATURE: u8 = 0x7D;
    pub const STATUS_FANS_1_2: u8 = 0x81;
    pub const READ_VOUT: u8 = 0x8B;
    pub const READ_IOUT: u8 = 0x8C;
    pub const READ_TEMPERATURE_1: u8 = 0x8D;
    pub const READ_TEMPERATURE_2: u8 = 0x8E;
    pub const READ_TEMPERATURE_3: u8 = 0x8F;
    pub const READ_FAN_SPEED_1: u8 = 0x90;
    pub const READ_POUT: u8 = 0x96;
    pub const PMBUS_REVISION: u8 = 0x98;
    pub const MFR_ID: u8 = 0x99;
    pub const MFR_MODEL: u8 = 0x9A;
    pub const MFR_REVISION: u8 = 0x9B;
    pub const MFR_SERIAL: u8 = 0x9E;
    pub const MFR_VIN_MIN: u8 = 0xA0;
    pub const MFR_VIN_MAX: u8 = 0xA1;
    pub const MFR_IIN_MAX: u8 = 0xA2;
    pub const MFR_PIN_MAX: u8 = 0xA3;
    pub const MFR_VOUT_MIN: u8 = 0xA4;
    pub const MFR_VOUT_MAX: u8 = 0xA5;
    pub const MFR_IOUT_MAX: u8 = 0xA6;
    pub const MFR_POUT_MAX: u8 = 0xA7;
    /// Vendor-specific fan airflow direction block
    pub const MFR_FAN_DIRECTION: u8 = 0xC3;
}

/// STATUS_WORD bits consumed by the read surface
pub mod status {
    /// Bit 6: unit is off (0 = on, 1 = off)
    pub const OFF: u16 = 0x0040;
    /// Bit 2: temperature fault or warning
    pub const TEMPERATURE: u16 = 0x0004;
    /// Bit 11: power-good negated (0 = ok, 1 = fail)
    pub const POWER_GOOD_N: u16 = 0x0800;
    pub const TEMPERATURE_SHIFT: u16 = 2;
}

/// Bit position of the fan-1 fault flag in STATUS_FANS_1_2
pub const FAN1_FAULT_SHIFT: u8 = 7;

/// Bit position of the over-temperature fault flag in STATUS_TEMPERATURE
pub const OVER_TEMP_SHIFT: u8 = 7;

/// Raw temperature word substituted on every channel by the fail-safe snapshot
pub const TEMP_FAULT_SENTINEL: u16 = 0x3FF;

/// Length byte value reported by devices that have no string for a field
pub const BLOCK_LENGTH_ABSENT: u8 = 0xFF;

/// Model prefix that reclassifies a device as YM-1401A
pub const YM1401A_MODEL_PREFIX: &str = "YM-1401A";

/// Fan direction reported unconditionally by the YPEB1200AM
pub const YPEB1200AM_FAN_DIRECTION: &str = "F2B";

/// Destination capacities of the string registers, terminator included
pub mod capacity {
    /// Scratch buffer the fan direction block is read into
    pub const FAN_DIRECTION_BLOCK: usize = 5;
    pub const MFR_SERIAL: usize = 21;
    pub const MFR_ID: usize = 10;
    pub const MFR_MODEL: usize = 16;
    pub const MFR_REVISION: usize = 3;
}

/// Fan duty cycle limits (percent)
pub mod duty_cycle {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 100;
}

/// Access interval (per-transaction throttle) limits and defaults, in milliseconds
pub mod access_interval {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 120;
    pub const YM1151D_DEFAULT: u32 = 60;
}

/// Unit multipliers applied by the attribute table
pub mod multiplier {
    pub const UNIT: i64 = 1;
    pub const MILLI: i64 = 1_000;
    pub const MICRO: i64 = 1_000_000;
}

/// Timing configuration
pub mod timing {
    use super::Duration;

    /// Target period of one background acquisition cycle
    pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3);
    pub const REFRESH_INTERVAL_MS: u64 = 3_000;
}

/// Bus configuration defaults
pub mod bus {
    /// Default SMBus addresses this PSU family answers on
    pub const NORMAL_ADDRESSES: &[u16] = &[0x58, 0x59, 0x5B];
    pub const MAX_7BIT_ADDRESS: u16 = 0x7F;
    /// Largest payload of an SMBus I2C block transfer
    pub const MAX_BLOCK_LEN: usize = 32;
}

/// Configuration file locations
pub mod paths {
    pub const CONFIG_DIR: &str = "/etc/psumon";
    pub const CONFIG_FILE: &str = "config.json";
    pub const EVENT_LOG: &str = "/var/log/psumon/events.json";
    pub const CONFIG_ENV: &str = "PSUMON_CONFIG";
}
