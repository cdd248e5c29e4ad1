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

//! Raw register snapshot
//!
//! One `RegisterSnapshot` holds everything a poll cycle read, exactly as it came
//! off the bus. Strings are the only fields touched on the way in: the count byte
//! is stripped and the text is cut at its terminator.

use serde::Serialize;

use crate::constants::{status, TEMP_FAULT_SENTINEL};

/// Raw values of every register the poll engine reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub capability: u8,
    pub status_word: u16,
    pub fan_fault: u8,
    pub over_temp: u8,
    pub vout: u16,
    pub iout: u16,
    pub pout: u16,
    pub vout_mode: u8,
    pub temp_input: [u16; 3],
    pub fan_speed: u16,
    pub fan_duty_cycle: [u16; 2],
    pub fan_direction: String,
    pub pmbus_revision: u8,
    pub mfr_serial: String,
    pub mfr_id: String,
    pub mfr_model: String,
    pub mfr_revision: String,
    pub mfr_vin_min: u16,
    pub mfr_vin_max: u16,
    pub mfr_iin_max: u16,
    pub mfr_iout_max: u16,
    pub mfr_pin_max: u16,
    pub mfr_pout_max: u16,
    pub mfr_vout_min: u16,
    pub mfr_vout_max: u16,
}

impl RegisterSnapshot {
    /// Snapshot published when a cycle cannot complete.
    ///
    /// Everything is zero except the power-off and power-good-fail status bits,
    /// and every temperature channel carries the fault sentinel.
    pub fn fail_safe() -> Self {
        Self {
            status_word: status::OFF | status::POWER_GOOD_N,
            temp_input: [TEMP_FAULT_SENTINEL; 3],
            ..Self::default()
        }
    }

    /// True if this snapshot is exactly the fail-safe substitute
    pub fn is_fail_safe(&self) -> bool {
        *self == Self::fail_safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_safe_fields() {
        let snap = RegisterSnapshot::fail_safe();
        assert_eq!(snap.status_word & status::OFF, status::OFF);
        assert_eq!(snap.status_word & status::POWER_GOOD_N, status::POWER_GOOD_N);
        assert_eq!(snap.temp_input, [0x3FF, 0x3FF, 0x3FF]);
        assert_eq!(snap.vout, 0);
        assert_eq!(snap.fan_duty_cycle, [0, 0]);
        assert!(snap.mfr_model.is_empty());
        assert!(snap.is_fail_safe());
    }

    #[test]
    fn test_default_is_not_fail_safe() {
        assert!(!RegisterSnapshot::default().is_fail_safe());
    }
}
