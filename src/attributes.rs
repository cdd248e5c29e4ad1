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

//! Attribute table
//!
//! Every value the read surface exposes is one `Attribute`. The static table
//! below maps each attribute to its exported name, how it is decoded from the
//! raw snapshot, and the unit multiplier applied on the way out:
//!
//! - voltages, currents, power and temperatures: milli-units (x1000)
//! - `power2_input`: micro-watts (x1000000), for lm-sensors
//! - fan speed (RPM) and duty cycle (percent): unscaled
//!
//! Decoding happens on demand, under the device lock, every time a value is
//! read. Nothing decoded is ever cached.

use std::fmt;

use serde::Serialize;

use crate::constants::{multiplier, status, FAN1_FAULT_SHIFT, OVER_TEMP_SHIFT};
use crate::data::RegisterSnapshot;
use crate::decode;
use crate::device::DeviceState;

/// Values exposed by a PSU device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    PowerOn,
    TempFault,
    PowerGood,
    Fan1Fault,
    FanDirection,
    OverTemp,
    Vout,
    Iout,
    Pout,
    PoutMicro,
    Temp1Input,
    Temp2Input,
    Temp3Input,
    Fan1Speed,
    Fan1DutyCycle,
    PmbusRevision,
    SerialNum,
    MfrId,
    MfrModel,
    MfrRevision,
    MfrSerial,
    MfrVinMin,
    MfrVinMax,
    MfrVoutMin,
    MfrVoutMax,
    MfrIinMax,
    MfrIoutMax,
    MfrPinMax,
    MfrPoutMax,
    AccessInterval,
}

/// How an attribute is produced from the raw snapshot
#[derive(Clone, Copy)]
enum Decode {
    /// 0/1 flag derived from a status register
    Flag(fn(&RegisterSnapshot) -> i64),
    /// LINEAR11 word
    Linear(fn(&RegisterSnapshot) -> u16),
    /// LINEAR11, or LINEAR16 with VOUT_MODE on variants that need it
    Voltage(fn(&RegisterSnapshot) -> u16),
    Byte(fn(&RegisterSnapshot) -> u8),
    Text(fn(&RegisterSnapshot) -> &str),
    /// Register string unless the variant reports a fixed direction
    FanDirection,
    /// Live throttle setting; readable before the first cycle
    Interval,
}

/// One row of the attribute table
pub struct AttributeSpec {
    pub attribute: Attribute,
    pub name: &'static str,
    decode: Decode,
    pub multiplier: i64,
    pub writable: bool,
}

const fn row(
    attribute: Attribute,
    name: &'static str,
    decode: Decode,
    multiplier: i64,
) -> AttributeSpec {
    AttributeSpec {
        attribute,
        name,
        decode,
        multiplier,
        writable: false,
    }
}

const fn writable(spec: AttributeSpec) -> AttributeSpec {
    AttributeSpec { writable: true, ..spec }
}

use Attribute as A;
use Decode as D;

/// Indexed by `Attribute as usize`; order must match the enum.
static ATTRIBUTES: [AttributeSpec; 30] = [
    row(
        A::PowerOn,
        "psu_power_on",
        D::Flag(|s| ((s.status_word & status::OFF) == 0) as i64),
        multiplier::UNIT,
    ),
    row(
        A::TempFault,
        "psu_temp_fault",
        D::Flag(|s| ((s.status_word & status::TEMPERATURE) >> status::TEMPERATURE_SHIFT) as i64),
        multiplier::UNIT,
    ),
    row(
        A::PowerGood,
        "psu_power_good",
        D::Flag(|s| ((s.status_word & status::POWER_GOOD_N) == 0) as i64),
        multiplier::UNIT,
    ),
    row(
        A::Fan1Fault,
        "psu_fan1_fault",
        D::Flag(|s| (s.fan_fault >> FAN1_FAULT_SHIFT) as i64),
        multiplier::UNIT,
    ),
    row(A::FanDirection, "psu_fan_dir", D::FanDirection, multiplier::UNIT),
    row(
        A::OverTemp,
        "psu_over_temp",
        D::Flag(|s| (s.over_temp >> OVER_TEMP_SHIFT) as i64),
        multiplier::UNIT,
    ),
    row(A::Vout, "psu_v_out", D::Voltage(|s| s.vout), multiplier::MILLI),
    row(A::Iout, "psu_i_out", D::Linear(|s| s.iout), multiplier::MILLI),
    row(A::Pout, "psu_p_out", D::Linear(|s| s.pout), multiplier::MILLI),
    row(A::PoutMicro, "power2_input", D::Linear(|s| s.pout), multiplier::MICRO),
    row(A::Temp1Input, "psu_temp1_input", D::Linear(|s| s.temp_input[0]), multiplier::MILLI),
    row(A::Temp2Input, "psu_temp2_input", D::Linear(|s| s.temp_input[1]), multiplier::MILLI),
    row(A::Temp3Input, "psu_temp3_input", D::Linear(|s| s.temp_input[2]), multiplier::MILLI),
    row(A::Fan1Speed, "psu_fan1_speed_rpm", D::Linear(|s| s.fan_speed), multiplier::UNIT),
    writable(row(
        A::Fan1DutyCycle,
        "psu_fan1_duty_cycle_percentage",
        D::Linear(|s| s.fan_duty_cycle[0]),
        multiplier::UNIT,
    )),
    row(A::PmbusRevision, "psu_pmbus_revision", D::Byte(|s| s.pmbus_revision), multiplier::UNIT),
    row(A::SerialNum, "psu_serial_num", D::Text(|s| s.mfr_serial.as_str()), multiplier::UNIT),
    row(A::MfrId, "psu_mfr_id", D::Text(|s| s.mfr_id.as_str()), multiplier::UNIT),
    row(A::MfrModel, "psu_mfr_model", D::Text(|s| s.mfr_model.as_str()), multiplier::UNIT),
    row(A::MfrRevision, "psu_mfr_revision", D::Text(|s| s.mfr_revision.as_str()), multiplier::UNIT),
    row(A::MfrSerial, "psu_mfr_serial", D::Text(|s| s.mfr_serial.as_str()), multiplier::UNIT),
    row(A::MfrVinMin, "psu_mfr_vin_min", D::Linear(|s| s.mfr_vin_min), multiplier::MILLI),
    row(A::MfrVinMax, "psu_mfr_vin_max", D::Linear(|s| s.mfr_vin_max), multiplier::MILLI),
    row(A::MfrVoutMin, "psu_mfr_vout_min", D::Voltage(|s| s.mfr_vout_min), multiplier::MILLI),
    row(A::MfrVoutMax, "psu_mfr_vout_max", D::Voltage(|s| s.mfr_vout_max), multiplier::MILLI),
    row(A::MfrIinMax, "psu_mfr_iin_max", D::Linear(|s| s.mfr_iin_max), multiplier::MILLI),
    row(A::MfrIoutMax, "psu_mfr_iout_max", D::Linear(|s| s.mfr_iout_max), multiplier::MILLI),
    row(A::MfrPinMax, "psu_mfr_pin_max", D::Linear(|s| s.mfr_pin_max), multiplier::MILLI),
    row(A::MfrPoutMax, "psu_mfr_pout_max", D::Linear(|s| s.mfr_pout_max), multiplier::MILLI),
    writable(row(A::AccessInterval, "psu_access_interval", D::Interval, multiplier::UNIT)),
];

/// Duplicate names expected by lm-sensors
static ALIASES: [(&str, Attribute); 9] = [
    ("in3_input", A::Vout),
    ("curr2_input", A::Iout),
    ("temp1_input", A::Temp1Input),
    ("temp2_input", A::Temp2Input),
    ("temp3_input", A::Temp3Input),
    ("fan1_input", A::Fan1Speed),
    ("temp1_fault", A::TempFault),
    ("temp2_fault", A::TempFault),
    ("temp3_fault", A::TempFault),
];

impl Attribute {
    /// All attributes in table order
    pub fn all() -> impl Iterator<Item = Attribute> {
        ATTRIBUTES.iter().map(|spec| spec.attribute)
    }

    pub fn spec(self) -> &'static AttributeSpec {
        &ATTRIBUTES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn is_writable(self) -> bool {
        self.spec().writable
    }

    /// Look up an attribute by its exported name or an lm-sensors alias
    pub fn from_name(name: &str) -> Option<Attribute> {
        ATTRIBUTES
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.attribute)
            .or_else(|| ALIASES.iter().find(|(alias, _)| *alias == name).map(|(_, attr)| *attr))
    }

    /// Alias names that resolve to this attribute
    pub fn aliases(self) -> impl Iterator<Item = &'static str> {
        ALIASES.iter().filter(move |(_, attr)| *attr == self).map(|(alias, _)| *alias)
    }

    /// Decode this attribute from the device state.
    ///
    /// `None` means "not ready": no cycle has completed yet.
    pub(crate) fn decode(self, state: &DeviceState) -> Option<AttributeValue> {
        let spec = self.spec();
        if let D::Interval = spec.decode {
            return Some(AttributeValue::Int(state.access_interval as i64));
        }
        if !state.valid {
            return None;
        }

        let snap = &state.registers;
        let value = match spec.decode {
            D::Flag(flag) => AttributeValue::Int(flag(snap)),
            D::Linear(word) => AttributeValue::Int(decode::linear11(word(snap), spec.multiplier)),
            D::Voltage(word) if state.variant.uses_vout_mode() => {
                AttributeValue::Int(decode::linear16(word(snap), snap.vout_mode, spec.multiplier))
            }
            D::Voltage(word) => AttributeValue::Int(decode::linear11(word(snap), spec.multiplier)),
            D::Byte(byte) => AttributeValue::Int(byte(snap) as i64),
            D::Text(text) => AttributeValue::Text(text(snap).to_string()),
            D::FanDirection => {
                let direction = state
                    .variant
                    .fixed_fan_direction()
                    .unwrap_or(snap.fan_direction.as_str());
                AttributeValue::Text(direction.to_string())
            }
            D::Interval => AttributeValue::Int(state.access_interval as i64),
        };
        Some(value)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Text(String),
}

impl AttributeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Int(_) => None,
            AttributeValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}
