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

//! Poll cycle
//!
//! One cycle reads the PSU register set in a fixed order and yields either a
//! complete `RegisterSnapshot` or the fail-safe substitute.
//!
//! # Step classes
//!
//! - **Mandatory** (byte and word registers): any failure aborts the cycle.
//! - **Tolerant** (string blocks): a bus failure leaves that field empty.
//! - **Gate**: before every transaction the throttle pauses and the power-good
//!   gate is asked; "not good" aborts the cycle whatever the step class.
//!
//! Mandatory steps return `Result<_, StepError>` and the cycle driver stops at
//! the first `Err` with `?`. Tolerant steps go through `tolerate`, which turns
//! bus errors into `None` and passes gate aborts through.

use parking_lot::Mutex;
use tracing::{debug, info};

use super::throttle::IntervalThrottle;
use crate::constants::{capacity, registers, BLOCK_LENGTH_ABSENT};
use crate::data::{ChipVariant, RegisterSnapshot};
use crate::decode;
use crate::device::DeviceState;
use crate::hw::{BusError, BusTransport};

/// Single-byte registers, in bus order
const BYTE_REGISTERS: [u8; 5] = [
    registers::CAPABILITY,
    registers::VOUT_MODE,
    registers::STATUS_TEMPERATURE,
    registers::STATUS_FANS_1_2,
    registers::PMBUS_REVISION,
];

/// Word registers, in bus order
const WORD_REGISTERS: [u8; 18] = [
    registers::STATUS_WORD,
    registers::READ_VOUT,
    registers::READ_IOUT,
    registers::READ_POUT,
    registers::READ_TEMPERATURE_1,
    registers::READ_TEMPERATURE_2,
    registers::READ_TEMPERATURE_3,
    registers::FAN_COMMAND_1,
    registers::FAN_COMMAND_2,
    registers::READ_FAN_SPEED_1,
    registers::MFR_VIN_MIN,
    registers::MFR_VIN_MAX,
    registers::MFR_IIN_MAX,
    registers::MFR_PIN_MAX,
    registers::MFR_VOUT_MIN,
    registers::MFR_VOUT_MAX,
    registers::MFR_IOUT_MAX,
    registers::MFR_POUT_MAX,
];

/// Why a cycle step did not produce a value
#[derive(thiserror::Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("power is not good")]
    PowerNotGood,
}

/// Result of one poll cycle
#[derive(Debug)]
pub struct CycleOutcome {
    /// Snapshot to publish: the assembled one, or the fail-safe substitute
    pub snapshot: RegisterSnapshot,
    /// Variant the model string proved this device to be
    pub reclassified: Option<ChipVariant>,
    /// Mandatory failure that forced the fail-safe snapshot
    pub abort: Option<StepError>,
}

impl CycleOutcome {
    pub fn is_fail_safe(&self) -> bool {
        self.abort.is_some()
    }
}

/// Working state threaded through the steps of one cycle
struct Cycle {
    variant: ChipVariant,
    serial_supported: bool,
    reclassified: Option<ChipVariant>,
    snapshot: RegisterSnapshot,
}

/// Runs acquisition cycles against one device
pub struct PollEngine<'a, B: BusTransport + ?Sized> {
    bus: &'a B,
    state: &'a Mutex<DeviceState>,
    throttle: IntervalThrottle<'a>,
}

impl<'a, B: BusTransport + ?Sized> PollEngine<'a, B> {
    pub fn new(bus: &'a B, state: &'a Mutex<DeviceState>) -> Self {
        Self {
            bus,
            state,
            throttle: IntervalThrottle::new(state),
        }
    }

    /// Run one complete cycle. Never fails: mandatory failures yield the
    /// fail-safe snapshot.
    pub fn run_cycle(&self) -> CycleOutcome {
        let (variant, serial_supported) = {
            let state = self.state.lock();
            (state.variant, state.mfr_serial_supported)
        };

        let mut cycle = Cycle {
            variant,
            serial_supported,
            reclassified: None,
            snapshot: RegisterSnapshot::default(),
        };

        debug!("Starting {} update", variant);
        match self.acquire(&mut cycle) {
            Ok(()) => CycleOutcome {
                snapshot: cycle.snapshot,
                reclassified: cycle.reclassified,
                abort: None,
            },
            Err(e) => {
                debug!("Cycle aborted: {}", e);
                CycleOutcome {
                    snapshot: RegisterSnapshot::fail_safe(),
                    reclassified: cycle.reclassified,
                    abort: Some(e),
                }
            }
        }
    }

    fn acquire(&self, cycle: &mut Cycle) -> Result<(), StepError> {
        self.read_bytes(&mut cycle.snapshot)?;
        self.read_words(cycle.variant, &mut cycle.snapshot)?;

        let fan_direction = self.block_step(
            registers::MFR_FAN_DIRECTION,
            capacity::FAN_DIRECTION_BLOCK - 1,
        );
        if let Some(raw) = self.tolerate(fan_direction)? {
            cycle.snapshot.fan_direction =
                decode::block_string(&raw, capacity::FAN_DIRECTION_BLOCK);
        }

        if let Some(raw) =
            self.tolerate(self.block_step(registers::MFR_ID, capacity::MFR_ID - 1))?
        {
            cycle.snapshot.mfr_id = decode::block_string(&raw, capacity::MFR_ID);
        }

        if let Some(model) =
            self.read_counted_string(registers::MFR_MODEL, capacity::MFR_MODEL)?
        {
            cycle.snapshot.mfr_model = model;
        }

        if let Some(next) = cycle.variant.reclassified_by_model(&cycle.snapshot.mfr_model) {
            info!(
                "Model {:?} identifies a {} (was {})",
                cycle.snapshot.mfr_model, next, cycle.variant
            );
            cycle.variant = next;
            cycle.reclassified = Some(next);
            cycle.serial_supported = false;
        } else if cycle.variant.reads_serial(cycle.serial_supported) {
            if let Some(serial) =
                self.read_counted_string(registers::MFR_SERIAL, capacity::MFR_SERIAL)?
            {
                cycle.snapshot.mfr_serial = serial;
            }
        }

        let revision = self.block_step(registers::MFR_REVISION, capacity::MFR_REVISION - 1);
        if let Some(raw) = self.tolerate(revision)? {
            cycle.snapshot.mfr_revision = decode::block_string(&raw, capacity::MFR_REVISION);
        }

        Ok(())
    }

    /// Throttle, then check the gate. Runs before every transaction.
    fn admit(&self) -> Result<(), StepError> {
        self.throttle.pause();
        if self.throttle.power_good() {
            Ok(())
        } else {
            Err(StepError::PowerNotGood)
        }
    }

    /// Bus failures become `None`; gate aborts propagate.
    fn tolerate<T>(&self, result: Result<T, StepError>) -> Result<Option<T>, StepError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(StepError::Bus(e)) => {
                debug!("Ignoring failed optional read: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn read_bytes(&self, snapshot: &mut RegisterSnapshot) -> Result<(), StepError> {
        for command in BYTE_REGISTERS {
            self.admit()?;
            let value = self.bus.read_byte(command).map_err(|e| {
                debug!("reg {:#04x}, err {}", command, e);
                e
            })?;
            if let Some(slot) = byte_slot(snapshot, command) {
                *slot = value;
            }
        }
        Ok(())
    }

    fn read_words(
        &self,
        variant: ChipVariant,
        snapshot: &mut RegisterSnapshot,
    ) -> Result<(), StepError> {
        for command in WORD_REGISTERS {
            self.admit()?;

            let extra_temp = command == registers::READ_TEMPERATURE_2
                || command == registers::READ_TEMPERATURE_3;
            if extra_temp && !variant.has_extra_temperatures() {
                continue;
            }

            let value = self.bus.read_word(command).map_err(|e| {
                debug!("reg {:#04x}, err {}", command, e);
                e
            })?;
            if let Some(slot) = word_slot(snapshot, command) {
                *slot = value;
            }
        }
        Ok(())
    }

    /// One admitted block read that must return exactly `len` bytes
    fn block_step(&self, command: u8, len: usize) -> Result<Vec<u8>, StepError> {
        self.admit()?;
        let raw = self.bus.read_block(command, len)?;
        if raw.len() != len {
            return Err(BusError::ShortRead {
                command,
                expected: len,
                actual: raw.len(),
            }
            .into());
        }
        Ok(raw)
    }

    /// Two-step string read: the length byte first, then length + 1 bytes
    /// (count byte included). A length of 0xFF means "no string".
    fn read_counted_string(
        &self,
        command: u8,
        capacity: usize,
    ) -> Result<Option<String>, StepError> {
        let Some(head) = self.tolerate(self.block_step(command, 1))? else {
            return Ok(None);
        };

        let length = head[0];
        if length == BLOCK_LENGTH_ABSENT {
            return Ok(None);
        }

        let raw = self.tolerate(self.block_step(command, length as usize + 1))?;
        Ok(raw.map(|raw| decode::block_string(&raw, capacity)))
    }
}

fn byte_slot(snapshot: &mut RegisterSnapshot, command: u8) -> Option<&mut u8> {
    match command {
        registers::CAPABILITY => Some(&mut snapshot.capability),
        registers::VOUT_MODE => Some(&mut snapshot.vout_mode),
        registers::STATUS_TEMPERATURE => Some(&mut snapshot.over_temp),
        registers::STATUS_FANS_1_2 => Some(&mut snapshot.fan_fault),
        registers::PMBUS_REVISION => Some(&mut snapshot.pmbus_revision),
        _ => None,
    }
}

fn word_slot(snapshot: &mut RegisterSnapshot, command: u8) -> Option<&mut u16> {
    match command {
        registers::STATUS_WORD => Some(&mut snapshot.status_word),
        registers::READ_VOUT => Some(&mut snapshot.vout),
        registers::READ_IOUT => Some(&mut snapshot.iout),
        registers::READ_POUT => Some(&mut snapshot.pout),
        registers::READ_TEMPERATURE_1 => Some(&mut snapshot.temp_input[0]),
        registers::READ_TEMPERATURE_2 => Some(&mut snapshot.temp_input[1]),
        registers::READ_TEMPERATURE_3 => Some(&mut snapshot.temp_input[2]),
        registers::FAN_COMMAND_1 => Some(&mut snapshot.fan_duty_cycle[0]),
        registers::FAN_COMMAND_2 => Some(&mut snapshot.fan_duty_cycle[1]),
        registers::READ_FAN_SPEED_1 => Some(&mut snapshot.fan_speed),
        registers::MFR_VIN_MIN => Some(&mut snapshot.mfr_vin_min),
        registers::MFR_VIN_MAX => Some(&mut snapshot.mfr_vin_max),
        registers::MFR_IIN_MAX => Some(&mut snapshot.mfr_iin_max),
        registers::MFR_PIN_MAX => Some(&mut snapshot.mfr_pin_max),
        registers::MFR_VOUT_MIN => Some(&mut snapshot.mfr_vout_min),
        registers::MFR_VOUT_MAX => Some(&mut snapshot.mfr_vout_max),
        registers::MFR_IOUT_MAX => Some(&mut snapshot.mfr_iout_max),
        registers::MFR_POUT_MAX => Some(&mut snapshot.mfr_pout_max),
        _ => None,
    }
}
