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

//! PSU device
//!
//! `Psu` owns one attached power supply: the bus transport, the shared state
//! guarded by a single mutex, and the background acquisition task.
//!
//! # Locking
//!
//! `DeviceState` sits behind one coarse `parking_lot::Mutex`. The poll task
//! swaps a whole snapshot in under it, every read decodes under it, and both
//! setters mutate under it, so readers never see two cycles mixed together.
//! The lock is not held across a poll cycle's bus traffic, only around the
//! commit; the duty-cycle write is the one bus transaction issued with it held.
//!
//! # Lifecycle
//!
//! `attach` creates the state and starts polling; `detach` (or drop) stops the
//! task and waits for it to exit. Readers get `None` until the first cycle,
//! successful or fail-safe, has been committed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::attributes::{Attribute, AttributeValue};
use crate::constants::{registers, timing};
use crate::data::{validate_access_interval, validate_duty_cycle, ChipVariant, RegisterSnapshot};
use crate::engine::{CycleOutcome, PollEngine, PollTask};
use crate::error::{PsuError, Result};
use crate::hw::{BusTransport, PowerGoodGate};
use crate::logger;

const TASK_NAME: &str = "psu-poll";

/// Everything the poll task, the readers and the setters share
pub struct DeviceState {
    pub(crate) variant: ChipVariant,
    pub(crate) mfr_serial_supported: bool,
    /// Milliseconds slept before each bus transaction
    pub(crate) access_interval: u32,
    pub(crate) valid: bool,
    pub(crate) last_updated: Option<Instant>,
    pub(crate) registers: RegisterSnapshot,
    pub(crate) gate: Option<Arc<dyn PowerGoodGate>>,
    pub(crate) consecutive_failures: u32,
}

/// What changed when a cycle outcome was committed
#[derive(Debug, Default)]
struct Commit {
    reclassified: Option<(ChipVariant, ChipVariant)>,
    entered_fail_safe: bool,
    recovered_after: Option<u32>,
}

impl DeviceState {
    pub(crate) fn new(
        variant: ChipVariant,
        access_interval: Option<u32>,
        mfr_serial_supported: Option<bool>,
    ) -> Self {
        Self {
            variant,
            mfr_serial_supported: mfr_serial_supported
                .unwrap_or_else(|| variant.mfr_serial_supported()),
            access_interval: access_interval.unwrap_or_else(|| variant.default_access_interval()),
            valid: false,
            last_updated: None,
            registers: RegisterSnapshot::default(),
            gate: None,
            consecutive_failures: 0,
        }
    }

    /// Publish a cycle outcome. A reclassification is kept even when the
    /// cycle itself ended in the fail-safe snapshot.
    fn commit(&mut self, outcome: CycleOutcome) -> Commit {
        let mut commit = Commit::default();

        if let Some(next) = outcome.reclassified {
            if next != self.variant {
                commit.reclassified = Some((self.variant, next));
                self.variant = next;
            }
        }

        if outcome.abort.is_some() {
            self.consecutive_failures += 1;
            commit.entered_fail_safe = self.consecutive_failures == 1;
        } else {
            if self.consecutive_failures > 0 {
                commit.recovered_after = Some(self.consecutive_failures);
            }
            self.consecutive_failures = 0;
        }

        self.registers = outcome.snapshot;
        self.valid = true;
        self.last_updated = Some(Instant::now());
        commit
    }
}

/// Attach-time settings for a device
#[derive(Clone)]
pub struct DeviceOptions {
    pub variant: ChipVariant,
    /// Overrides the variant's default throttle
    pub access_interval: Option<u32>,
    /// Overrides the variant's serial-read support
    pub mfr_serial_supported: Option<bool>,
    pub refresh_interval: Duration,
    pub gate: Option<Arc<dyn PowerGoodGate>>,
}

impl DeviceOptions {
    pub fn new(variant: ChipVariant) -> Self {
        Self {
            variant,
            access_interval: None,
            mfr_serial_supported: None,
            refresh_interval: timing::REFRESH_INTERVAL,
            gate: None,
        }
    }

    pub fn with_access_interval(mut self, value: i64) -> Result<Self> {
        self.access_interval = Some(validate_access_interval(value)?);
        Ok(self)
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn PowerGoodGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_mfr_serial_supported(mut self, supported: bool) -> Self {
        self.mfr_serial_supported = Some(supported);
        self
    }
}

struct Shared<B> {
    bus: B,
    state: Mutex<DeviceState>,
    /// Keeps an explicit `poll_once` from interleaving with the task's cycle
    cycle_lock: Mutex<()>,
}

impl<B: BusTransport> Shared<B> {
    fn poll_cycle(&self) -> bool {
        let _cycle = self.cycle_lock.lock();

        let outcome = PollEngine::new(&self.bus, &self.state).run_cycle();
        let reason = outcome.abort.as_ref().map(|e| e.to_string());
        let commit = self.state.lock().commit(outcome);

        if let Some((from, to)) = commit.reclassified {
            info!("PSU reclassified from {} to {}", from, to);
            logger::log_event("variant_reclassified", json!({ "from": from, "to": to }));
        }
        match (&reason, commit.entered_fail_safe, commit.recovered_after) {
            (Some(reason), true, _) => {
                warn!("PSU poll failed ({}), publishing fail-safe snapshot", reason);
                logger::log_event("fail_safe_entered", json!({ "reason": reason }));
            }
            (Some(reason), false, _) => debug!("PSU poll still failing: {}", reason),
            (None, _, Some(cycles)) => {
                info!("PSU poll recovered after {} failed cycles", cycles);
                logger::log_event("fail_safe_recovered", json!({ "failed_cycles": cycles }));
            }
            (None, _, None) => {}
        }

        reason.is_none()
    }
}

/// An attached PSU
pub struct Psu<B: BusTransport + 'static> {
    shared: Arc<Shared<B>>,
    refresh_interval: Duration,
    task: Mutex<Option<PollTask>>,
}

impl<B: BusTransport + 'static> Psu<B> {
    /// Create the device without starting the poll task
    pub fn new(bus: B, options: DeviceOptions) -> Self {
        let mut state = DeviceState::new(
            options.variant,
            options.access_interval,
            options.mfr_serial_supported,
        );
        state.gate = options.gate;

        Self {
            shared: Arc::new(Shared {
                bus,
                state: Mutex::new(state),
                cycle_lock: Mutex::new(()),
            }),
            refresh_interval: options.refresh_interval,
            task: Mutex::new(None),
        }
    }

    /// Create the device and start polling
    pub fn attach(bus: B, options: DeviceOptions) -> Result<Self> {
        let psu = Self::new(bus, options);
        psu.start()?;
        Ok(psu)
    }

    /// Start the background task. No-op when it is already running.
    pub fn start(&self) -> Result<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        *task = Some(PollTask::spawn(TASK_NAME, self.refresh_interval, move || {
            shared.poll_cycle();
        })?);
        info!("PSU attached as {} (refresh {:?})", self.variant(), self.refresh_interval);
        Ok(())
    }

    /// Stop the background task and wait for it to exit. The cached snapshot
    /// stays readable.
    pub fn detach(&self) {
        let task = self.task.lock().take();
        if let Some(mut task) = task {
            task.stop();
            info!("PSU detached");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.task.lock().as_ref().map_or(false, PollTask::is_running)
    }

    /// Run one cycle on the calling thread. Returns false if it ended in the
    /// fail-safe snapshot.
    pub fn poll_once(&self) -> bool {
        self.shared.poll_cycle()
    }

    pub fn bus(&self) -> &B {
        &self.shared.bus
    }

    // ------------------------------------------------------------------------
    // Power gate
    // ------------------------------------------------------------------------

    /// Register or clear the power-good/presence source
    pub fn set_power_gate(&self, gate: Option<Arc<dyn PowerGoodGate>>) {
        self.shared.state.lock().gate = gate;
    }

    /// Presence as reported by the gate; `None` without one
    pub fn is_present(&self) -> Option<bool> {
        let gate = self.shared.state.lock().gate.clone();
        gate.map(|gate| gate.get_presence())
    }

    // ------------------------------------------------------------------------
    // Cache state
    // ------------------------------------------------------------------------

    pub fn is_valid(&self) -> bool {
        self.shared.state.lock().valid
    }

    pub fn last_updated(&self) -> Option<Instant> {
        self.shared.state.lock().last_updated
    }

    pub fn variant(&self) -> ChipVariant {
        self.shared.state.lock().variant
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Copy of the raw cached registers, once valid
    pub fn snapshot(&self) -> Option<RegisterSnapshot> {
        let state = self.shared.state.lock();
        state.valid.then(|| state.registers.clone())
    }

    // ------------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------------

    pub fn read(&self, attribute: Attribute) -> Option<AttributeValue> {
        attribute.decode(&self.shared.state.lock())
    }

    pub fn read_by_name(&self, name: &str) -> Result<Option<AttributeValue>> {
        let attribute = Attribute::from_name(name)
            .ok_or_else(|| PsuError::UnknownAttribute(name.to_string()))?;
        Ok(self.read(attribute))
    }

    fn read_int(&self, attribute: Attribute) -> Option<i64> {
        self.read(attribute).and_then(|v| v.as_int())
    }

    fn read_text(&self, attribute: Attribute) -> Option<String> {
        match self.read(attribute)? {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Int(_) => None,
        }
    }

    pub fn power_on(&self) -> Option<bool> {
        self.read_int(Attribute::PowerOn).map(|v| v != 0)
    }

    pub fn power_good(&self) -> Option<bool> {
        self.read_int(Attribute::PowerGood).map(|v| v != 0)
    }

    pub fn temp_fault(&self) -> Option<bool> {
        self.read_int(Attribute::TempFault).map(|v| v != 0)
    }

    /// Output voltage in millivolts
    pub fn vout(&self) -> Option<i64> {
        self.read_int(Attribute::Vout)
    }

    /// Output current in milliamps
    pub fn iout(&self) -> Option<i64> {
        self.read_int(Attribute::Iout)
    }

    /// Output power in milliwatts
    pub fn pout(&self) -> Option<i64> {
        self.read_int(Attribute::Pout)
    }

    /// Temperature in millidegrees for channel 1..=3
    pub fn temperature(&self, channel: usize) -> Option<i64> {
        let attribute = match channel {
            1 => Attribute::Temp1Input,
            2 => Attribute::Temp2Input,
            3 => Attribute::Temp3Input,
            _ => return None,
        };
        self.read_int(attribute)
    }

    pub fn fan_speed(&self) -> Option<i64> {
        self.read_int(Attribute::Fan1Speed)
    }

    pub fn fan_duty_cycle(&self) -> Option<i64> {
        self.read_int(Attribute::Fan1DutyCycle)
    }

    pub fn fan_direction(&self) -> Option<String> {
        self.read_text(Attribute::FanDirection)
    }

    pub fn mfr_model(&self) -> Option<String> {
        self.read_text(Attribute::MfrModel)
    }

    pub fn mfr_serial(&self) -> Option<String> {
        self.read_text(Attribute::MfrSerial)
    }

    /// Every attribute, decoded under one lock, keyed by exported name
    pub fn report(&self) -> Value {
        let state = self.shared.state.lock();
        let map: Map<String, Value> = Attribute::all()
            .map(|attribute| {
                let value = attribute.decode(&state).map_or(Value::Null, |v| json!(v));
                (attribute.name().to_string(), value)
            })
            .collect();
        Value::Object(map)
    }

    // ------------------------------------------------------------------------
    // Write surface
    // ------------------------------------------------------------------------

    /// Set fan 1 duty cycle (0-100).
    ///
    /// The cached value changes immediately and one FAN_COMMAND_1 write is
    /// issued. A failed write is logged; the cache is not rolled back and the
    /// next cycle reads the device's real value.
    pub fn set_fan_duty_cycle(&self, value: i64) -> Result<()> {
        let duty = validate_duty_cycle(value)?;

        let result = {
            let mut state = self.shared.state.lock();
            state.registers.fan_duty_cycle[0] = duty;
            self.shared.bus.write_word(registers::FAN_COMMAND_1, duty)
        };

        if let Err(e) = result {
            warn!("Failed to write fan duty cycle {}: {}", duty, e);
            logger::log_event(
                "duty_cycle_write_failed",
                json!({ "value": duty, "error": e.to_string() }),
            );
        }
        Ok(())
    }

    pub fn access_interval(&self) -> u32 {
        self.shared.state.lock().access_interval
    }

    /// Set the per-transaction throttle in milliseconds (0-120)
    pub fn set_access_interval(&self, value: i64) -> Result<()> {
        let interval = validate_access_interval(value)?;
        self.shared.state.lock().access_interval = interval;
        debug!("Access interval set to {} ms", interval);
        Ok(())
    }

    /// Write a textual value to a writable attribute
    pub fn write(&self, attribute: Attribute, value: &str) -> Result<()> {
        let parsed = value.trim().parse::<i64>().map_err(|_| PsuError::InvalidAttributeValue {
            attribute: attribute.name().to_string(),
            value: value.to_string(),
        });

        match attribute {
            Attribute::Fan1DutyCycle => self.set_fan_duty_cycle(parsed?),
            Attribute::AccessInterval => self.set_access_interval(parsed?),
            _ => Err(PsuError::ReadOnlyAttribute(attribute.name().to_string())),
        }
    }

    pub fn write_by_name(&self, name: &str, value: &str) -> Result<()> {
        let attribute = Attribute::from_name(name)
            .ok_or_else(|| PsuError::UnknownAttribute(name.to_string()))?;
        self.write(attribute, value)
    }
}

impl<B: BusTransport + 'static> Drop for Psu<B> {
    fn drop(&mut self) {
        self.detach();
    }
}
