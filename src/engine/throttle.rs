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

//! Access-interval throttle
//!
//! Some PSU microcontrollers miss transactions when polled back to back. The
//! access interval is a pause inserted before every transaction of a cycle, so
//! a throttled cycle costs `interval * transactions` on top of the bus time.
//!
//! The pause always comes before the power-good check: a rail that fails while
//! we sleep must still stop the next transaction.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::DeviceState;

/// Reads the live access interval and power gate from the shared device state
pub struct IntervalThrottle<'a> {
    state: &'a Mutex<DeviceState>,
}

impl<'a> IntervalThrottle<'a> {
    pub fn new(state: &'a Mutex<DeviceState>) -> Self {
        Self { state }
    }

    /// Current pause per transaction; re-read every time so a setter takes
    /// effect in the middle of a cycle.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.state.lock().access_interval as u64)
    }

    pub fn pause(&self) {
        let interval = self.interval();
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    /// Ask the registered gate; fail-open when none is registered.
    ///
    /// The gate is cloned out so it is never called with the state lock held.
    pub fn power_good(&self) -> bool {
        let gate = self.state.lock().gate.clone();
        gate.map_or(true, |gate| gate.get_powergood())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ChipVariant;
    use crate::test_utils::SwitchGate;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_zero_interval_does_not_sleep() {
        let state = Mutex::new(DeviceState::new(ChipVariant::Ym2651, None, None));
        let throttle = IntervalThrottle::new(&state);
        assert_eq!(throttle.interval(), Duration::ZERO);

        let start = Instant::now();
        for _ in 0..100 {
            throttle.pause();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_interval_is_read_live() {
        let state = Mutex::new(DeviceState::new(ChipVariant::Ym1151d, None, None));
        let throttle = IntervalThrottle::new(&state);
        assert_eq!(throttle.interval(), Duration::from_millis(60));

        state.lock().access_interval = 5;
        let start = Instant::now();
        throttle.pause();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_power_good_fail_open_and_gate() {
        let state = Mutex::new(DeviceState::new(ChipVariant::Ym2651, None, None));
        let throttle = IntervalThrottle::new(&state);
        assert!(throttle.power_good());

        let gate = Arc::new(SwitchGate::new(false));
        state.lock().gate = Some(gate.clone());
        assert!(!throttle.power_good());
        gate.set(true);
        assert!(throttle.power_good());
        assert_eq!(gate.powergood_calls(), 2);
    }
}
