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

//! Acquisition engine
//!
//! - `throttle`: per-transaction access-interval pause and power-good check
//! - `poll`: one full acquisition cycle with fail-safe substitution
//! - `task`: the background thread that repeats cycles on a fixed cadence

mod poll;
mod task;
mod throttle;

pub use poll::{CycleOutcome, PollEngine, StepError};
pub use task::{PollTask, StopSignal};
pub use throttle::IntervalThrottle;
