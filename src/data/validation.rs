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

//! Input validation for the write surface
//!
//! Out-of-range values are rejected, never clamped, so a failed call leaves the
//! device state untouched.

use crate::constants::{access_interval, duty_cycle};
use crate::error::{PsuError, Result};

/// Validates a fan duty cycle percentage (0-100)
pub fn validate_duty_cycle(value: i64) -> Result<u16> {
    if !(duty_cycle::MIN..=duty_cycle::MAX).contains(&value) {
        return Err(PsuError::InvalidDutyCycle { value });
    }
    Ok(value as u16)
}

/// Validates an access interval (0-120)
pub fn validate_access_interval(value: i64) -> Result<u32> {
    if !(access_interval::MIN..=access_interval::MAX).contains(&value) {
        return Err(PsuError::InvalidAccessInterval { value });
    }
    Ok(value as u32)
}
