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

//! Hardware access
//!
//! The bus transport seam, the Linux SMBus implementation behind it, and the
//! power-good gate consulted before every transaction.

mod bus;
mod gate;
mod smbus;

pub use bus::{BusError, BusTransport};
pub use gate::{PowerGoodGate, SysfsStatusGate};
pub use smbus::SmbusTransport;
