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

//! Bus transport seam
//!
//! The poll engine and the write path only talk to the PSU through this trait.
//! Implementations are synchronous and blocking; each call is one complete
//! SMBus transaction against the device address the transport was opened for.

use std::io;
use std::sync::Arc;

/// A failed bus transaction
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("transfer for command {command:#04x} failed: {source}")]
    Io {
        command: u8,
        #[source]
        source: io::Error,
    },

    #[error("short block read for command {command:#04x}: expected {expected} bytes, got {actual}")]
    ShortRead {
        command: u8,
        expected: usize,
        actual: usize,
    },

    #[error("block length {len} for command {command:#04x} outside 1..={max}")]
    BadBlockLength {
        command: u8,
        len: usize,
        max: usize,
    },
}

impl BusError {
    /// Command code of the failed transaction
    pub fn command(&self) -> u8 {
        match self {
            BusError::Io { command, .. }
            | BusError::ShortRead { command, .. }
            | BusError::BadBlockLength { command, .. } => *command,
        }
    }

    /// Generic I/O failure, mostly useful for transports without an OS error
    pub fn io(command: u8, reason: impl Into<String>) -> Self {
        BusError::Io {
            command,
            source: io::Error::new(io::ErrorKind::Other, reason.into()),
        }
    }
}

/// Byte, word and block access to one PMBus device
pub trait BusTransport: Send + Sync {
    fn read_byte(&self, command: u8) -> Result<u8, BusError>;

    fn read_word(&self, command: u8) -> Result<u16, BusError>;

    fn write_word(&self, command: u8, value: u16) -> Result<(), BusError>;

    /// Read exactly `len` bytes. Returning fewer is a transport bug; callers
    /// still check and treat it as a failed transaction.
    fn read_block(&self, command: u8, len: usize) -> Result<Vec<u8>, BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for Arc<T> {
    fn read_byte(&self, command: u8) -> Result<u8, BusError> {
        (**self).read_byte(command)
    }

    fn read_word(&self, command: u8) -> Result<u16, BusError> {
        (**self).read_word(command)
    }

    fn write_word(&self, command: u8, value: u16) -> Result<(), BusError> {
        (**self).write_word(command, value)
    }

    fn read_block(&self, command: u8, len: usize) -> Result<Vec<u8>, BusError> {
        (**self).read_block(command, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accessor() {
        assert_eq!(BusError::io(0x8B, "nack").command(), 0x8B);
        let err = BusError::ShortRead { command: 0x9A, expected: 9, actual: 3 };
        assert_eq!(err.command(), 0x9A);
        assert_eq!(
            err.to_string(),
            "short block read for command 0x9a: expected 9 bytes, got 3"
        );
    }
}
