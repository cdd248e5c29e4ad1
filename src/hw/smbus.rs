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

//! Linux SMBus transport
//!
//! Talks to `/dev/i2c-N` through the i2cdev crate's `LinuxI2CDevice`, using the
//! same transfers the kernel PMBus drivers use (byte data, word data and I2C
//! block data).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use parking_lot::Mutex;
use tracing::debug;

use super::bus::{BusError, BusTransport};
use crate::constants::bus::MAX_BLOCK_LEN;
use crate::error::{PsuError, Result};

/// SMBus transport bound to one device address on an i2c-dev adapter
pub struct SmbusTransport {
    device: Mutex<LinuxI2CDevice>,
    path: PathBuf,
    address: u16,
}

impl SmbusTransport {
    /// Open the adapter at `path` and bind it to the 7-bit `address`
    pub fn open(path: impl AsRef<Path>, address: u16) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = LinuxI2CDevice::new(&path, address).map_err(|err| PsuError::BusOpen {
            path: path.clone(),
            source: io::Error::from(err),
        })?;

        debug!("Opened {} for address {:#04x}", path.display(), address);
        Ok(Self {
            device: Mutex::new(device),
            path,
            address,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

impl fmt::Debug for SmbusTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmbusTransport")
            .field("path", &self.path)
            .field("address", &format_args!("{:#04x}", self.address))
            .finish()
    }
}

fn bus_error(command: u8) -> impl FnOnce(LinuxI2CError) -> BusError {
    move |err| BusError::Io {
        command,
        source: io::Error::from(err),
    }
}

/// Accept a block payload only when it carries exactly `len` bytes
fn exact_block(command: u8, len: usize, data: Vec<u8>) -> std::result::Result<Vec<u8>, BusError> {
    if data.len() != len {
        return Err(BusError::ShortRead {
            command,
            expected: len,
            actual: data.len(),
        });
    }
    Ok(data)
}

impl BusTransport for SmbusTransport {
    fn read_byte(&self, command: u8) -> std::result::Result<u8, BusError> {
        self.device
            .lock()
            .smbus_read_byte_data(command)
            .map_err(bus_error(command))
    }

    fn read_word(&self, command: u8) -> std::result::Result<u16, BusError> {
        self.device
            .lock()
            .smbus_read_word_data(command)
            .map_err(bus_error(command))
    }

    fn write_word(&self, command: u8, value: u16) -> std::result::Result<(), BusError> {
        self.device
            .lock()
            .smbus_write_word_data(command, value)
            .map_err(bus_error(command))
    }

    fn read_block(&self, command: u8, len: usize) -> std::result::Result<Vec<u8>, BusError> {
        if len == 0 || len > MAX_BLOCK_LEN {
            return Err(BusError::BadBlockLength {
                command,
                len,
                max: MAX_BLOCK_LEN,
            });
        }

        let data = self
            .device
            .lock()
            .smbus_read_i2c_block_data(command, len as u8)
            .map_err(bus_error(command))?;
        exact_block(command, len, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_missing_adapter() {
        let err = SmbusTransport::open("/nonexistent/i2c-99", 0x58).unwrap_err();
        assert!(matches!(err, PsuError::BusOpen { .. }));
    }

    #[test]
    fn test_open_regular_file_rejects_slave_address() {
        let file = NamedTempFile::new().unwrap();
        let err = SmbusTransport::open(file.path(), 0x58).unwrap_err();
        match err {
            PsuError::BusOpen { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_block_accepts_full_payload() {
        let data = exact_block(0x9B, 2, vec![1, b'A']).unwrap();
        assert_eq!(data, vec![1, b'A']);
    }

    #[test]
    fn test_exact_block_rejects_short_payload() {
        let err = exact_block(0x99, 9, vec![3, b'3', b'Y']).unwrap_err();
        match err {
            BusError::ShortRead {
                command,
                expected,
                actual,
            } => {
                assert_eq!(command, 0x99);
                assert_eq!(expected, 9);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_block_rejects_long_payload() {
        let err = exact_block(0xC3, 4, vec![0; 5]).unwrap_err();
        assert!(matches!(err, BusError::ShortRead { actual: 5, .. }));
    }

    #[test]
    fn test_bus_error_keeps_command_and_errno() {
        const EIO: i32 = 5;
        let err = bus_error(0x8B)(LinuxI2CError::Io(io::Error::from_raw_os_error(EIO)));
        assert_eq!(err.command(), 0x8B);
        match err {
            BusError::Io { source, .. } => assert_eq!(source.raw_os_error(), Some(EIO)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
