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

//! Device configuration
//!
//! One JSON file describes the PSU to attach:
//!
//! ```json
//! {
//!   "bus": "/dev/i2c-10",
//!   "address": 88,
//!   "variant": "ym2651",
//!   "access_interval": 0,
//!   "power_gate": { "powergood_path": "/sys/bus/i2c/devices/0-0060/psu1_power_good" }
//! }
//! ```
//!
//! The file is found through `PSUMON_CONFIG`, falling back to
//! `/etc/psumon/config.json`. Out-of-range values are rejected at load time,
//! never clamped.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{bus, paths, timing};
use crate::data::{validate_access_interval, validate_duty_cycle, ChipVariant};
use crate::device::DeviceOptions;
use crate::error::{PsuError, Result};
use crate::hw::SysfsStatusGate;

fn default_refresh_interval_ms() -> u64 {
    timing::REFRESH_INTERVAL_MS
}

/// Sysfs files the power gate reads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PowerGateConfig {
    pub powergood_path: PathBuf,
    /// Falls back to the power-good file when absent
    #[serde(default)]
    pub presence_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// i2c-dev character device of the adapter
    pub bus: PathBuf,
    /// 7-bit device address
    pub address: u16,
    pub variant: ChipVariant,
    /// Milliseconds, 0-120. Defaults per variant.
    #[serde(default)]
    pub access_interval: Option<i64>,
    #[serde(default)]
    pub mfr_serial_supported: Option<bool>,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default)]
    pub power_gate: Option<PowerGateConfig>,
    /// Fan duty cycle pushed once after attach
    #[serde(default)]
    pub initial_duty_cycle: Option<i64>,
}

impl DeviceConfig {
    pub fn new(bus: impl Into<PathBuf>, address: u16, variant: ChipVariant) -> Self {
        Self {
            bus: bus.into(),
            address,
            variant,
            access_interval: None,
            mfr_serial_supported: None,
            refresh_interval_ms: default_refresh_interval_ms(),
            power_gate: None,
            initial_duty_cycle: None,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Whether the address is one this PSU family answers on by default
    pub fn is_standard_address(&self) -> bool {
        bus::NORMAL_ADDRESSES.contains(&self.address)
    }

    /// Attach options for this configuration. Call `validate_config` first.
    pub fn device_options(&self) -> Result<DeviceOptions> {
        let mut options =
            DeviceOptions::new(self.variant).with_refresh_interval(self.refresh_interval());

        if let Some(interval) = self.access_interval {
            options = options.with_access_interval(interval)?;
        }
        if let Some(supported) = self.mfr_serial_supported {
            options = options.with_mfr_serial_supported(supported);
        }
        if let Some(gate) = &self.power_gate {
            options = options.with_gate(Arc::new(SysfsStatusGate::new(
                gate.powergood_path.clone(),
                gate.presence_path.clone(),
            )));
        }
        Ok(options)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var(paths::CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    Path::new(paths::CONFIG_DIR).join(paths::CONFIG_FILE)
}

pub fn validate_config(cfg: &DeviceConfig) -> Result<()> {
    if cfg.bus.as_os_str().is_empty() {
        return Err(PsuError::invalid_config("bus", "must name an i2c-dev device"));
    }
    if cfg.address > bus::MAX_7BIT_ADDRESS {
        return Err(PsuError::invalid_config(
            "address",
            format!("{:#x} is not a 7-bit address", cfg.address),
        ));
    }
    if cfg.refresh_interval_ms == 0 {
        return Err(PsuError::invalid_config("refresh_interval_ms", "must be greater than zero"));
    }
    if let Some(interval) = cfg.access_interval {
        validate_access_interval(interval)?;
    }
    if let Some(duty) = cfg.initial_duty_cycle {
        validate_duty_cycle(duty)?;
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<DeviceConfig> {
    let data = fs::read_to_string(path).map_err(|source| PsuError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: DeviceConfig = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_defaults() {
        let file = write_config(r#"{"bus": "/dev/i2c-10", "address": 88, "variant": "ym2651"}"#);
        let cfg = load_config(file.path()).unwrap();

        assert_eq!(cfg, DeviceConfig::new("/dev/i2c-10", 0x58, ChipVariant::Ym2651));
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(3));
        assert!(cfg.is_standard_address());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"{
                "bus": "/dev/i2c-3",
                "address": 91,
                "variant": "ym1151d",
                "access_interval": 20,
                "mfr_serial_supported": true,
                "refresh_interval_ms": 1000,
                "power_gate": {"powergood_path": "/tmp/pg", "presence_path": "/tmp/present"},
                "initial_duty_cycle": 60
            }"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.variant, ChipVariant::Ym1151d);
        assert_eq!(cfg.access_interval, Some(20));
        assert_eq!(cfg.initial_duty_cycle, Some(60));
        let gate = cfg.power_gate.as_ref().unwrap();
        assert_eq!(gate.presence_path, Some(PathBuf::from("/tmp/present")));

        let options = cfg.device_options().unwrap();
        assert_eq!(options.access_interval, Some(20));
        assert_eq!(options.mfr_serial_supported, Some(true));
        assert_eq!(options.refresh_interval, Duration::from_millis(1000));
        assert!(options.gate.is_some());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            r#"{"bus": "/dev/i2c-1", "address": 88, "variant": "ym2651", "access_interval": 150}"#,
            r#"{"bus": "/dev/i2c-1", "address": 88, "variant": "ym2651", "initial_duty_cycle": 101}"#,
            r#"{"bus": "/dev/i2c-1", "address": 200, "variant": "ym2651"}"#,
            r#"{"bus": "/dev/i2c-1", "address": 88, "variant": "ym2651", "refresh_interval_ms": 0}"#,
            r#"{"bus": "", "address": 88, "variant": "ym2651"}"#,
        ];
        for case in cases {
            let file = write_config(case);
            assert!(load_config(file.path()).is_err(), "accepted {}", case);
        }
    }

    #[test]
    fn test_rejects_unknown_fields_and_variants() {
        let file = write_config(
            r#"{"bus": "/dev/i2c-1", "address": 88, "variant": "ym2651", "extra": 1}"#,
        );
        assert!(matches!(load_config(file.path()), Err(PsuError::JsonParse(_))));

        let file = write_config(r#"{"bus": "/dev/i2c-1", "address": 88, "variant": "ym9999"}"#);
        assert!(matches!(load_config(file.path()), Err(PsuError::JsonParse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/psumon/config.json")).unwrap_err();
        assert!(matches!(err, PsuError::FileRead { .. }));
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        env::set_var(paths::CONFIG_ENV, "/custom/psu.json");
        assert_eq!(config_path(), PathBuf::from("/custom/psu.json"));
        env::remove_var(paths::CONFIG_ENV);
        assert_eq!(config_path(), PathBuf::from("/etc/psumon/config.json"));
    }
}
