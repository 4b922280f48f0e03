//! Flipper configuration using Figment
//!
//! Settings are loaded from:
//! 1. a TOML file (`flipper.toml` by default)
//! 2. Environment variables prefixed with `FLIPPER_`
//!
//! Durations use humantime syntax (`"200ms"`, `"1.5s"`).
//!
//! ```toml
//! serial = "37000001"
//! polling_period = "200ms"
//! poll_delay = "100ms"
//! move_timeout = "10s"     # "0s" waits without bound
//! transit_time = "500ms"   # optional, written to the device on open
//! log_level = "info"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flipper_daq::config::FlipperSettings;
//!
//! let settings = FlipperSettings::load("flipper.toml").unwrap();
//! println!("Flipper: {:?}", settings.serial);
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FlipperError, Result};
use crate::hardware::filter_flipper::{
    WaitOptions, DEFAULT_MOVE_TIMEOUT, DEFAULT_POLLING_PERIOD, DEFAULT_POLL_DELAY,
};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "flipper.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FLIPPER_";

/// Settings for one filter flipper and the tools driving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipperSettings {
    /// Serial number of the flipper to open
    #[serde(default, deserialize_with = "deserialize_serial")]
    pub serial: Option<String>,
    /// Status polling period handed to the SDK
    #[serde(with = "humantime_serde", default = "default_polling_period")]
    pub polling_period: Duration,
    /// Interval between position checks in `move_and_wait`
    #[serde(with = "humantime_serde", default = "default_poll_delay")]
    pub poll_delay: Duration,
    /// Upper bound for `move_and_wait`; zero disables the bound
    #[serde(with = "humantime_serde", default = "default_move_timeout")]
    pub move_timeout: Duration,
    /// Transit time to program on open, if any
    #[serde(with = "humantime_serde", default)]
    pub transit_time: Option<Duration>,
    /// Default tracing filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Kinesis serials are all digits, so env and TOML sources may hand them over as
/// integers.
fn deserialize_serial<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSerial {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(
        Option::<RawSerial>::deserialize(deserializer)?.map(|raw| match raw {
            RawSerial::Text(serial) => serial,
            RawSerial::Unsigned(serial) => serial.to_string(),
            RawSerial::Signed(serial) => serial.to_string(),
        }),
    )
}

fn default_polling_period() -> Duration {
    DEFAULT_POLLING_PERIOD
}

fn default_poll_delay() -> Duration {
    DEFAULT_POLL_DELAY
}

fn default_move_timeout() -> Duration {
    DEFAULT_MOVE_TIMEOUT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FlipperSettings {
    fn default() -> Self {
        Self {
            serial: None,
            polling_period: default_polling_period(),
            poll_delay: default_poll_delay(),
            move_timeout: default_move_timeout(),
            transit_time: None,
            log_level: default_log_level(),
        }
    }
}

impl FlipperSettings {
    /// Load settings from `path` (missing file is allowed) plus `FLIPPER_*`
    /// environment overrides, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract_validated(Self::figment(path.as_ref()).merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load settings from a TOML file only, without environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract_validated(Self::figment(path.as_ref()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new().merge(Toml::file(path))
    }

    fn extract_validated(figment: Figment) -> Result<Self> {
        let settings: FlipperSettings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.polling_period.is_zero() {
            return Err(FlipperError::Configuration(
                "polling_period must be greater than zero".to_string(),
            ));
        }
        if self.poll_delay.is_zero() {
            return Err(FlipperError::Configuration(
                "poll_delay must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.serial, Some(serial) if serial.trim().is_empty()) {
            return Err(FlipperError::Configuration(
                "serial must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Wait options for `move_and_wait` derived from these settings.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_delay: self.poll_delay,
            timeout: (!self.move_timeout.is_zero()).then_some(self.move_timeout),
        }
    }
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
    fn test_defaults_when_file_is_empty() {
        let file = write_config("");
        let settings = FlipperSettings::from_file(file.path()).unwrap();
        assert_eq!(settings, FlipperSettings::default());
        assert_eq!(settings.wait_options(), WaitOptions::default());
    }

    #[test]
    fn test_humantime_durations() {
        let file = write_config(
            r#"
serial = "37000001"
polling_period = "250ms"
poll_delay = "50ms"
move_timeout = "2s"
transit_time = "1s 200ms"
log_level = "debug"
"#,
        );
        let settings = FlipperSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.serial.as_deref(), Some("37000001"));
        assert_eq!(settings.polling_period, Duration::from_millis(250));
        assert_eq!(settings.poll_delay, Duration::from_millis(50));
        assert_eq!(settings.transit_time, Some(Duration::from_millis(1200)));
        assert_eq!(
            settings.wait_options(),
            WaitOptions {
                poll_delay: Duration::from_millis(50),
                timeout: Some(Duration::from_secs(2)),
            }
        );
    }

    #[test]
    fn test_zero_move_timeout_is_unbounded() {
        let file = write_config(r#"move_timeout = "0s""#);
        let settings = FlipperSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.wait_options().timeout, None);
    }

    #[test]
    fn test_zero_polling_period_rejected() {
        let file = write_config(r#"polling_period = "0ms""#);
        let err = FlipperSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, FlipperError::Configuration(_)));
    }

    #[test]
    fn test_malformed_duration_is_config_error() {
        let file = write_config(r#"poll_delay = "soon""#);
        let err = FlipperSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, FlipperError::Config(_)));
    }

    #[test]
    fn test_integer_serial_in_toml() {
        let file = write_config("serial = 37000001");
        let settings = FlipperSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.serial.as_deref(), Some("37000001"));
    }

    #[test]
    #[serial]
    fn test_numeric_serial_from_env() {
        let file = write_config(r#"serial = "37000002""#);
        std::env::set_var("FLIPPER_SERIAL", "37000001");
        std::env::set_var("FLIPPER_POLL_DELAY", "20ms");
        let loaded = FlipperSettings::load(file.path());
        std::env::remove_var("FLIPPER_SERIAL");
        std::env::remove_var("FLIPPER_POLL_DELAY");

        let settings = loaded.unwrap();
        assert_eq!(settings.serial.as_deref(), Some("37000001"));
        assert_eq!(settings.poll_delay, Duration::from_millis(20));
    }

    #[test]
    #[serial]
    fn test_load_without_env_uses_file() {
        std::env::remove_var("FLIPPER_SERIAL");
        let file = write_config(r#"serial = "37000002""#);
        let settings = FlipperSettings::load(file.path()).unwrap();
        assert_eq!(settings.serial.as_deref(), Some("37000002"));
    }
}
