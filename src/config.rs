use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::scope::ConnectionConfig;
use crate::types::{Channel, ScopeSettings, TriggerConfig};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub acquisition: AcquisitionConfig,
    pub trigger: TriggerConfig,
    pub console: ConsoleConfig,
}

impl AppConfig {
    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.resource.trim().is_empty() {
            return Err(ConfigError::Message("instrument.resource must not be empty".into()));
        }
        for (name, value) in [
            ("acquisition.timebase", self.acquisition.timebase),
            ("acquisition.volts_per_div", self.acquisition.volts_per_div),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Message(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !self.trigger.level.is_finite() {
            return Err(ConfigError::Message("trigger.level must be finite".into()));
        }
        Ok(())
    }

    /// Settings pushed to the instrument by "apply settings"
    pub fn scope_settings(&self) -> ScopeSettings {
        ScopeSettings {
            channel: self.acquisition.channel,
            timebase: self.acquisition.timebase,
            volts_per_div: self.acquisition.volts_per_div,
            trigger: self.trigger,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    /// Resource identifier, e.g. `TCPIP0::192.168.1.100::5555::SOCKET`
    pub resource: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl InstrumentConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AcquisitionConfig {
    pub channel: Channel,
    /// Seconds per division
    pub timebase: f64,
    pub volts_per_div: f64,
    /// Fail instead of warn when the sample count disagrees with the preamble
    pub strict_point_count: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleConfig {
    pub verbosity: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        let timeouts = ConnectionConfig::default();
        Self {
            resource: "TCPIP0::192.168.1.100::5555::SOCKET".to_string(),
            connect_timeout_ms: timeouts.connect_timeout.as_millis() as u64,
            read_timeout_ms: timeouts.read_timeout.as_millis() as u64,
            write_timeout_ms: timeouts.write_timeout.as_millis() as u64,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        let settings = ScopeSettings::default();
        Self {
            channel: settings.channel,
            timebase: settings.timebase,
            volts_per_div: settings.volts_per_div,
            strict_point_count: false,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        // Try common config file locations
        let possible_paths = ["scope.toml", "config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    // Environment overrides, e.g. RUSTY_SCOPE__ACQUISITION__CHANNEL=2
    builder = builder.add_source(
        Environment::with_prefix("RUSTY_SCOPE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
