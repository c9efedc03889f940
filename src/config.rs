//! ## Configuration
//!
//! Transport settings and the log level, loaded with `figment` from, in order:
//! 1. built-in defaults
//! 2. a TOML file (`yoko7651.toml` by default)
//! 3. environment variables prefixed with `YOKO7651_`, `__` separating nested keys
//!
//! ```no_run
//! use rs_yokogawa7651::Config;
//!
//! // YOKO7651_TRANSPORT__TIMEOUT_MS=5000 overrides the file
//! let config = Config::load()?;
//! println!("timeout: {:?}", config.transport.timeout());
//! # Ok::<(), rs_yokogawa7651::Error>(())
//! ```
//!

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::constants::{config, misc, serial};
use crate::error::{Error, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    pub transport: TransportConfig,
}

/// Settings shared by every transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// I/O timeout in milliseconds
    pub timeout_ms: u64,
    pub serial: SerialConfig,
    pub usbtmc: UsbtmcConfig,
    /// GPIB controller; GPIB addresses cannot be opened without it
    pub prologix: Option<PrologixConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Appended to every command
    pub terminator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UsbtmcConfig {
    /// Appended to every command
    pub terminator: String,
}

/// Prologix GPIB-USB controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrologixConfig {
    /// Virtual serial port of the controller
    pub port: String,
    #[serde(default = "default_prologix_baud_rate")]
    pub baud_rate: u32,
    /// GPIB board number the controller answers for
    #[serde(default)]
    pub board: u16,
    /// `++eos` mode: 0 CR+LF, 1 CR, 2 LF, 3 none
    #[serde(default = "default_prologix_eos")]
    pub eos: u8,
}

fn default_prologix_baud_rate() -> u32 {
    serial::PROLOGIX_BAUD_RATE
}

fn default_prologix_eos() -> u8 {
    serial::PROLOGIX_DEFAULT_EOS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            timeout_ms: misc::DEFAULT_TIMEOUT_MS,
            serial: SerialConfig::default(),
            usbtmc: UsbtmcConfig::default(),
            prologix: None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baud_rate: serial::DEFAULT_BAUD_RATE,
            terminator: serial::DEFAULT_TERMINATOR.to_string(),
        }
    }
}

impl PrologixConfig {
    /// Controller on `port` with default settings
    pub fn new(port: impl Into<String>) -> Self {
        PrologixConfig {
            port: port.into(),
            baud_rate: default_prologix_baud_rate(),
            board: 0,
            eos: default_prologix_eos(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from `yoko7651.toml` in the working directory and the environment.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        Self::load_from(config::DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path and the environment, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(config::ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid(format!(
                "invalid log_level '{}', must be one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.transport.timeout_ms == 0 {
            return Err(invalid("transport.timeout_ms must be greater than 0".to_string()));
        }
        if self.transport.serial.baud_rate == 0 {
            return Err(invalid("transport.serial.baud_rate must be greater than 0".to_string()));
        }
        if let Some(prologix) = &self.transport.prologix {
            if prologix.baud_rate == 0 {
                return Err(invalid(
                    "transport.prologix.baud_rate must be greater than 0".to_string(),
                ));
            }
            if prologix.eos > 3 {
                return Err(invalid(format!(
                    "transport.prologix.eos must be 0..=3, got {}",
                    prologix.eos
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::from(figment::Error::from(message))
}
