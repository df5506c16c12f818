//! Configuration for the core crate
//!
//! This module provides configuration options for the core crate:
//! value codec settings, entry network, cheque fees and logging.

use serde::{Deserialize, Serialize};

use crate::error::{to_config_error, Result};
use crate::types::{TimeUnit, ValueCodec};

/// Ethereum main network id
pub const DEFAULT_NETWORK: u64 = 60;

/// Value codec configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Resolution of `time` values on the wire
    pub time_unit: TimeUnit,
}

impl CodecConfig {
    /// Codec for these settings
    pub fn codec(&self) -> ValueCodec {
        ValueCodec::new(self.time_unit)
    }
}

/// Entry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Network id written into `EntryNetwork`
    pub network: u64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        EntryConfig {
            network: DEFAULT_NETWORK,
        }
    }
}

/// Cheque configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChequeConfig {
    /// Fee paid for every entry
    pub entry_fee: u64,

    /// Surcharge paid with the first entry of a session
    pub session_fee: u64,

    /// Value of `ChequeVersion`
    pub version: u64,
}

impl Default for ChequeConfig {
    fn default() -> Self {
        ChequeConfig {
            entry_fee: 10,
            session_fee: 100,
            version: 1,
        }
    }
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Value codec configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// Entry configuration
    #[serde(default)]
    pub entry: EntryConfig,

    /// Cheque configuration
    #[serde(default)]
    pub cheque: ChequeConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            codec: CodecConfig::default(),
            entry: EntryConfig::default(),
            cheque: ChequeConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Value codec for this configuration
    pub fn codec(&self) -> ValueCodec {
        self.codec.codec()
    }

    /// Install an `env_logger` logger filtered at `log_level`
    ///
    /// `RUST_LOG` still overrides the configured level. Fails if a logger is
    /// already installed.
    pub fn init_logging(&self) -> Result<()> {
        let level: log::LevelFilter = self.log_level.parse().map_err(to_config_error)?;
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .map_err(to_config_error)
    }
}
