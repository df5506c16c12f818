//! Configuration for the client crate

use serde::{Deserialize, Serialize};
use tiesdb_core::CoreConfig;

use crate::error::Result;
use crate::request::Consistency;

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Codec, entry, cheque and logging settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Tablespace used by queries that name only a table
    #[serde(default)]
    pub default_tablespace: Option<String>,

    /// Consistency level of modification and recollection requests
    #[serde(default)]
    pub consistency: Consistency,
}

impl ClientConfig {
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

    /// Set the default tablespace
    pub fn with_tablespace(mut self, tablespace: &str) -> Self {
        self.default_tablespace = Some(tablespace.to_string());
        self
    }
}
