//! Connection configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeshiftError};

fn default_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    4
}

/// Connection settings for the target database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// User name.
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl ConnectionConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ConnectionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(TypeshiftError::Config("host cannot be empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(TypeshiftError::Config(
                "database cannot be empty".to_string(),
            ));
        }
        if self.user.is_empty() {
            return Err(TypeshiftError::Config("user cannot be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(TypeshiftError::Config(
                "pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
