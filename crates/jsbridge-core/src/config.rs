//! Bridge configuration (jsbridge.toml)
//!
//! ```toml
//! stack_limit = 65536
//! await_job_limit = 10000
//! strict_numbers = false
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default operand stack size of the stack engine (in slots)
pub const DEFAULT_STACK_LIMIT: usize = 1024 * 64;

/// Default number of jobs the await step may run
pub const DEFAULT_AWAIT_JOB_LIMIT: usize = 10_000;

/// Smallest usable stack: a call needs the function, `this` and a result.
const MIN_STACK_LIMIT: usize = 3;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables of a bridge context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Operand stack size of the stack engine, in slots
    pub stack_limit: usize,

    /// Maximum number of jobs drained while awaiting a promise
    pub await_job_limit: usize,

    /// Reject float-tagged script numbers for integer targets instead of
    /// truncating them
    pub strict_numbers: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            stack_limit: DEFAULT_STACK_LIMIT,
            await_job_limit: DEFAULT_AWAIT_JOB_LIMIT,
            strict_numbers: false,
        }
    }
}

impl BridgeConfig {
    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_limit < MIN_STACK_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "stack_limit must be at least {}, got {}",
                MIN_STACK_LIMIT, self.stack_limit
            )));
        }
        if self.await_job_limit == 0 {
            return Err(ConfigError::Invalid(
                "await_job_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
