//! Store configuration via `chronodoc.toml`
//!
//! A store is configured from a small TOML file. The defaults suit production
//! use; [`StoreConfig::for_tests`] makes dropped transactions cancel instead of
//! commit, which is what test suites want.

use serde::{Deserialize, Serialize};
use std::path::Path;

use chronodoc_core::{Error, Result, DEFAULT_MAX_IDENTIFIER_BYTES};

use crate::codec::{DEFAULT_FRAGMENT_CAPACITY, MIN_FRAGMENT_CAPACITY};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "chronodoc.toml";

/// What a transaction does when dropped without an explicit commit or cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    /// Commit pending writes
    #[default]
    Commit,
    /// Discard pending writes
    Cancel,
}

/// Store configuration loaded from `chronodoc.toml`.
///
/// # Example
///
/// ```toml
/// fragment_capacity = 8192
/// on_close = "commit"
/// max_identifier_bytes = 1024
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Largest stored fragment in bytes
    #[serde(default = "default_fragment_capacity")]
    pub fragment_capacity: usize,
    /// Behavior of a transaction dropped while still active
    #[serde(default)]
    pub on_close: CloseBehavior,
    /// Limit for namespace, entity and id strings
    #[serde(default = "default_max_identifier_bytes")]
    pub max_identifier_bytes: usize,
}

fn default_fragment_capacity() -> usize {
    DEFAULT_FRAGMENT_CAPACITY
}

fn default_max_identifier_bytes() -> usize {
    DEFAULT_MAX_IDENTIFIER_BYTES
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fragment_capacity: default_fragment_capacity(),
            on_close: CloseBehavior::Commit,
            max_identifier_bytes: default_max_identifier_bytes(),
        }
    }
}

impl StoreConfig {
    /// Defaults, except that dropped transactions cancel
    pub fn for_tests() -> Self {
        Self {
            on_close: CloseBehavior::Cancel,
            ..Self::default()
        }
    }

    /// Builder-style override of the fragment capacity
    pub fn with_fragment_capacity(mut self, capacity: usize) -> Self {
        self.fragment_capacity = capacity;
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.fragment_capacity < MIN_FRAGMENT_CAPACITY {
            return Err(Error::Config(format!(
                "fragment_capacity = {} is below the minimum of {}",
                self.fragment_capacity, MIN_FRAGMENT_CAPACITY
            )));
        }
        if self.max_identifier_bytes == 0 {
            return Err(Error::Config(
                "max_identifier_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# chronodoc store configuration
#
# Largest stored fragment in bytes (default: 8192, minimum: 16).
# Longer strings are split across several fragments.
fragment_capacity = 8192

# What a transaction does when dropped without commit() or cancel():
#   "commit" (default) or "cancel"
on_close = "commit"

# Maximum length of namespace, entity and id strings in bytes (default: 1024)
max_identifier_bytes = 1024
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

}
