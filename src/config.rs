//! Tunables for ingestion and storage.
//!
//! Every field has a default that works for typical CI logs. With the `config`
//! feature enabled the same structure can be loaded from a TOML file, by default
//! `<config_dir>/bklog/config.toml`.

use crate::error::{BklogError, Result};

#[cfg(feature = "config")]
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub ingest: IngestConfig,
    pub store: StoreConfig,
}

/// Settings for turning raw log bytes into stored records
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IngestConfig {
    /// Records per written batch
    pub batch_size: usize,

    /// Longest accepted physical line, newline excluded
    pub max_line_bytes: usize,

    /// Batches in flight between the line reader and the blocking writer
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            max_line_bytes: 1024 * 1024,
            channel_capacity: 4,
        }
    }
}

/// Settings for the record store
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StoreConfig {
    /// zstd level used for column blocks
    pub compression_level: i32,

    /// Upper bound on rows the memory store keeps per batch
    pub read_batch_rows: usize,

    /// Files smaller than this are read into memory, larger ones are memory mapped
    pub memory_threshold: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            read_batch_rows: 5_000,
            memory_threshold: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl Config {
    /// Check values that would make ingestion or storage misbehave
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            return Err(BklogError::config("ingest.batch_size must be greater than 0"));
        }
        if self.ingest.max_line_bytes == 0 {
            return Err(BklogError::config(
                "ingest.max_line_bytes must be greater than 0",
            ));
        }
        if self.ingest.channel_capacity == 0 {
            return Err(BklogError::config(
                "ingest.channel_capacity must be greater than 0",
            ));
        }
        if self.store.read_batch_rows == 0 {
            return Err(BklogError::config(
                "store.read_batch_rows must be greater than 0",
            ));
        }
        if !(1..=22).contains(&self.store.compression_level) {
            return Err(BklogError::config(format!(
                "store.compression_level must be between 1 and 22, got {}",
                self.store.compression_level
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
impl Config {
    /// Parse and validate a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| BklogError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BklogError::file_error(format!("Failed to read config: {}", path.display()), e)
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `<config_dir>/bklog/config.toml`, falling back to defaults when absent
    pub fn load_default() -> Result<Self> {
        match dirs::config_dir().map(|dir| dir.join("bklog").join("config.toml")) {
            Some(path) if path.is_file() => {
                log::debug!("loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
