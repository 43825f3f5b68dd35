//! Configuration module for the alert engine.

use serde::Deserialize;
use thiserror::Error;

/// Error returned when engine configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum EngineConfigError {
    /// The configuration file could not be read or deserialized.
    #[error("failed to load engine configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Configuration for the evaluation loop and feed marshalling.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Capacity of the feed update channel. Producers back off (or fail a
    /// `try_send`) once this many updates are queued.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,

    /// When true, a value or geometry update for a source the loop has never
    /// seen registers the source on the fly instead of dropping the update.
    #[serde(default = "default_auto_register_sources")]
    pub auto_register_sources: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feed_capacity: default_feed_capacity(),
            auto_register_sources: default_auto_register_sources(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a file, filling unset fields with defaults.
    pub fn from_file(path: &str) -> Result<Self, EngineConfigError> {
        let settings =
            config::Config::builder().add_source(config::File::with_name(path)).build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn default_feed_capacity() -> usize {
    256
}

fn default_auto_register_sources() -> bool {
    false
}
