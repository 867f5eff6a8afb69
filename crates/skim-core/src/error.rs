//! Configuration error types.
//!
//! Configuration is the only fatal surface in skimgrid: the engine itself
//! reports shortfalls as values and the control loop always proceeds to the
//! next tick.

use thiserror::Error;

/// Errors raised while loading or validating `skim.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
