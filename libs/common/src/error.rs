use thiserror::Error;

/// Errors raised while bootstrapping a binary
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Load(String),

    /// A value given on the command line or in a file is malformed
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}

/// Error result type
pub type Result<T> = std::result::Result<T, ConfigError>;
