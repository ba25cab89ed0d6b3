//! Error types for pointflow-sync

use thiserror::Error;

/// Crontab parse errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrontabError {
    /// An item did not match the item syntax or fell outside its field
    #[error("Bad crontab item: '{0}'")]
    BadItem(String),

    /// More than the five crontab fields were supplied
    #[error("Too many crontab fields: {0} (max 5)")]
    TooManyFields(usize),
}

impl CrontabError {
    pub fn bad_item(item: impl Into<String>) -> Self {
        Self::BadItem(item.into())
    }
}

/// Synchronization setup errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Crontab(#[from] CrontabError),

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),

    #[error("Invalid elapsed time: {0}")]
    InvalidElapsed(String),

    #[error("Offset {offset} must be smaller than elapsed {elapsed}")]
    OffsetTooLarge { offset: String, elapsed: String },

    #[error("Empty stamp list")]
    EmptyStamps,

    #[error("Sync configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn invalid_elapsed(msg: impl Into<String>) -> Self {
        Self::InvalidElapsed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
