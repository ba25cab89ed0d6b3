//! Error types for pointflow-behavior

use pointflow_sync::SyncError;
use thiserror::Error;

/// Behavior setup, validation and evaluation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BehaviorError {
    #[error("Behavior {behavior} is incompatible with parameter {param}")]
    Incompatible {
        behavior: &'static str,
        param: &'static str,
    },

    #[error("Parameters {0} are mutually exclusive")]
    MutuallyExclusive(String),

    #[error("Parameter {0} does not support a zero value")]
    ZeroNotSupported(&'static str),

    #[error("SelectSyncPosition must not be before SinceSyncPosition")]
    InvalidSelectionInterval,

    #[error("A result point sync is needed for {0}")]
    SyncResultNeeded(&'static str),

    #[error("An input sync is needed for {0}")]
    SyncInputNeeded(&'static str),

    #[error("Behavior {0} does not support extrapolated inputs")]
    ExtrapolatedNotSupported(&'static str),

    #[error("Behavior {0} does not support interpolated inputs")]
    InterpolatedNotSupported(&'static str),

    #[error("Point {0} would trigger itself")]
    TriggerLoop(String),

    #[error("Behavior chain for {0} has no primary behavior")]
    NoPrimary(String),

    #[error("Behavior chain for {0} has more than one primary behavior")]
    MultiplePrimary(String),

    #[error("Unknown behavior: {0}")]
    UnknownBehavior(String),

    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    #[error("Bad parameter {name}: {reason}")]
    BadParam { name: String, reason: String },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BehaviorError {
    pub fn bad_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadParam {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BehaviorError>;
