//! Pointflow common library
//!
//! Bootstrap helpers shared by the pointflow binaries:
//! - logging initialisation
//! - layered configuration loading
//! - hex dumps of frames
//! - stop signals for server commands

pub mod config;
pub mod error;
pub mod hex;
pub mod logging;
pub mod shutdown;

pub use config::load_config;
pub use error::{ConfigError, Result};
pub use logging::{init_logging, LogConfig};
pub use shutdown::{stop_signal, StopSignal};
