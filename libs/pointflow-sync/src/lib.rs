//! Pointflow time synchronization
//!
//! Calendar (crontab), fixed elapsed-time and explicit stamp schedules
//! behind one bidirectional cursor.
//!
//! ```text
//!   SyncConfig ──build──▶ TimeSync ──iter()──▶ SyncIter
//!                            │
//!             ┌──────────────┼──────────────┬─────────┐
//!          Crontab        Elapsed         Stamps     Null
//! ```

pub mod config;
pub mod crontab;
pub mod error;
pub mod interval;
pub mod iter;
pub mod sync;
pub mod zone;

use chrono::{DateTime, Duration, Utc};

/// Instant with nanosecond resolution
pub type Stamp = DateTime<Utc>;

/// Smallest representable step between two stamps
pub fn tick() -> Duration {
    Duration::nanoseconds(1)
}

pub use config::{parse_elapsed, SyncConfig};
pub use crontab::Crontab;
pub use error::{CrontabError, Result, SyncError};
pub use interval::TimeInterval;
pub use iter::SyncIter;
pub use sync::{ElapsedSchedule, Schedule, TimeSync};
pub use zone::Zone;
