//! Pointflow behavior chains
//!
//! Decide when an input notice triggers a result computation and which
//! input value feeds each result, batching store lookups per wave.
//!
//! ```text
//!   ProcessorConfig ──▶ Relation + [BehaviorLink] ──set_up──▶ BehaviorChain
//!                                                                │
//!   notices ──▶ Wave ──▶ MemoryBatch ◀──passes──▶ ValueStore     │
//!                 └───────────── trigger / select ◀──────────────┘
//! ```

pub mod batch;
pub mod behavior;
pub mod config;
pub mod error;
pub mod point;
mod polator;
pub mod query;
pub mod store;
pub mod value;
pub mod wave;

pub use batch::{Batch, LookUpPass, MemoryBatch};
pub use behavior::{BehaviorChain, BehaviorKind, BehaviorLink, PrimarySettings, Prepared};
pub use config::{default_primary, BehaviorConfig, PointConfig, ProcessorConfig, RelationConfig};
pub use error::{BehaviorError, Result};
pub use point::{ParamValue, Params, Point, Relation};
pub use polator::{EXTRAPOLATED_STATE, INTERPOLATED_STATE};
pub use query::ValuesQuery;
pub use store::{MemoryStore, ValueStore};
pub use value::{PointValue, ResultValue, Value};
pub use wave::{Wave, DEFAULT_MAX_PASSES};
