//! Point value storage consulted between look-up passes
//!
//! Persistence engines sit behind [`ValueStore`]; [`MemoryStore`] keeps
//! everything in memory for tests and tools.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use pointflow_sync::Stamp;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::query::ValuesQuery;
use crate::value::PointValue;

/// Store answering values queries
pub trait ValueStore: Send + Sync {
    /// Values matching the query, in query order
    fn select(&self, query: &ValuesQuery) -> impl Future<Output = Result<Vec<PointValue>>> + Send;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<FxHashMap<Arc<str>, BTreeMap<Stamp, PointValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value at its point and stamp
    pub async fn insert(&self, value: PointValue) {
        let mut data = self.data.write().await;
        data.entry(Arc::clone(&value.point))
            .or_default()
            .insert(value.stamp, value);
    }

    pub async fn extend(&self, values: impl IntoIterator<Item = PointValue>) {
        let mut data = self.data.write().await;
        for value in values {
            data.entry(Arc::clone(&value.point))
                .or_default()
                .insert(value.stamp, value);
        }
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl ValueStore for MemoryStore {
    fn select(&self, query: &ValuesQuery) -> impl Future<Output = Result<Vec<PointValue>>> + Send {
        let query = query.clone();
        async move {
            let data = self.data.read().await;
            Ok(data
                .get(&query.point)
                .map(|values| query.select_from(values))
                .unwrap_or_default())
        }
    }
}
