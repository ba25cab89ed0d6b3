//! Computation batch
//!
//! A batch caches the values a computation wave needs. Behaviors register
//! store queries during look-up passes; the queries are resolved between
//! passes and the final trigger/select steps read the cache only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pointflow_sync::Stamp;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::query::ValuesQuery;
use crate::store::ValueStore;
use crate::value::{PointValue, ResultValue};

/// Look-up pass number, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookUpPass(u32);

impl LookUpPass {
    pub const FIRST: Self = Self(1);

    pub fn new(pass: u32) -> Self {
        Self(pass)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for LookUpPass {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for LookUpPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Batch interface used by behaviors
pub trait Batch {
    fn look_up_pass(&self) -> LookUpPass;

    /// Queue a query for resolution before the next pass
    fn add_store_values_query(&mut self, query: ValuesQuery);

    /// First cached value matching the query
    fn get_point_value(&self, query: &ValuesQuery) -> Option<PointValue>;

    fn get_point_values(&self, query: &ValuesQuery) -> Vec<PointValue>;

    /// Schedule a result computation for the point at the stamp
    fn set_up_result_value(&mut self, notice: &PointValue, stamp: Stamp, result_point: &Arc<str>);
}

/// Batch kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBatch {
    pass: LookUpPass,
    values: FxHashMap<Arc<str>, BTreeMap<Stamp, PointValue>>,
    queries: Vec<ValuesQuery>,
    results: BTreeMap<(Arc<str>, Stamp), ResultValue>,
}

impl MemoryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a value without querying the store
    pub fn cache(&mut self, value: PointValue) {
        self.values
            .entry(Arc::clone(&value.point))
            .or_default()
            .insert(value.stamp, value);
    }

    pub fn has_pending_queries(&self) -> bool {
        !self.queries.is_empty()
    }

    pub fn pending_queries(&self) -> &[ValuesQuery] {
        &self.queries
    }

    /// Restart pass numbering for the next phase
    pub fn reset_pass(&mut self) {
        self.pass = LookUpPass::FIRST;
    }

    /// Resolve the queued queries and move to the next pass
    ///
    /// Returns the number of values fetched.
    pub async fn run_pass<S: ValueStore>(&mut self, store: &S) -> Result<usize> {
        let queries = std::mem::take(&mut self.queries);
        let mut fetched = 0;

        for query in &queries {
            let values = store.select(query).await?;
            trace!(
                "Pass {}: {} {} -> {} value(s)",
                self.pass,
                query.point,
                query.interval,
                values.len()
            );
            fetched += values.len();
            for value in values {
                self.cache(value);
            }
        }

        debug!(
            "Look-up pass {} resolved {} queries, {} values",
            self.pass,
            queries.len(),
            fetched
        );
        self.pass = self.pass.next();
        Ok(fetched)
    }

    pub fn results(&self) -> impl Iterator<Item = &ResultValue> {
        self.results.values()
    }

    pub fn results_mut(&mut self) -> impl Iterator<Item = &mut ResultValue> {
        self.results.values_mut()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Drop a result, e.g. when a required input is missing
    pub fn remove_result(&mut self, point: &Arc<str>, stamp: Stamp) -> Option<ResultValue> {
        self.results.remove(&(Arc::clone(point), stamp))
    }

    /// Ordered results, leaving the batch without any
    pub fn take_results(&mut self) -> Vec<ResultValue> {
        std::mem::take(&mut self.results).into_values().collect()
    }
}

impl Batch for MemoryBatch {
    fn look_up_pass(&self) -> LookUpPass {
        self.pass
    }

    fn add_store_values_query(&mut self, query: ValuesQuery) {
        if !self.queries.contains(&query) {
            self.queries.push(query);
        }
    }

    fn get_point_value(&self, query: &ValuesQuery) -> Option<PointValue> {
        let values = self.values.get(&query.point)?;
        query.select_from(values).into_iter().next()
    }

    fn get_point_values(&self, query: &ValuesQuery) -> Vec<PointValue> {
        self.values
            .get(&query.point)
            .map(|values| query.select_from(values))
            .unwrap_or_default()
    }

    fn set_up_result_value(&mut self, notice: &PointValue, stamp: Stamp, result_point: &Arc<str>) {
        self.results
            .entry((Arc::clone(result_point), stamp))
            .or_insert_with(|| {
                debug!(
                    "Result {}@{} set up by {}",
                    result_point,
                    stamp.to_rfc3339(),
                    notice
                );
                ResultValue::new(Arc::clone(result_point), stamp)
            });
    }
}
