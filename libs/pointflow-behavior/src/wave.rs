//! Computation wave driver
//!
//! ```text
//!  notices ─▶ cache ─▶ prepare_trigger ⟲ store ─▶ trigger
//!                                                   │ result stamps
//!                      prepare_select  ⟲ store ◀────┘
//!                             │
//!                             ▼
//!                          select ─▶ results (inputs attached)
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::batch::{Batch, MemoryBatch};
use crate::behavior::BehaviorChain;
use crate::error::Result;
use crate::query::ValuesQuery;
use crate::store::ValueStore;
use crate::value::{PointValue, ResultValue};

/// Look-up passes allowed per phase before a wave gives up waiting
pub const DEFAULT_MAX_PASSES: u32 = 8;

/// One computation wave over a set of behavior chains
pub struct Wave<'a> {
    chains: &'a [BehaviorChain],
    max_passes: u32,
}

impl<'a> Wave<'a> {
    pub fn new(chains: &'a [BehaviorChain]) -> Self {
        Self {
            chains,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Trigger results from the notices and select their inputs
    ///
    /// Results are ordered by point then stamp. A result missing a
    /// required input is dropped.
    pub async fn run<S: ValueStore>(
        &self,
        notices: Vec<PointValue>,
        store: &S,
    ) -> Result<Vec<ResultValue>> {
        let mut batch = MemoryBatch::new();
        for notice in &notices {
            batch.cache(notice.clone());
        }

        // Trigger phase
        let mut pending: Vec<(usize, usize)> = Vec::new();
        for (n, notice) in notices.iter().enumerate() {
            for (c, chain) in self.chains.iter().enumerate() {
                if *chain.input_point() == notice.point {
                    pending.push((c, n));
                }
            }
        }
        let triggers = pending.clone();

        while !pending.is_empty() {
            let pass = batch.look_up_pass();
            if pass.number() > self.max_passes {
                warn!(
                    "Trigger look-up still pending after {} passes for {} notice(s)",
                    self.max_passes,
                    pending.len()
                );
                break;
            }
            pending.retain(|&(c, n)| {
                !self.chains[c]
                    .prepare_trigger(&notices[n], &mut batch, pass)
                    .is_done()
            });
            batch.run_pass(store).await?;
        }

        for &(c, n) in &triggers {
            self.chains[c].trigger(&notices[n], &mut batch);
        }

        let mut results = batch.take_results();
        debug!(
            "Wave triggered {} result(s) from {} notice(s)",
            results.len(),
            notices.len()
        );

        // Select phase
        batch.reset_pass();
        let mut pending: Vec<(usize, usize)> = Vec::new();
        for (r, result) in results.iter().enumerate() {
            for (c, chain) in self.chains.iter().enumerate() {
                if *chain.result_point() != result.point {
                    continue;
                }
                if chain.is_result_fetched() {
                    batch.add_store_values_query(ValuesQuery::at(&result.point, result.stamp));
                }
                pending.push((r, c));
            }
        }

        while !pending.is_empty() {
            let pass = batch.look_up_pass();
            if pass.number() > self.max_passes {
                warn!(
                    "Select look-up still pending after {} passes for {} input(s)",
                    self.max_passes,
                    pending.len()
                );
                break;
            }
            pending.retain(|&(r, c)| {
                !self.chains[c]
                    .prepare_select(&results[r], &mut batch, pass)
                    .is_done()
            });
            batch.run_pass(store).await?;
        }

        let total = results.len();
        results.retain_mut(|result| {
            let point = Arc::clone(&result.point);
            self.chains
                .iter()
                .filter(|chain| *chain.result_point() == point)
                .all(|chain| chain.select(result, &batch))
        });

        info!(
            "Wave computed {} of {} result(s)",
            results.len(),
            total
        );
        Ok(results)
    }
}
