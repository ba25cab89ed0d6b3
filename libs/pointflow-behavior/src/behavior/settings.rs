//! Chain setup and validation

use std::sync::Arc;

use chrono::Duration;
use pointflow_sync::TimeSync;
use tracing::{debug, warn};

use super::{
    BehaviorChain, BehaviorKind, BehaviorLink, AFTER_RESULT_SYNC_POSITION, POLATOR_TIME_LIMIT,
    SELECT_PREVIOUS_VALUE, SELECT_SYNC_POSITION, SINCE_RESULT_SYNC_POSITION, SINCE_SYNC_POSITION,
};
use crate::error::{BehaviorError, Result};
use crate::point::{Params, Relation};

/// Position arithmetic and syncs resolved when the chain is set up
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimarySettings {
    pub select_sync_position: i64,
    pub since_sync_position: Option<i64>,
    pub since_result_sync_position: Option<i64>,
    pub after_result_sync_position: Option<i64>,
    pub select_previous_value: bool,
    pub polator_time_limit: Option<Duration>,
    /// Sync used for input position arithmetic
    pub sync: Option<TimeSync>,
    /// Relation sync, filtering batch lookups of the input
    pub input_sync: Option<TimeSync>,
    pub result_sync: Option<TimeSync>,
}

impl PrimarySettings {
    pub fn has_select_sync_position(&self) -> bool {
        self.select_sync_position < 0
    }
}

/// Sync positions count backward; positive values are negated
fn sync_position(params: &Params, name: &'static str) -> Result<Option<i64>> {
    Ok(params.int(name)?.map(|position| {
        if position > 0 {
            warn!("{} {} is positive, using {}", name, position, -position);
            -position
        } else {
            position
        }
    }))
}

impl BehaviorChain {
    /// Build the chain of a relation
    ///
    /// The first link must be a primary behavior; the relation's params
    /// (over the input point's) are overlaid by the first link's own.
    pub fn set_up(relation: Arc<Relation>, links: Vec<BehaviorLink>) -> Result<Self> {
        let name = format!("{} -> {}", relation.input.name, relation.result.name);
        let Some(head) = links.first() else {
            return Err(BehaviorError::NoPrimary(name));
        };
        if !head.kind.is_primary_capable() {
            return Err(BehaviorError::NoPrimary(name));
        }
        if links.iter().skip(1).any(|link| link.kind.is_primary_only()) {
            return Err(BehaviorError::MultiplePrimary(name));
        }

        let params = relation.effective_params().overlaid(&head.params);
        let select_sync_position = sync_position(&params, SELECT_SYNC_POSITION)?.unwrap_or(0);
        let since_sync_position = sync_position(&params, SINCE_SYNC_POSITION)?;
        let since_result_sync_position = sync_position(&params, SINCE_RESULT_SYNC_POSITION)?;
        let after_result_sync_position = sync_position(&params, AFTER_RESULT_SYNC_POSITION)?;

        if after_result_sync_position == Some(0) {
            return Err(BehaviorError::ZeroNotSupported(AFTER_RESULT_SYNC_POSITION));
        }

        let bounds: Vec<&str> = [
            (SINCE_SYNC_POSITION, since_sync_position),
            (SINCE_RESULT_SYNC_POSITION, since_result_sync_position),
            (AFTER_RESULT_SYNC_POSITION, after_result_sync_position),
        ]
        .into_iter()
        .filter_map(|(name, position)| position.map(|_| name))
        .collect();
        if bounds.len() > 1 {
            return Err(BehaviorError::MutuallyExclusive(bounds.join(", ")));
        }

        if let Some(since) = since_sync_position {
            if select_sync_position < since {
                return Err(BehaviorError::InvalidSelectionInterval);
            }
        }

        let result_sync = relation.result.sync.clone();
        if result_sync.is_none() {
            if since_result_sync_position.is_some() {
                return Err(BehaviorError::SyncResultNeeded(SINCE_RESULT_SYNC_POSITION));
            }
            if after_result_sync_position.is_some() {
                return Err(BehaviorError::SyncResultNeeded(AFTER_RESULT_SYNC_POSITION));
            }
        }

        let has_select = select_sync_position < 0;
        let sync = match &relation.sync {
            Some(sync) => Some(sync.clone()),
            None if has_select || since_sync_position.is_some() => {
                let Some(sync) = relation.input.sync.clone() else {
                    let param = if has_select {
                        SELECT_SYNC_POSITION
                    } else {
                        SINCE_SYNC_POSITION
                    };
                    return Err(BehaviorError::SyncInputNeeded(param));
                };
                Some(sync)
            },
            None => match (&result_sync, &relation.input.sync) {
                (Some(result), Some(input)) if result != input => Some(input.clone()),
                _ => None,
            },
        };

        let settings = PrimarySettings {
            select_sync_position,
            since_sync_position,
            since_result_sync_position,
            after_result_sync_position,
            select_previous_value: params.bool(SELECT_PREVIOUS_VALUE)?.unwrap_or(false),
            polator_time_limit: params.elapsed(POLATOR_TIME_LIMIT)?,
            sync,
            input_sync: relation.sync.clone(),
            result_sync,
        };
        debug!("Set up {} with {:?}", name, settings);

        Ok(Self {
            relation,
            links,
            settings,
        })
    }

    /// Check parameter compatibility of every behavior in the chain
    ///
    /// All rejections are returned, not just the first.
    pub fn validate(&self) -> std::result::Result<(), Vec<BehaviorError>> {
        let mut errors = Vec::new();

        for link in &self.links {
            self.validate_link(link.kind, &mut errors);
        }

        let primary = self.primary_kind().as_str();
        if !self.is_synchronized() {
            if self.is_input_extrapolated() {
                errors.push(BehaviorError::ExtrapolatedNotSupported(primary));
            }
            if self.is_input_interpolated() {
                errors.push(BehaviorError::InterpolatedNotSupported(primary));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for error in &errors {
                warn!("{}: {}", self, error);
            }
            Err(errors)
        }
    }

    fn validate_link(&self, kind: BehaviorKind, errors: &mut Vec<BehaviorError>) {
        let settings = &self.settings;
        let behavior = kind.as_str();
        let mut incompatible = |set: bool, param: &'static str| {
            if set {
                errors.push(BehaviorError::Incompatible { behavior, param });
            }
        };

        match kind {
            BehaviorKind::AlwaysTriggers | BehaviorKind::TriggersNew => {
                incompatible(settings.has_select_sync_position(), SELECT_SYNC_POSITION);
                incompatible(settings.since_sync_position.is_some(), SINCE_SYNC_POSITION);
                incompatible(
                    settings.since_result_sync_position.is_some(),
                    SINCE_RESULT_SYNC_POSITION,
                );
                incompatible(settings.select_previous_value, SELECT_PREVIOUS_VALUE);
                self.validate_no_loop(errors);
            },
            BehaviorKind::Retriggers => {
                incompatible(settings.has_select_sync_position(), SELECT_SYNC_POSITION);
            },
            BehaviorKind::Synchronized => {
                incompatible(settings.select_previous_value, SELECT_PREVIOUS_VALUE);
                incompatible(settings.since_sync_position.is_some(), SINCE_SYNC_POSITION);
                incompatible(
                    settings.since_result_sync_position.is_some(),
                    SINCE_RESULT_SYNC_POSITION,
                );
                incompatible(
                    settings.after_result_sync_position.is_some(),
                    AFTER_RESULT_SYNC_POSITION,
                );
                if !settings.has_select_sync_position() {
                    self.validate_no_loop(errors);
                }
            },
            BehaviorKind::NeverTriggers
            | BehaviorKind::Interpolated
            | BehaviorKind::Extrapolated
            | BehaviorKind::Required => {},
        }
    }

    fn validate_no_loop(&self, errors: &mut Vec<BehaviorError>) {
        if self.relation.is_loop() {
            errors.push(BehaviorError::TriggerLoop(self.input_point().to_string()));
        }
    }
}
