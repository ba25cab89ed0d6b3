//! Processor metadata: points, relations and their behaviors
//!
//! ```yaml
//! points:
//!   - name: meter.total
//!     sync: { crontab: "*/15" }
//!   - name: meter.rate
//! relations:
//!   - input: meter.total
//!     result: meter.rate
//!     behaviors: [Synchronized, Required]
//!     params: { SelectSyncPosition: -1 }
//! ```

use std::path::Path;
use std::sync::Arc;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use pointflow_sync::SyncConfig;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::behavior::{BehaviorChain, BehaviorKind, BehaviorLink, SELECT_SYNC_POSITION};
use crate::error::{BehaviorError, Result};
use crate::point::{Params, Point, Relation};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub points: Vec<PointConfig>,
    pub relations: Vec<RelationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    pub input: String,
    pub result: String,

    #[serde(default)]
    pub behaviors: Vec<BehaviorConfig>,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

/// Behavior by name, optionally with its own params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BehaviorConfig {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        params: Params,
    },
}

impl BehaviorConfig {
    fn to_link(&self) -> Result<BehaviorLink> {
        match self {
            Self::Name(name) => Ok(BehaviorLink::new(name.parse()?)),
            Self::Detailed { name, params } => {
                Ok(BehaviorLink::new(name.parse()?).with_params(params.clone()))
            },
        }
    }
}

/// Primary behavior added to a relation that names none
///
/// A point feeding itself retriggers its next value unless a select
/// position is given; everything else is synchronized.
pub fn default_primary(relation: &Relation) -> Result<BehaviorKind> {
    let select = relation.effective_params().int(SELECT_SYNC_POSITION)?;
    if relation.is_loop() && select.map_or(true, |position| position >= 0) {
        Ok(BehaviorKind::Retriggers)
    } else {
        Ok(BehaviorKind::Synchronized)
    }
}

impl ProcessorConfig {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                BehaviorError::config(format!(
                    "Failed to load {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| BehaviorError::config(e.to_string()))
    }

    pub fn points(&self) -> Result<FxHashMap<Arc<str>, Arc<Point>>> {
        let mut points = FxHashMap::default();
        for config in &self.points {
            let mut point = Point::new(config.name.as_str()).with_params(config.params.clone());
            if let Some(sync) = &config.sync {
                point = point.with_sync(sync.build()?);
            }
            if points
                .insert(Arc::clone(&point.name), Arc::new(point))
                .is_some()
            {
                return Err(BehaviorError::config(format!(
                    "Point {} defined twice",
                    config.name
                )));
            }
        }
        Ok(points)
    }

    /// Relations with their behavior links, primary first
    pub fn relations(&self) -> Result<Vec<(Arc<Relation>, Vec<BehaviorLink>)>> {
        let points = self.points()?;
        let lookup = |name: &str| {
            points
                .get(name)
                .cloned()
                .ok_or_else(|| BehaviorError::UnknownPoint(name.to_string()))
        };

        self.relations
            .iter()
            .map(|config| {
                let mut relation = Relation::new(
                    lookup(config.input.as_str())?,
                    lookup(config.result.as_str())?,
                )
                .with_params(config.params.clone());
                if let Some(sync) = &config.sync {
                    relation = relation.with_sync(sync.build()?);
                }

                let mut links = config
                    .behaviors
                    .iter()
                    .map(BehaviorConfig::to_link)
                    .collect::<Result<Vec<_>>>()?;
                match links.iter().position(|link| link.kind.is_primary_capable()) {
                    Some(0) => {},
                    Some(primary) => {
                        let link = links.remove(primary);
                        links.insert(0, link);
                    },
                    None => {
                        let kind = default_primary(&relation)?;
                        debug!(
                            "Relation {} -> {} inherits {}",
                            config.input, config.result, kind
                        );
                        links.insert(0, BehaviorLink::new(kind).inherited());
                    },
                }

                Ok((Arc::new(relation), links))
            })
            .collect()
    }

    /// Set up every relation's chain, failing on the first setup error
    pub fn build_chains(&self) -> Result<Vec<BehaviorChain>> {
        self.relations()?
            .into_iter()
            .map(|(relation, links)| BehaviorChain::set_up(relation, links))
            .collect()
    }
}
