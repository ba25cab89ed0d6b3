//! Points, parameters and point relations

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use pointflow_sync::{parse_elapsed, TimeSync};
use serde::{Deserialize, Serialize};

use crate::error::{BehaviorError, Result};

/// Parameter value as written in metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Named parameters with typed lookups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Integer parameter; empty text counts as unset
    pub fn int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(ParamValue::Int(i)) => Ok(Some(*i)),
            Some(ParamValue::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(ParamValue::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| {
                    BehaviorError::bad_param(name, format!("'{}' is not an integer", text))
                }),
            Some(other) => Err(BehaviorError::bad_param(
                name,
                format!("{:?} is not an integer", other),
            )),
        }
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(ParamValue::Int(i)) => Ok(Some(*i != 0)),
            Some(ParamValue::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" => Ok(Some(false)),
                _ => Err(BehaviorError::bad_param(
                    name,
                    format!("'{}' is not a boolean", text),
                )),
            },
            Some(ParamValue::Float(f)) => Err(BehaviorError::bad_param(
                name,
                format!("{} is not a boolean", f),
            )),
        }
    }

    /// Elapsed time parameter; numbers are seconds
    pub fn elapsed(&self, name: &str) -> Result<Option<Duration>> {
        match self.get(name) {
            None => Ok(None),
            Some(ParamValue::Int(seconds)) => Duration::try_seconds(*seconds)
                .map(Some)
                .ok_or_else(|| BehaviorError::bad_param(name, "elapsed time out of range")),
            Some(ParamValue::Float(seconds)) if seconds.is_finite() && *seconds >= 0.0 => {
                Duration::try_milliseconds((seconds * 1000.0).round() as i64)
                    .map(Some)
                    .ok_or_else(|| BehaviorError::bad_param(name, "elapsed time out of range"))
            },
            Some(ParamValue::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(ParamValue::Text(text)) => parse_elapsed(text)
                .map(Some)
                .map_err(|e| BehaviorError::bad_param(name, e.to_string())),
            Some(other) => Err(BehaviorError::bad_param(
                name,
                format!("{:?} is not an elapsed time", other),
            )),
        }
    }

    /// These params with entries from `over` taking precedence
    pub fn overlaid(&self, over: &Params) -> Params {
        let mut merged = self.0.clone();
        merged.extend(over.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Params(merged)
    }
}

/// Named time series
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub name: Arc<str>,
    pub sync: Option<TimeSync>,
    pub params: Params,
}

impl Point {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            sync: None,
            params: Params::default(),
        }
    }

    pub fn with_sync(mut self, sync: TimeSync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Input to result edge
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub input: Arc<Point>,
    pub result: Arc<Point>,
    pub params: Params,
    pub sync: Option<TimeSync>,
}

impl Relation {
    pub fn new(input: Arc<Point>, result: Arc<Point>) -> Self {
        Self {
            input,
            result,
            params: Params::default(),
            sync: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_sync(mut self, sync: TimeSync) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Input point params overridden by the relation's own
    pub fn effective_params(&self) -> Params {
        self.input.params.overlaid(&self.params)
    }

    pub fn is_loop(&self) -> bool {
        self.input.name == self.result.name
    }
}
