//! Point values and result values

use std::fmt;
use std::sync::Arc;

use pointflow_sync::Stamp;
use serde::{Deserialize, Serialize};

/// Value carried by a point value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Null | Self::Text(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Time-stamped value of a point
#[derive(Debug, Clone, PartialEq)]
pub struct PointValue {
    pub point: Arc<str>,
    pub stamp: Stamp,
    pub state: Option<String>,
    pub value: Value,
}

impl PointValue {
    pub fn new(point: impl Into<Arc<str>>, stamp: Stamp, value: impl Into<Value>) -> Self {
        Self {
            point: point.into(),
            stamp,
            state: None,
            value: value.into(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} = {}", self.point, self.stamp.to_rfc3339(), self.value)?;
        if let Some(state) = &self.state {
            write!(f, " [{}]", state)?;
        }
        Ok(())
    }
}

/// Result awaiting computation, with the inputs selected for it
///
/// Inputs are in relation order; an absent input is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultValue {
    pub point: Arc<str>,
    pub stamp: Stamp,
    pub inputs: Vec<Option<PointValue>>,
}

impl ResultValue {
    pub fn new(point: Arc<str>, stamp: Stamp) -> Self {
        Self {
            point,
            stamp,
            inputs: Vec::new(),
        }
    }

    pub fn add_input(&mut self, input: Option<PointValue>) {
        self.inputs.push(input);
    }

    /// Input value for a point, if selected and present
    pub fn input(&self, point: &str) -> Option<&PointValue> {
        self.inputs
            .iter()
            .flatten()
            .find(|value| &*value.point == point)
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} <- [", self.point, self.stamp.to_rfc3339())?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match input {
                Some(value) => write!(f, "{}", value)?,
                None => write!(f, "absent")?,
            }
        }
        write!(f, "]")
    }
}
