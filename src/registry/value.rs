//! Flat result values: analyses produce a flat,
//! serializable key/value map suitable for tabulation by the batch engine
//! and for JSON export to a GUI.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single result field: `Float | Int | Bool | Str | FloatArray | IntArray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    FloatArray(Vec<f64>),
    IntArray(Vec<i64>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(v)
    }
}
impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntArray(v)
    }
}

/// Flat key/value result of one analysis invocation. Numeric absence is
/// represented by `f64::NAN` rather than by key omission, so batch
/// rows always carry the full column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMap(HashMap<String, Value>);

impl ResultMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Marks the analysis as failed by setting `<prefix>_error` to `message`
    /// without clearing any fields already populated.
    pub fn set_error(&mut self, prefix: &str, message: impl Into<String>) -> &mut Self {
        self.set(format!("{prefix}_error"), message.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_error(&self) -> bool {
        self.0.keys().any(|k| k.ends_with("_error"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Absent-numeric sentinel, matching "Numeric NaNs represent absent
/// or failed" convention.
pub const ABSENT: f64 = f64::NAN;
