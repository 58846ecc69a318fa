//! The runtime value model shared by evaluation, inputs, and display.
use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance used by the `=` and `<>` operators to absorb floating-point error.
pub const EPSILON: f64 = 1e-9;

/// The atomic unit of data in the engine.
///
/// Collections keep `BTreeMap` keys so that repeated evaluations of the same
/// model iterate (and therefore compute and serialize) in a stable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Coerces this value to a double.
    ///
    /// Numeric strings parse; collections are a type error.
    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EvalError::NonNumeric(s.clone())),
            Value::Array(_) | Value::Object(_) => {
                Err(EvalError::CollectionAsScalar(self.type_name().to_string()))
            }
        }
    }

    /// Flattens scalars and (nested) arrays into one list of doubles.
    ///
    /// Used by the aggregation functions; objects are rejected.
    pub fn flatten_into(&self, out: &mut Vec<f64>) -> Result<(), EvalError> {
        match self {
            Value::Array(items) => {
                for item in items {
                    item.flatten_into(out)?;
                }
                Ok(())
            }
            _ => {
                out.push(self.as_number()?);
                Ok(())
            }
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Bridges a `serde_json` value into the engine's value model.
    ///
    /// Null maps to 0.0 and booleans to 1.0/0.0 so that decoded JSON inputs
    /// always aggregate cleanly.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Number(0.0),
            serde_json::Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Epsilon comparison backing the `=` / `<>` operators.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Array(items) => write!(f, "[len={}]", items.len()),
            Value::Object(map) => write!(f, "{{fields={}}}", map.len()),
        }
    }
}
