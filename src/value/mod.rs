//! # Value Model
//!
//! Scalar, container, and [`Missing`] representations (spec.md §3.1, §3.4)
//! plus the coercion rules applied whenever a value passes through a typed
//! schema node.
//!
//! `Value` is the one dynamic type that flows through the resolver: input
//! documents are deep-copied into it on entry to a [`crate::Context`] query,
//! nodes coerce it in place, and rule calcs read and return it.

mod coerce;
mod ops;

pub use coerce::{coerce, NodeType};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Insertion-ordered object frame. Keys never collide across distinct
/// strings — the "identity-compared maps" requirement in spec.md §4.6 is a
/// quirk of the original Ruby implementation's symbol/string duplication;
/// in Rust, `String` equality already gives the required disambiguation
/// (see DESIGN.md).
pub type ValueMap = IndexMap<String, Value>;

/// The one dynamic value type that flows through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// The distinguished sentinel that inhabits every type (spec.md §3.4).
    Missing(Missing),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Decimal(Decimal),
    Date(chrono::NaiveDate),
    /// Validated by pattern only; stored verbatim (spec.md §3.1).
    Time(String),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Array(Vec<Value>),
    Object(ValueMap),
}

/// The sentinel value. Carries an optional diagnostic trail that is only
/// ever populated when a [`crate::Context`] query runs with debug tracing
/// enabled (spec.md §3.4, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Missing {
    /// Why this value is missing, e.g. `"no default for 'price'"`, or the
    /// accumulated trail of field accesses that walked through `Missing`.
    pub reason: Option<String>,
}

impl Missing {
    pub fn new() -> Self {
        Missing { reason: None }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Missing {
            reason: Some(reason.into()),
        }
    }

    /// Extend the trail when debug tracing is on; otherwise return an
    /// undecorated `Missing` (spec.md §3.4: "accumulates a trace
    /// description (only when debug is enabled)").
    pub fn accessed(&self, field: &str, debug: bool) -> Missing {
        if !debug {
            return Missing::new();
        }
        let reason = match &self.reason {
            Some(prev) => format!("{prev}.{field}"),
            None => field.to_string(),
        };
        Missing::with_reason(reason)
    }
}

impl Value {
    pub fn missing() -> Value {
        Value::Missing(Missing::new())
    }

    pub fn missing_because(reason: impl Into<String>) -> Value {
        Value::Missing(Missing::with_reason(reason))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Ruby-style truthiness: only `Missing` and `false` (and, by
    /// extension, `Null`) are falsy (spec.md §3.1 boolean coercion).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Missing(_) | Value::Null | Value::Bool(false))
    }

    /// `Missing.to_i → 0` and friends (spec.md §3.4); also used by
    /// arithmetic ops so every numeric operand has a concrete `f64`.
    pub fn to_i(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => i64::from(*b),
            Value::Decimal(d) => d.trunc().try_into().unwrap_or(0),
            Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn to_f(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Decimal(d) => d.to_string().parse().unwrap_or(0.0),
            Value::String(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// `Missing.to_h → null` (spec.md §3.4): the "object view" of a value
    /// that is not itself a container.
    pub fn to_object(&self) -> Value {
        match self {
            Value::Object(_) => self.clone(),
            _ => Value::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Field access used by projection/resolver when the path descends
    /// into a value that has already become `Missing` — returns another
    /// `Missing`, optionally carrying the extended trail (spec.md §3.4).
    pub fn get_field(&self, field: &str, debug: bool) -> Value {
        match self {
            Value::Missing(m) => Value::Missing(m.accessed(field, debug)),
            Value::Object(map) => map.get(field).cloned().unwrap_or_else(Value::missing),
            _ => Value::missing(),
        }
    }

    /// `to_string` conversion used by the `string` coercion rule
    /// (spec.md §3.1).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Missing(_) => String::new(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Decimal(d) => d.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Time(t) => t.clone(),
            Value::Timestamp(t) => t.to_rfc3339(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
        }
    }

    /// Convert to a `serde_json::Value`, dropping `Missing` keys from
    /// objects as `get_json` requires (spec.md §4.6). Array elements that
    /// are themselves `Missing` become JSON `null` (arrays must not change
    /// length, since index position is meaningful).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing(_) => serde_json::Value::Null,
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Decimal(d) => serde_json::json!(d.to_string().parse::<f64>().unwrap_or(0.0)),
            Value::Date(d) => serde_json::Value::String(d.to_string()),
            Value::Time(t) => serde_json::Value::String(t.clone()),
            Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    if v.is_missing() {
                        continue;
                    }
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
        }
    }

    /// Deep-copy an input document from `serde_json::Value` into the
    /// engine's mutable value tree (spec.md §4.7: "deep-copy the input
    /// into a fresh mutable tree").
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = ValueMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), Value::from_json(v));
                }
                Value::Object(out)
            }
        }
    }
}

/// Equality rule from spec.md §3.4: "Equality with `null` is true" — this
/// applies specifically to `Missing`, not to `Value` in general (a present
/// `0` is not equal to `null`).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing(_), Value::Missing(_)) => true,
            (Value::Missing(_), Value::Null) | (Value::Null, Value::Missing(_)) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_equals_null() {
        assert_eq!(Value::missing(), Value::Null);
        assert_eq!(Value::Null, Value::missing());
    }

    #[test]
    fn missing_is_falsy() {
        assert!(!Value::missing().is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn missing_to_i_and_to_f() {
        assert_eq!(Value::missing().to_i(), 0);
        assert_eq!(Value::missing().to_f(), 0.0);
        assert_eq!(Value::missing().to_object(), Value::Null);
    }

    #[test]
    fn field_access_on_missing_accumulates_trace_only_when_debug() {
        let m = Value::missing();
        let next = m.get_field("a", true);
        assert!(next.is_missing());
        if let Value::Missing(missing) = next {
            assert_eq!(missing.reason.as_deref(), Some("a"));
        }

        let next_quiet = m.get_field("a", false);
        if let Value::Missing(missing) = next_quiet {
            assert_eq!(missing.reason, None);
        }
    }

    #[test]
    fn get_json_strips_missing_object_keys() {
        let mut map = ValueMap::new();
        map.insert("present".to_string(), Value::Int(1));
        map.insert("absent".to_string(), Value::missing());
        let obj = Value::Object(map);
        let json = obj.to_json();
        assert!(json.get("present").is_some());
        assert!(json.get("absent").is_none());
    }

    #[test]
    fn round_trip_json() {
        let json = serde_json::json!({"a": 1, "b": [1, 2.5, "x"], "c": null});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
