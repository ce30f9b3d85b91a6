//! Coercion rules applied when a value passes through a typed schema node
//! (spec.md §3.1).

use super::Value;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// The "type" a schema node declares for its value, independent of the
/// `Value` enum itself so a node can be typed `const` against any
/// particular literal.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    Any,
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Decimal,
    Date,
    Time,
    Timestamp,
    Const(Value),
    Object,
    Array,
}

impl NodeType {
    pub fn from_schema_str(s: &str) -> Option<NodeType> {
        Some(match s {
            "null" => NodeType::Null,
            "boolean" => NodeType::Boolean,
            "integer" => NodeType::Integer,
            "number" => NodeType::Number,
            "string" => NodeType::String,
            "decimal" => NodeType::Decimal,
            "date" => NodeType::Date,
            "time" => NodeType::Time,
            "timestamp" => NodeType::Timestamp,
            "object" => NodeType::Object,
            "array" => NodeType::Array,
            _ => return None,
        })
    }

    /// Whether this type coerces a scalar in place rather than describing
    /// a container shape validated structurally (spec.md §4.2: "simple
    /// nodes" short-circuit without visiting children).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, NodeType::Object | NodeType::Array)
    }
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").unwrap())
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^-?(\d+(\.\d+)?(e[+-]?\d+)?)$").unwrap())
}

/// Apply the coercion rules of spec.md §3.1. `Missing` passes through
/// every coercion untouched (spec.md §3.4).
pub fn coerce(value: &Value, target: &NodeType) -> Value {
    // `boolean` is the one type spec.md §3.1 has coerce `Missing` to a
    // concrete value (`false`) rather than passing it through untouched.
    if value.is_missing() {
        return if matches!(target, NodeType::Boolean) {
            Value::Bool(false)
        } else {
            value.clone()
        };
    }

    match target {
        NodeType::Any => value.clone(),
        NodeType::Null => {
            if value.is_null() {
                Value::Null
            } else {
                Value::missing_because("expected null")
            }
        }
        NodeType::Boolean => Value::Bool(value.is_truthy()),
        NodeType::Integer => match value {
            Value::Int(_) => value.clone(),
            Value::Float(f) if f.fract() == 0.0 => Value::Int(*f as i64),
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::missing_because("not an integer")),
            Value::Bool(b) => Value::Int(i64::from(*b)),
            _ => Value::missing_because("not an integer"),
        },
        NodeType::Number => match value {
            Value::Int(i) => Value::Float(*i as f64),
            Value::Float(_) => value.clone(),
            Value::String(s) => s
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::missing_because("not a number")),
            _ => Value::missing_because("not a number"),
        },
        NodeType::String => Value::String(value.to_display_string()),
        NodeType::Decimal => match value {
            Value::Decimal(_) => value.clone(),
            Value::Int(i) => Value::Decimal(Decimal::from(*i)),
            Value::Float(f) => Decimal::from_str(&f.to_string())
                .map(Value::Decimal)
                .unwrap_or_else(|_| Value::missing_because("not a decimal")),
            Value::String(s) if decimal_pattern().is_match(s) => {
                let parsed = if s.to_ascii_lowercase().contains('e') {
                    Decimal::from_scientific(&s.to_ascii_lowercase())
                } else {
                    Decimal::from_str(s)
                };
                parsed
                    .map(Value::Decimal)
                    .unwrap_or_else(|_| Value::missing_because("not a decimal"))
            }
            _ => Value::missing_because("not a decimal"),
        },
        NodeType::Date => match value {
            Value::Date(_) => value.clone(),
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .unwrap_or_else(|_| Value::missing_because("not an ISO date")),
            _ => Value::missing_because("not a date"),
        },
        NodeType::Time => match value {
            Value::Time(_) => value.clone(),
            Value::String(s) if time_pattern().is_match(s) => Value::Time(s.clone()),
            _ => Value::missing_because("not a valid time string"),
        },
        NodeType::Timestamp => match value {
            Value::Timestamp(_) => value.clone(),
            Value::Int(i) => Utc
                .timestamp_opt(*i, 0)
                .single()
                .map(Value::Timestamp)
                .unwrap_or_else(|| Value::missing_because("out-of-range epoch seconds")),
            Value::Float(f) => {
                let secs = f.trunc() as i64;
                let nanos = ((f.fract()) * 1_000_000_000.0).round() as u32;
                Utc.timestamp_opt(secs, nanos)
                    .single()
                    .map(Value::Timestamp)
                    .unwrap_or_else(|| Value::missing_because("out-of-range epoch seconds"))
            }
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| Value::missing_because("not an RFC3339 timestamp")),
            _ => Value::missing_because("not a timestamp"),
        },
        NodeType::Const(expected) => {
            if value == expected {
                value.clone()
            } else {
                Value::missing_because("does not match const")
            }
        }
        NodeType::Object | NodeType::Array => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_coercion_from_string() {
        let v = coerce(&Value::String("19.99".into()), &NodeType::Decimal);
        assert_eq!(v, Value::Decimal(Decimal::from_str("19.99").unwrap()));
    }

    #[test]
    fn decimal_coercion_from_scientific_notation() {
        let v = coerce(&Value::String("1.5e10".into()), &NodeType::Decimal);
        assert_eq!(v, Value::Decimal(Decimal::from_scientific("1.5e10").unwrap()));

        let negative = coerce(&Value::String("-2.5E-3".into()), &NodeType::Decimal);
        assert_eq!(
            negative,
            Value::Decimal(Decimal::from_scientific("-2.5e-3").unwrap())
        );

        let no_fraction = coerce(&Value::String("3e2".into()), &NodeType::Decimal);
        assert_eq!(no_fraction, Value::Decimal(Decimal::from_scientific("3e2").unwrap()));
    }

    #[test]
    fn date_coercion_rejects_bad_format() {
        let v = coerce(&Value::String("not-a-date".into()), &NodeType::Date);
        assert!(v.is_missing());
    }

    #[test]
    fn timestamp_from_epoch_seconds() {
        let v = coerce(&Value::Int(0), &NodeType::Timestamp);
        match v {
            Value::Timestamp(ts) => assert_eq!(ts.timestamp(), 0),
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn boolean_coercion_is_ruby_truthy() {
        assert_eq!(coerce(&Value::Int(0), &NodeType::Boolean), Value::Bool(true));
        assert_eq!(coerce(&Value::Null, &NodeType::Boolean), Value::Bool(false));
        assert_eq!(
            coerce(&Value::missing(), &NodeType::Boolean),
            Value::Bool(false)
        );
    }

    #[test]
    fn missing_passes_through_every_coercion() {
        for target in [
            NodeType::Integer,
            NodeType::Decimal,
            NodeType::Date,
            NodeType::String,
        ] {
            assert!(coerce(&Value::missing(), &target).is_missing());
        }
    }

    #[test]
    fn time_pattern_validates_without_parsing() {
        assert_eq!(
            coerce(&Value::String("08:30:00".into()), &NodeType::Time),
            Value::Time("08:30:00".into())
        );
        assert!(coerce(&Value::String("8:30".into()), &NodeType::Time).is_missing());
    }
}
