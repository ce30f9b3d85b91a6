//! Debug trace model (spec.md §6.3, §7).
//!
//! Populated only when a [`crate::context::Context`] query runs with
//! `debug: true`; an empty, allocation-free no-op path is used otherwise
//! so tracing never costs anything on the hot path (spec.md §4.5 "Emit a
//! debug trace entry if enabled").

use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// One entry recorded each time the resolver fetches or derives a value
/// at a schema node (spec.md §6.3).
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// The absolute path of the node this entry describes, e.g. `$.a.b[i].c`.
    pub output: String,
    pub result: Value,
    /// Bound input name → resolved value, for derived nodes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, Value>,
    /// The rule's source text, supplied verbatim (spec.md §9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calc: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conditions: IndexMap<String, Value>,
    /// Set when a calc threw, a presence validation failed non-fatally,
    /// or the cycle guard fired (spec.md §7).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// Accumulates [`TraceEntry`] values for one top-level query. Cheap to
/// construct and a no-op to push into when tracing is disabled.
#[derive(Debug, Clone, Default)]
pub struct DebugTrace {
    enabled: bool,
    entries: Vec<TraceEntry>,
}

impl DebugTrace {
    pub fn new(enabled: bool) -> Self {
        DebugTrace {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push(&mut self, entry: TraceEntry) {
        if self.enabled {
            self.entries.push(entry);
        }
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trace_drops_entries() {
        let mut trace = DebugTrace::new(false);
        trace.push(TraceEntry {
            output: "$.a".to_string(),
            result: Value::Int(1),
            inputs: IndexMap::new(),
            calc: None,
            location: "$.a".to_string(),
            conditions: IndexMap::new(),
            exception: None,
        });
        assert!(trace.entries().is_empty());
    }

    #[test]
    fn enabled_trace_keeps_entries_in_order() {
        let mut trace = DebugTrace::new(true);
        for i in 0..3 {
            trace.push(TraceEntry {
                output: format!("$.a{i}"),
                result: Value::Int(i as i64),
                inputs: IndexMap::new(),
                calc: None,
                location: format!("$.a{i}"),
                conditions: IndexMap::new(),
                exception: None,
            });
        }
        assert_eq!(trace.entries().len(), 3);
        assert_eq!(trace.entries()[1].output, "$.a1");
    }
}
