//! Projection / serialization (spec.md §4.6).
//!
//! Two modes of output assembly: *identity mode* returns whatever value
//! the walk landed on; *preserve-keys mode* is entered whenever the walk
//! crosses a [`crate::path::Group`] and builds a fresh object keyed by
//! each option's terminal segment (spec.md §9 Open Question (b): option
//! order is left-to-right, which `IndexMap` gives for free).

use crate::path::{Path, Segment};
use crate::schema::{Graph, NodeId};
use crate::value::{Value, ValueMap};

/// The key a group option contributes in preserve-keys mode: the option's
/// terminal segment (spec.md §4.6 "the terminal segment for nested
/// groups"), falling back to the rendered path for anything stranger
/// (a nested group or range as an option).
pub fn option_key(path: &Path) -> String {
    match path.parts.last() {
        Some(Segment::Part(part)) => part.part.clone(),
        Some(Segment::Range(range)) => format!("{}..{}", range.lo, range.hi),
        Some(Segment::Group(_)) | None => path.render(),
    }
}

/// Assemble a preserve-keys container from `(key, value)` pairs in the
/// order supplied (left-to-right option order, spec.md §9).
pub fn merge_preserving_keys(entries: Vec<(String, Value)>) -> Value {
    let mut map = ValueMap::new();
    for (key, value) in entries {
        map.insert(key, value);
    }
    Value::Object(map)
}

/// Depth past which `to_json_filtered` emits the circular-reference
/// sentinel rather than recursing further. Rust's owned `Value` tree
/// cannot contain a genuine reference cycle (there is no `Rc` aliasing
/// anywhere in the model — see DESIGN.md), so this is a depth-bounded
/// safety net rather than a live visited-set cycle detector, mirroring
/// the resolver's own depth-bounded cycle guard (spec.md §4.5).
const MAX_JSON_DEPTH: usize = 256;

/// `get_json` (spec.md §4.7): strips `Missing` values and `invisible`
/// fields while preserving structural keys, walking the schema node tree
/// in lock-step with the value tree so `invisible` can be honored even
/// for nested objects.
pub fn to_json_filtered(graph: &Graph, node: NodeId, value: &Value) -> serde_json::Value {
    to_json_filtered_depth(graph, node, value, 0)
}

fn to_json_filtered_depth(
    graph: &Graph,
    node: NodeId,
    value: &Value,
    depth: usize,
) -> serde_json::Value {
    if depth > MAX_JSON_DEPTH {
        let mut sentinel = serde_json::Map::new();
        sentinel.insert(
            "^ref".to_string(),
            serde_json::Value::String("circular".to_string()),
        );
        return serde_json::Value::Object(sentinel);
    }

    match value {
        Value::Missing(_) => serde_json::Value::Null,
        Value::Array(items) => {
            let child = graph.node(node).items().unwrap_or(node);
            serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| to_json_filtered_depth(graph, child, v, depth + 1))
                    .collect(),
            )
        }
        Value::Object(map) => {
            let schema_node = graph.node(node);
            let mut out = serde_json::Map::new();
            for (key, v) in map {
                if v.is_missing() {
                    continue;
                }
                match schema_node
                    .property(key)
                    .or_else(|| schema_node.matching_pattern(key))
                {
                    Some(child_id) => {
                        if graph.node(child_id).invisible {
                            continue;
                        }
                        out.insert(key.clone(), to_json_filtered_depth(graph, child_id, v, depth + 1));
                    }
                    None => {
                        out.insert(key.clone(), v.to_json());
                    }
                }
            }
            serde_json::Value::Object(out)
        }
        other => other.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Graph;
    use serde_json::json;

    #[test]
    fn option_key_uses_terminal_segment() {
        let path = crate::path::parse_path("a.b.c", false).unwrap();
        assert_eq!(option_key(&path), "c");
    }

    #[test]
    fn merge_preserving_keys_keeps_left_to_right_order() {
        let merged = merge_preserving_keys(vec![
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(1)),
        ]);
        let obj = merged.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn to_json_filtered_drops_invisible_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "visible": {"type": "string"},
                "hidden": {"type": "string", "invisible": true},
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let mut map = ValueMap::new();
        map.insert("visible".to_string(), Value::String("x".to_string()));
        map.insert("hidden".to_string(), Value::String("y".to_string()));
        let value = Value::Object(map);
        let json_out = to_json_filtered(&graph, graph.root(), &value);
        assert!(json_out.get("visible").is_some());
        assert!(json_out.get("hidden").is_none());
    }
}
