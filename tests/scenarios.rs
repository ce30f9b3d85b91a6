//! Integration tests for the worked scenarios in spec.md §8.2, exercised
//! through the public `Context` façade rather than the resolver's internal
//! entry points (covered in `src/resolver.rs`'s own unit tests).

use indexmap::IndexMap;
use lazygraph::{Context, Graph, NativeRegistry, Value};
use serde_json::json;

/// §8.2 scenario 2: a preserve-keys `Group` projection over an array
/// produces one merged object per element (row-wise), not one array per
/// option (column-wise).
#[test]
fn projection_group_over_array_is_row_wise() {
    let schema = json!({
        "type": "object",
        "properties": {
            "books": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "pages": {"type": "integer"},
                        "is_long": {"type": "boolean", "rule": "${pages} > 200"}
                    }
                }
            }
        }
    });
    let graph = Graph::from_schema(&schema).unwrap();
    let input = json!({
        "books": [
            {"name": "book1", "pages": 100},
            {"name": "book2", "pages": 200},
            {"name": "book3", "pages": 300},
        ]
    });
    let ctx = Context::new(&graph, input);

    let result = ctx.get("books[name,is_long]").unwrap();
    let rows = result.as_array().unwrap();
    assert_eq!(rows.len(), 3);

    let expected = [("book1", false), ("book2", false), ("book3", true)];
    for (row, (name, is_long)) in rows.iter().zip(expected) {
        let obj = row.as_object().unwrap();
        assert_eq!(obj.get("name"), Some(&Value::String(name.to_string())));
        assert_eq!(obj.get("is_long"), Some(&Value::Bool(is_long)));
    }
}

/// §8.2 scenario 3: a three-node rule cycle with empty input resolves to
/// `Missing` rather than recursing forever, and the debug trace records
/// the cycle.
#[test]
fn three_node_cycle_resolves_to_missing_with_a_trace_entry() {
    let schema = json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "rule": "b"},
            "b": {"type": "number", "rule": "c"},
            "c": {"type": "number", "rule": "a"}
        }
    });
    let graph = Graph::from_schema(&schema).unwrap();
    let ctx = Context::new(&graph, json!({}));

    let response = ctx.resolve_with_trace("a");
    assert!(response.output.is_missing());
    let trace = response.debug_trace.expect("tracing was requested");
    assert!(trace
        .iter()
        .any(|entry| entry.exception.as_deref().unwrap_or("").contains("Infinite Recursion")));
}

/// §8.2 scenario 4: conditions gate sibling rules on a discriminant field;
/// only the matching branch invokes its calc, and a multi-path query
/// exposes the other two branches as `Missing`.
#[test]
fn conditional_branch_only_fires_the_matching_rule() {
    let schema = json!({
        "type": "object",
        "properties": {
            "mode": {"type": "string"},
            "celsius": {"type": "number", "default": 0},
            "fahrenheit_in": {"type": "number", "default": 0},
            "from_celsius": {
                "type": "number",
                "rule": {"inputs": ["mode", "celsius"], "conditions": {"mode": "celsius"}, "calc": "celsius * 9 / 5 + 32"}
            },
            "from_fahrenheit": {
                "type": "number",
                "rule": {"inputs": ["mode", "fahrenheit_in"], "conditions": {"mode": "fahrenheit"}, "calc": "fahrenheit_in"}
            }
        }
    });
    let graph = Graph::from_schema(&schema).unwrap();
    let ctx = Context::new(&graph, json!({"mode": "celsius", "celsius": 100}));

    let response = ctx.resolve(vec!["from_celsius", "from_fahrenheit"]);
    let obj = response.output.as_object().unwrap();
    assert_eq!(obj.get("from_celsius"), Some(&Value::Float(212.0)));
    assert!(obj.get("from_fahrenheit").unwrap().is_missing());
}

/// §8.2 scenario 5: a presence-validated dependency resolving to `Missing`
/// raises a `ValidationError` naming the offending path rather than
/// silently propagating `Missing` through the calc.
#[test]
fn presence_violation_names_the_offending_input() {
    let schema = json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "validate_presence": true},
            "b": {"type": "number", "validate_presence": true},
            "sum": {"type": "number", "rule": {"inputs": ["a", "b"], "calc": "a + b"}}
        }
    });
    let graph = Graph::from_schema(&schema).unwrap();
    let ctx = Context::new(&graph, json!({"a": 1}));

    let response = ctx.resolve("sum");
    let err = response.err.expect("missing required input must surface as an error");
    assert!(err.starts_with("ValidationError"), "error should name its class: {err}");
    assert!(err.contains('b'), "error should name the offending path: {err}");
}

/// §8.2 scenario 6: an index expression inside a bracket group
/// (`positions[position_id]`) is re-materialized per array element,
/// resolving `position_id` against the element's own frame rather than
/// wherever the indexed collection lives.
#[test]
fn dynamic_index_input_is_materialized_per_element() {
    let schema = json!({
        "type": "object",
        "properties": {
            "positions": {
                "type": "object",
                "patternProperties": {
                    "^[0-9]+$": {
                        "type": "object",
                        "properties": { "title": {"type": "string"} }
                    }
                }
            },
            "crew": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "position_id": {"type": "integer"},
                        "position": {"type": "object", "rule": "$.positions[position_id]"}
                    }
                }
            }
        }
    });
    let graph = Graph::from_schema(&schema).unwrap();
    let input = json!({
        "positions": {
            "1": {"title": "Captain"},
            "2": {"title": "Engineer"}
        },
        "crew": [
            {"position_id": 1},
            {"position_id": 2}
        ]
    });
    let ctx = Context::new(&graph, input);

    let positions = ctx.get("crew.position").unwrap();
    let rows = positions.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].as_object().unwrap().get("title"),
        Some(&Value::String("Captain".to_string()))
    );
    assert_eq!(
        rows[1].as_object().unwrap().get("title"),
        Some(&Value::String("Engineer".to_string()))
    );
}

/// Override dominance (spec.md §8.1): a concrete input value at a derived
/// node's key wins over its rule, and the calc never runs.
#[test]
fn override_dominance_skips_the_calc_entirely() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let mut natives = NativeRegistry::new();
    natives.register("never_called", move |_: &IndexMap<String, Value>| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Value::Int(0)
    });

    let schema = json!({
        "type": "object",
        "properties": {
            "total": {"type": "integer", "rule": {"inputs": [], "native": "never_called"}}
        }
    });
    let graph = Graph::from_schema_with_natives(&schema, &natives).unwrap();
    let ctx = Context::new(&graph, json!({"total": 42}));

    let value = ctx.get("total").unwrap();
    assert_eq!(value, Value::Int(42));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "a present value must short-circuit the calc");
}
