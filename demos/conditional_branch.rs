//! Conditional Branch Demonstration
//!
//! Three derived properties share the same sibling inputs but are each
//! gated by a `conditions` clause on the input document's `mode` field.
//! Only the branch whose condition matches ever invokes its calc; the
//! other two resolve to `Missing` without their native closures running
//! at all.
//!
//! Features shown:
//! - `conditions` gating a rule on an input's value
//! - `{"native": "<name>"}` rule descriptors bound through a `NativeRegistry`
//! - a multi-path query unioning several branches into one response

use indexmap::IndexMap;
use lazygraph::{Context, Graph, NativeRegistry, Value};
use serde_json::json;

fn hsl_to_rgb(bindings: &IndexMap<String, Value>) -> Value {
    let h = bindings.get("h").map(Value::to_f).unwrap_or(0.0);
    let s = bindings.get("s").map(Value::to_f).unwrap_or(0.0);
    let l = bindings.get("l").map(Value::to_f).unwrap_or(0.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = (h / 60.0).rem_euclid(6.0);
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;
    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Value::Array(vec![
        Value::Float(((r1 + m) * 255.0 * 10.0).round() / 10.0),
        Value::Float(((g1 + m) * 255.0 * 10.0).round() / 10.0),
        Value::Float(((b1 + m) * 255.0 * 10.0).round() / 10.0),
    ])
}

fn cmyk_to_rgb(bindings: &IndexMap<String, Value>) -> Value {
    let c = bindings.get("c").map(Value::to_f).unwrap_or(0.0);
    let m = bindings.get("m").map(Value::to_f).unwrap_or(0.0);
    let y = bindings.get("y").map(Value::to_f).unwrap_or(0.0);
    let k = bindings.get("k").map(Value::to_f).unwrap_or(0.0);

    let channel = |a: f64| 255.0 * (1.0 - a) * (1.0 - k);
    Value::Array(vec![
        Value::Float(channel(c)),
        Value::Float(channel(m)),
        Value::Float(channel(y)),
    ])
}

fn passthrough_rgb(bindings: &IndexMap<String, Value>) -> Value {
    Value::Array(vec![
        bindings.get("r").cloned().unwrap_or_else(Value::missing),
        bindings.get("g").cloned().unwrap_or_else(Value::missing),
        bindings.get("b").cloned().unwrap_or_else(Value::missing),
    ])
}

fn main() {
    println!("=== LazyGraph Conditional Branch Demo ===\n");

    let schema = json!({
        "type": "object",
        "properties": {
            "mode": {"type": "string"},
            "h": {"type": "number", "default": 0},
            "s": {"type": "number", "default": 0},
            "l": {"type": "number", "default": 0},
            "c": {"type": "number", "default": 0},
            "m": {"type": "number", "default": 0},
            "y": {"type": "number", "default": 0},
            "k": {"type": "number", "default": 0},
            "r": {"type": "number", "default": 0},
            "g": {"type": "number", "default": 0},
            "b": {"type": "number", "default": 0},
            "hsl_rgb": {
                "type": "array",
                "items": {"type": "number"},
                "rule": {"inputs": ["mode", "h", "s", "l"], "conditions": {"mode": "hsl"}, "native": "hsl_to_rgb"}
            },
            "cmyk_rgb": {
                "type": "array",
                "items": {"type": "number"},
                "rule": {"inputs": ["mode", "c", "m", "y", "k"], "conditions": {"mode": "cmyk"}, "native": "cmyk_to_rgb"}
            },
            "raw_rgb": {
                "type": "array",
                "items": {"type": "number"},
                "rule": {"inputs": ["mode", "r", "g", "b"], "conditions": {"mode": "rgb"}, "native": "passthrough_rgb"}
            }
        }
    });

    let mut natives = NativeRegistry::new();
    natives
        .register("hsl_to_rgb", hsl_to_rgb)
        .register("cmyk_to_rgb", cmyk_to_rgb)
        .register("passthrough_rgb", passthrough_rgb);

    let graph = Graph::from_schema_with_natives(&schema, &natives).expect("schema compiles");

    let input = json!({"mode": "hsl", "h": 100, "s": 0.2, "l": 0.5});
    println!("Input: {input}\n");

    let ctx = Context::new(&graph, input);
    let branches = ctx.resolve(vec!["hsl_rgb", "cmyk_rgb", "raw_rgb"]);

    println!("hsl mode selected: hsl_rgb fires, the other two branches stay Missing.");
    println!("{}", serde_json::to_string_pretty(&ctx.get_json("").unwrap()).unwrap());
    println!("\nUnioned multi-path response: {:?}", branches.output);
}
