//! Cart Totals Demonstration
//!
//! Shows the core pattern a LazyGraph schema is built around: defaults
//! fill in for missing input, a per-item rule derives each line total,
//! and a top-level rule aggregates across the array with `sum`.
//!
//! Features shown:
//! - `default` filling a property the input document omits
//! - a string-shorthand `rule` (`${price} * ${quantity}`)
//! - an aggregate rule reading an array projection (`items.total`)
//! - `get_json` stripping `Missing` values from the rendered output

use lazygraph::{Context, Graph};
use serde_json::json;

fn main() {
    println!("=== LazyGraph Cart Totals Demo ===\n");

    let schema = json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "price": {"type": "number", "default": 1},
                        "quantity": {"type": "integer", "default": 1},
                        "total": {"type": "number", "rule": "${price} * ${quantity}"}
                    }
                }
            },
            "cart_total": {
                "type": "number",
                "rule": {"inputs": ["items.total"], "calc": "sum(total)"}
            }
        }
    });

    let graph = Graph::from_schema(&schema).expect("schema compiles");

    let input = json!({
        "items": [
            {"name": "widget", "price": 5, "quantity": 2},
            {"name": "gadget"}
        ]
    });
    println!("Input: {input}\n");

    let ctx = Context::new(&graph, input);

    let totals = ctx.get("items.total").expect("items.total resolves");
    println!("Per-item totals (price defaults to 1, quantity defaults to 1): {totals}");

    let cart_total = ctx.get("cart_total").expect("cart_total resolves");
    println!("Cart total (memoized sum over items.total): {cart_total}");

    let rendered = ctx.get_json("").expect("whole-graph query resolves");
    println!("\nFull rendered document:\n{}", serde_json::to_string_pretty(&rendered).unwrap());
}
