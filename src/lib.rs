//! # LazyGraph
//!
//! A stateless, JSON-Schema-driven rules engine for lazy, memoized
//! evaluation of derived values over structured data.
//!
//! A [`Graph`] is built once from a schema document that extends plain
//! JSON Schema with a `rule` keyword on any property: a string shorthand,
//! an expression, or a host-language closure registered through a
//! [`NativeRegistry`]. Building a graph never touches an input document —
//! it only compiles the schema's shape and its rules. Each input document
//! is then paired with the graph through a [`Context`], and every query
//! against that pairing walks the document lazily: a value is read from
//! the input if present, otherwise computed from its rule and memoized
//! for the remainder of that one query.
//!
//! ```
//! use lazygraph::{Context, Graph};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "price": {"type": "number", "default": 1},
//!         "quantity": {"type": "integer", "default": 1},
//!         "total": {"type": "number", "rule": "${price} * ${quantity}"}
//!     }
//! });
//!
//! let graph = Graph::from_schema(&schema).unwrap();
//! let ctx = Context::new(&graph, json!({"price": 5, "quantity": 2}));
//! assert_eq!(ctx.get("total").unwrap(), lazygraph::Value::Float(10.0));
//! ```
//!
//! The module layout mirrors the pipeline a query runs through:
//! [`path`] parses query/dependency path strings, [`schema`] builds and
//! compiles the graph from a schema document, [`resolver`] is the lazy
//! evaluator, [`projection`] turns the resolver's internal value tree
//! back into plain JSON, and [`context`] ties all of it to one input
//! document per spec.md §4.7. [`value`] is the dynamic value type that
//! flows through all of it, [`error`] and [`trace`] are the failure and
//! diagnostics models, and [`config`] is the hierarchical configuration
//! an embedder loads at startup.

pub mod config;
pub mod context;
pub mod error;
pub mod path;
pub mod projection;
mod resolver;
pub mod schema;
mod stack;
pub mod trace;
pub mod value;

pub use config::EngineConfig;
pub use context::{Context, Query, QueryResponse};
pub use error::{LazyGraphError, PathParseError, SchemaError};
pub use path::{parse_path, Group, Part, Path, Range, Segment};
pub use schema::{
    validate_against_schema, Calc, CompiledRule, ConditionValue, Graph, NativeFn, NativeRegistry,
    Node, NodeId, NodeKind, RuleInput, SchemaValidationError,
};
pub use trace::{DebugTrace, TraceEntry};
pub use value::{coerce, NodeType, Value, ValueMap};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn crate_root_re_exports_reach_a_full_query() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer", "default": 2},
                "b": {"type": "integer", "rule": "${a} + 1"}
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let ctx = Context::new(&graph, json!({}));
        assert_eq!(ctx.get("b").unwrap(), Value::Int(3));
    }
}
