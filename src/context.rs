//! Per-input-document façade (spec.md §4.7).
//!
//! A [`Context`] pairs one [`Graph`] with one input document. Every query
//! method — `resolve`/`get`/`get_json`/`debug` — deep-copies the input
//! into a fresh [`Value`] tree, builds a fresh [`QueryState`] (stack
//! pointer pool, memo table, cycle guard, debug trace), and releases all of
//! it when the call returns: spec.md §5 requires a `Context` to be
//! unshared and every top-level query to leave no state behind for the
//! next one (SPEC_FULL.md §5, §3 "Non-goals: (a) persistence or mutation
//! of results across queries").

use crate::config::EngineConfig;
use crate::error::LazyGraphError;
use crate::path::parse_path;
use crate::projection::{merge_preserving_keys, option_key, to_json_filtered};
use crate::resolver::{resolve, QueryState};
use crate::schema::{validate_against_schema, Graph};
use crate::trace::TraceEntry;
use crate::value::Value;

/// A query is either one path string or an array of path strings whose
/// results are unioned by key (spec.md §6.2).
#[derive(Debug, Clone)]
pub enum Query {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Query::Single(s.to_string())
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Query::Single(s)
    }
}

impl From<Vec<String>> for Query {
    fn from(paths: Vec<String>) -> Self {
        Query::Many(paths)
    }
}

impl From<Vec<&str>> for Query {
    fn from(paths: Vec<&str>) -> Self {
        Query::Many(paths.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Query {
    fn from(paths: [&str; N]) -> Self {
        Query::Many(paths.iter().map(|s| (*s).to_string()).collect())
    }
}

/// The response envelope (spec.md §6.3).
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub output: Value,
    pub debug_trace: Option<Vec<TraceEntry>>,
    pub err: Option<String>,
    /// Set to `"abort"` when the failure was an [`LazyGraphError::Abort`]
    /// (spec.md §6.3's optional `status` field).
    pub status: Option<&'static str>,
}

/// Per-input-document handle (spec.md §4.7). Constructed from a built
/// [`Graph`] plus one JSON input document; cheap to create and intended to
/// be used for exactly the queries against that one document.
pub struct Context<'g> {
    graph: &'g Graph,
    input: serde_json::Value,
    cycle_guard_depth: usize,
    validate_schema: bool,
}

impl<'g> Context<'g> {
    /// Build a context for `input` against `graph`, with the cycle guard
    /// depth spec.md §4.5 names (`recursion_depth >= 8`) and schema
    /// validation disabled by default (spec.md §1: structural validation
    /// is delegated and opt-in, not mandatory on every query).
    pub fn new(graph: &'g Graph, input: serde_json::Value) -> Context<'g> {
        Context {
            graph,
            input,
            cycle_guard_depth: 8,
            validate_schema: false,
        }
    }

    pub fn with_cycle_guard_depth(mut self, depth: usize) -> Self {
        self.cycle_guard_depth = depth;
        self
    }

    /// Build a context for `input` against `graph`, taking the cycle guard
    /// depth from `config.resolver.cycle_guard_depth` (SPEC_FULL.md §2
    /// "Config") rather than the hardcoded default spec.md §4.5 names.
    pub fn from_config(graph: &'g Graph, input: serde_json::Value, config: &EngineConfig) -> Context<'g> {
        Context::new(graph, input).with_cycle_guard_depth(config.resolver.cycle_guard_depth)
    }

    /// Enable structural JSON-Schema validation of the input document
    /// before every query (spec.md §4.7: "run optional JSON-schema
    /// validation of the input").
    pub fn with_schema_validation(mut self, enabled: bool) -> Self {
        self.validate_schema = enabled;
        self
    }

    /// `resolve(path) → { output, debug_trace?, err? }` (spec.md §4.7),
    /// with tracing disabled.
    #[tracing::instrument(level = "debug", skip(self, query), fields(graph_nodes = self.graph.len()))]
    pub fn resolve(&self, query: impl Into<Query>) -> QueryResponse {
        let query = query.into();
        let (outcome, qs) = self.run(&query, false);
        Self::envelope(outcome, qs, false)
    }

    /// Same as [`Context::resolve`] but with debug tracing enabled
    /// (spec.md §6.1 `debug(path)`).
    pub fn resolve_with_trace(&self, query: impl Into<Query>) -> QueryResponse {
        let query = query.into();
        let (outcome, qs) = self.run(&query, true);
        Self::envelope(outcome, qs, true)
    }

    /// `get(path) → output` (spec.md §4.7): throws (returns `Err`) rather
    /// than folding the failure into an envelope.
    pub fn get(&self, query: impl Into<Query>) -> Result<Value, LazyGraphError> {
        let query = query.into();
        let (outcome, _qs) = self.run(&query, false);
        outcome
    }

    /// `get_json(path)` (spec.md §4.7): strips `Missing` values and
    /// `invisible` fields (spec.md §4.6).
    pub fn get_json(&self, query: impl Into<Query>) -> Result<serde_json::Value, LazyGraphError> {
        let value = self.get(query)?;
        Ok(to_json_filtered(self.graph, self.graph.root(), &value))
    }

    /// `debug(path)` (spec.md §4.7): the debug trace array alone.
    pub fn debug(&self, query: impl Into<Query>) -> Vec<TraceEntry> {
        let query = query.into();
        let (_outcome, qs) = self.run(&query, true);
        qs.trace.into_entries()
    }

    fn run(&self, query: &Query, debug: bool) -> (Result<Value, LazyGraphError>, QueryState) {
        let mut qs = QueryState::new(self.cycle_guard_depth, debug);

        if self.validate_schema {
            if let Err(e) = validate_against_schema(self.graph.schema_doc(), &self.input) {
                return (
                    Err(LazyGraphError::Validation {
                        path: "$".to_string(),
                        message: e.to_string(),
                    }),
                    qs,
                );
            }
        }

        let mut root = Value::from_json(&self.input);
        let outcome = match query {
            Query::Single(path) => self.resolve_one(&mut qs, &mut root, path),
            Query::Many(paths) => self.resolve_many(&mut qs, &mut root, paths),
        };
        (outcome, qs)
    }

    fn resolve_one(
        &self,
        qs: &mut QueryState,
        root: &mut Value,
        query: &str,
    ) -> Result<Value, LazyGraphError> {
        let path = parse_path(query, true)?;
        let stack = qs.pool.acquire_root();
        let result = resolve(self.graph, qs, root, self.graph.root(), &path, stack);
        qs.pool.release(stack);
        result
    }

    /// A multi-path query is the structural union of each path's result,
    /// keyed the same way a `Group` option is (spec.md §6.2, §4.6).
    fn resolve_many(
        &self,
        qs: &mut QueryState,
        root: &mut Value,
        paths: &[String],
    ) -> Result<Value, LazyGraphError> {
        let mut entries = Vec::with_capacity(paths.len());
        for raw in paths {
            let key = parse_path(raw, true)
                .map(|p| option_key(&p))
                .unwrap_or_else(|_| raw.clone());
            let value = self.resolve_one(qs, root, raw)?;
            entries.push((key, value));
        }
        Ok(merge_preserving_keys(entries))
    }

    fn envelope(outcome: Result<Value, LazyGraphError>, qs: QueryState, debug: bool) -> QueryResponse {
        let trace = debug.then(|| qs.trace.into_entries());
        match outcome {
            Ok(output) => QueryResponse {
                output,
                debug_trace: trace,
                err: None,
                status: None,
            },
            Err(e) => {
                let status = matches!(e, LazyGraphError::Abort(_)).then_some("abort");
                QueryResponse {
                    output: Value::missing(),
                    debug_trace: trace,
                    err: Some(format!("{}: {}", e.class_name(), e)),
                    status,
                }
            }
        }
    }
}

/// An entire-graph query (spec.md §6.2: "an empty string (entire graph)").
impl<'g> Context<'g> {
    pub fn resolve_all(&self) -> QueryResponse {
        self.resolve("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cart_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cart": {
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
                }
            }
        })
    }

    #[test]
    fn cart_totals_scenario_from_spec_8_2_1() {
        let graph = Graph::from_schema(&cart_schema()).unwrap();
        let input = json!({
            "cart": {
                "items": [
                    {"name": "a", "price": 5, "quantity": 2},
                    {"name": "b"}
                ]
            }
        });
        let ctx = Context::new(&graph, input);

        let total = ctx.get("cart.cart_total").unwrap();
        assert_eq!(total, Value::Float(11.0));

        let items_totals = ctx.get("cart.items.total").unwrap();
        assert_eq!(
            items_totals,
            Value::Array(vec![Value::Float(10.0), Value::Float(1.0)])
        );
    }

    #[test]
    fn resolve_envelope_reports_parse_errors_without_a_value() {
        let graph = Graph::from_schema(&json!({"type": "object", "properties": {}})).unwrap();
        let ctx = Context::new(&graph, json!({}));
        let response = ctx.resolve("a[");
        assert!(response.err.is_some());
    }

    #[test]
    fn get_json_strips_missing_and_invisible() {
        let schema = json!({
            "type": "object",
            "properties": {
                "visible": {"type": "string"},
                "hidden": {"type": "string", "invisible": true}
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let ctx = Context::new(&graph, json!({"visible": "x", "hidden": "y"}));
        let out = ctx.get_json("").unwrap();
        assert!(out.get("visible").is_some());
        assert!(out.get("hidden").is_none());
    }

    #[test]
    fn multi_path_query_unions_by_key() {
        let graph = Graph::from_schema(&json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            }
        }))
        .unwrap();
        let ctx = Context::new(&graph, json!({"a": 1, "b": 2}));
        let response = ctx.resolve(vec!["a", "b"]);
        let obj = response.output.as_object().unwrap();
        assert_eq!(obj.get("a"), Some(&Value::Int(1)));
        assert_eq!(obj.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn schema_validation_rejects_a_missing_required_field() {
        let schema = json!({
            "type": "object",
            "required": ["price"],
            "properties": { "price": {"type": "number"} }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let ctx = Context::new(&graph, json!({})).with_schema_validation(true);
        let response = ctx.resolve("price");
        assert!(response.err.is_some());
    }

    #[test]
    fn from_config_threads_the_configured_cycle_guard_depth() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "rule": "b"},
                "b": {"type": "number", "rule": "a"}
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();

        let mut config = EngineConfig::default();
        config.resolver.cycle_guard_depth = 2;
        let ctx = Context::from_config(&graph, json!({}), &config);
        assert_eq!(ctx.cycle_guard_depth, 2);
        assert!(ctx.get("a").unwrap().is_missing());
    }

    #[test]
    fn debug_trace_records_a_cycle() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "rule": "b"},
                "b": {"type": "number", "rule": "a"}
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let ctx = Context::new(&graph, json!({}));
        let trace = ctx.debug("a");
        assert!(trace.iter().any(|e| e
            .exception
            .as_deref()
            .map(|msg| msg.contains("Infinite Recursion"))
            .unwrap_or(false)));
    }
}
