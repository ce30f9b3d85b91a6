//! Core resolution engine (spec.md §4.3 "Resolution rules by node kind",
//! §4.5 "fetch_and_resolve").
//!
//! `resolve` and `fetch_and_resolve` are mutually recursive: `resolve`
//! dispatches on the schema node's kind and the remaining query path,
//! `fetch_and_resolve` is the one place a value actually gets bound into a
//! container slot (from the input document, a schema default, or a
//! derivation rule) before handing the remaining path back to `resolve`.
//!
//! Every recursive call re-derives its container from the document root
//! via a `&[FrameKey]` breadcrumb trail rather than threading a live `&mut
//! Value` across calls (SPEC_FULL.md §3): this is what lets the resolver
//! bind a rule input living anywhere else in the tree without fighting the
//! borrow checker over two simultaneous mutable references into the same
//! owned document.

use crate::error::LazyGraphError;
use crate::path::{Part, Path, Segment};
use crate::schema::node::{Graph, NodeId, NodeKind};
use crate::schema::rule::{eval_expr, Calc};
use crate::stack::{FrameKey, StackPointer, StackPointerPool};
use crate::trace::{DebugTrace, TraceEntry};
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Per-query mutable state: the stack pointer pool, the memo table, the
/// cycle guard's active set, and the debug trace. Reset (or simply
/// dropped) between top-level queries by [`crate::context::Context`]
/// (spec.md §5: "per-query state must not leak between queries").
pub struct QueryState {
    pub pool: StackPointerPool,
    pub trace: DebugTrace,
    pub cycle_guard_depth: usize,
    active: HashSet<(NodeId, String)>,
    memo: HashMap<(NodeId, Vec<FrameKey>, u64), Value>,
}

impl QueryState {
    pub fn new(cycle_guard_depth: usize, debug: bool) -> Self {
        QueryState {
            pool: StackPointerPool::new(),
            trace: DebugTrace::new(debug),
            cycle_guard_depth,
            active: HashSet::new(),
            memo: HashMap::new(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn render_keys(keys: &[FrameKey]) -> String {
    keys.iter()
        .map(|k| match k {
            FrameKey::Name(n) => n.clone(),
            FrameKey::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn get_value<'a>(root: &'a Value, keys: &[FrameKey]) -> Option<&'a Value> {
    let mut current = root;
    for key in keys {
        current = match (current, key) {
            (Value::Object(map), FrameKey::Name(n)) => map.get(n)?,
            (Value::Array(arr), FrameKey::Index(i)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Binds `value` into `root` at `keys`, growing object/array containers as
/// needed (a default binding may be the first time a key is ever written).
fn set_value(root: &mut Value, keys: &[FrameKey], value: Value) {
    if keys.is_empty() {
        *root = value;
        return;
    }
    let mut current = root;
    for key in &keys[..keys.len() - 1] {
        current = match (current, key) {
            (Value::Object(map), FrameKey::Name(n)) => {
                map.entry(n.clone()).or_insert_with(Value::missing)
            }
            (Value::Array(arr), FrameKey::Index(i)) => {
                while arr.len() <= *i {
                    arr.push(Value::missing());
                }
                &mut arr[*i]
            }
            (slot, FrameKey::Name(n)) => {
                *slot = Value::Object(ValueMap::new());
                match slot {
                    Value::Object(map) => map.entry(n.clone()).or_insert_with(Value::missing),
                    _ => unreachable!(),
                }
            }
            (slot, FrameKey::Index(i)) => {
                *slot = Value::Array(Vec::new());
                match slot {
                    Value::Array(arr) => {
                        while arr.len() <= *i {
                            arr.push(Value::missing());
                        }
                        &mut arr[*i]
                    }
                    _ => unreachable!(),
                }
            }
        };
    }
    match (current, keys.last().unwrap()) {
        (Value::Object(map), FrameKey::Name(n)) => {
            map.insert(n.clone(), value);
        }
        (Value::Array(arr), FrameKey::Index(i)) => {
            while arr.len() <= *i {
                arr.push(Value::missing());
            }
            arr[*i] = value;
        }
        (slot, FrameKey::Name(n)) => {
            let mut map = ValueMap::new();
            map.insert(n.clone(), value);
            *slot = Value::Object(map);
        }
        (slot, FrameKey::Index(i)) => {
            let mut arr = Vec::new();
            while arr.len() <= *i {
                arr.push(Value::missing());
            }
            arr[*i] = value;
            *slot = Value::Array(arr);
        }
    }
}

/// Resolve `path` against `node_id`'s value, rooted at the container
/// `stack` points to (spec.md §4.3).
#[tracing::instrument(level = "trace", skip(graph, qs, root, stack), fields(node = %graph.node(node_id).path, path = %path.render()))]
pub fn resolve(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    node_id: NodeId,
    path: &Path,
    stack: StackPointer,
) -> Result<Value, LazyGraphError> {
    let keys = qs.pool.key_path(stack);
    let memo_key = (node_id, keys.clone(), path.identity());
    if let Some(cached) = qs.memo.get(&memo_key) {
        return Ok(cached.clone());
    }

    let result = match &graph.node(node_id).kind {
        NodeKind::Scalar => resolve_scalar(root, path, &keys),
        NodeKind::Object { .. } => resolve_object(graph, qs, root, node_id, path, stack, &keys),
        NodeKind::Array { .. } => resolve_array(graph, qs, root, node_id, path, stack, &keys),
    }?;

    qs.memo.insert(memo_key, result.clone());
    Ok(result)
}

fn resolve_scalar(root: &Value, path: &Path, keys: &[FrameKey]) -> Result<Value, LazyGraphError> {
    if !path.empty() {
        return Ok(Value::missing_because("path continues past a scalar node"));
    }
    Ok(get_value(root, keys).cloned().unwrap_or_else(Value::missing))
}

fn resolve_object(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    node_id: NodeId,
    path: &Path,
    stack: StackPointer,
    keys: &[FrameKey],
) -> Result<Value, LazyGraphError> {
    match path.segment() {
        None => {
            // No more path: force every non-simple declared/pattern
            // property so its rule runs, then return the whole object
            // (spec.md §4.3, object row, "no remaining path").
            let (properties, pattern_properties): (Vec<(String, NodeId)>, Vec<(regex::Regex, NodeId)>) =
                match &graph.node(node_id).kind {
                    NodeKind::Object {
                        properties,
                        pattern_properties,
                    } => (
                        properties.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                        pattern_properties.clone(),
                    ),
                    _ => unreachable!("resolve_object called on a non-object node"),
                };

            for (name, child_id) in &properties {
                if !graph.node(*child_id).simple {
                    fetch_and_resolve(
                        graph,
                        qs,
                        root,
                        keys.to_vec(),
                        FrameKey::Name(name.clone()),
                        *child_id,
                        Path::blank(),
                        stack,
                    )?;
                }
            }

            let present_keys: Vec<String> = get_value(root, keys)
                .and_then(Value::as_object)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default();
            for key in present_keys {
                if properties.iter().any(|(name, _)| name == &key) {
                    continue;
                }
                if let Some((_, child_id)) = pattern_properties.iter().find(|(re, _)| re.is_match(&key)) {
                    if !graph.node(*child_id).simple {
                        fetch_and_resolve(
                            graph,
                            qs,
                            root,
                            keys.to_vec(),
                            FrameKey::Name(key),
                            *child_id,
                            Path::blank(),
                            stack,
                        )?;
                    }
                }
            }

            Ok(get_value(root, keys).cloned().unwrap_or_else(Value::missing))
        }
        Some(Segment::Part(part)) => {
            let node = graph.node(node_id);
            if let Some(child_id) = node.property(&part.part) {
                fetch_and_resolve(
                    graph,
                    qs,
                    root,
                    keys.to_vec(),
                    FrameKey::Name(part.part.clone()),
                    child_id,
                    path.next(),
                    stack,
                )
            } else if let Some(child_id) = node.matching_pattern(&part.part) {
                fetch_and_resolve(
                    graph,
                    qs,
                    root,
                    keys.to_vec(),
                    FrameKey::Name(part.part.clone()),
                    child_id,
                    path.next(),
                    stack,
                )
            } else {
                // Undeclared key: fall back to an untyped passthrough node
                // when the input document actually supplies one (spec.md
                // §4.3, "no declared or pattern property matches").
                let present = get_value(root, keys)
                    .and_then(Value::as_object)
                    .and_then(|m| m.get(&part.part))
                    .cloned();
                match present {
                    Some(v) if !v.is_missing() => {
                        let fallback = match &v {
                            Value::Object(_) => graph.any_object(),
                            Value::Array(_) => graph.any_array(),
                            _ => graph.any_scalar(),
                        };
                        fetch_and_resolve(
                            graph,
                            qs,
                            root,
                            keys.to_vec(),
                            FrameKey::Name(part.part.clone()),
                            fallback,
                            path.next(),
                            stack,
                        )
                    }
                    _ => Ok(Value::missing()),
                }
            }
        }
        Some(Segment::Group(group)) => {
            if group.options.len() == 1 {
                let continuation = group.options[0].merge(&path.next());
                resolve_object(graph, qs, root, node_id, &continuation, stack, keys)
            } else {
                let mut entries = Vec::with_capacity(group.options.len());
                for option in &group.options {
                    let continuation = option.merge(&path.next());
                    let value = resolve_object(graph, qs, root, node_id, &continuation, stack, keys)?;
                    entries.push((crate::projection::option_key(option), value));
                }
                Ok(crate::projection::merge_preserving_keys(entries))
            }
        }
        Some(Segment::Range(_)) => Ok(Value::missing_because("range segment against an object node")),
    }
}

fn resolve_array(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    node_id: NodeId,
    path: &Path,
    stack: StackPointer,
    keys: &[FrameKey],
) -> Result<Value, LazyGraphError> {
    let item_id = graph.node(node_id).items().expect("array node always carries items");
    let len = get_value(root, keys).and_then(Value::as_array).map(<[_]>::len).unwrap_or(0);

    match path.segment() {
        None => {
            if !graph.node(item_id).simple {
                for i in 0..len {
                    fetch_and_resolve(
                        graph,
                        qs,
                        root,
                        keys.to_vec(),
                        FrameKey::Index(i),
                        item_id,
                        Path::blank(),
                        stack,
                    )?;
                }
            }
            Ok(get_value(root, keys).cloned().unwrap_or_else(Value::missing))
        }
        Some(Segment::Part(part)) if part.index => {
            let idx: usize = part.part.parse().unwrap_or(usize::MAX);
            fetch_and_resolve(graph, qs, root, keys.to_vec(), FrameKey::Index(idx), item_id, path.next(), stack)
        }
        Some(Segment::Part(_)) => {
            // A field name against an array broadcasts across every
            // element (spec.md §4.3, array row, "a named step maps over
            // every element").
            let mut results = Vec::with_capacity(len);
            for i in 0..len {
                let value = fetch_and_resolve(
                    graph,
                    qs,
                    root,
                    keys.to_vec(),
                    FrameKey::Index(i),
                    item_id,
                    path.clone(),
                    stack,
                )?;
                results.push(value);
            }
            Ok(Value::Array(results))
        }
        Some(Segment::Range(range)) => {
            let mut results = Vec::new();
            for part in range.expand() {
                let idx: usize = part.part.parse().unwrap_or(usize::MAX);
                let value = fetch_and_resolve(
                    graph,
                    qs,
                    root,
                    keys.to_vec(),
                    FrameKey::Index(idx),
                    item_id,
                    path.next(),
                    stack,
                )?;
                results.push(value);
            }
            Ok(Value::Array(results))
        }
        Some(Segment::Group(group)) => {
            if group.options.len() == 1 {
                let continuation = group.options[0].merge(&path.next());
                resolve_array(graph, qs, root, node_id, &continuation, stack, keys)
            } else if group.is_index() {
                let mut results = Vec::with_capacity(group.options.len());
                for option in &group.options {
                    let continuation = option.merge(&path.next());
                    results.push(resolve_array(graph, qs, root, node_id, &continuation, stack, keys)?);
                }
                Ok(Value::Array(results))
            } else {
                // A non-index group against an array is a projection over
                // every element (spec.md §4.3, array row, "Group
                // non-index"): each element resolves the whole group
                // itself, producing one merged object per element, rather
                // than one array per option (spec.md's row-wise result,
                // not a column-wise one).
                let continuation = Path {
                    parts: vec![Segment::Group(group.clone())],
                    absolute: false,
                }
                .merge(&path.next());
                let mut results = Vec::with_capacity(len);
                for i in 0..len {
                    let value = fetch_and_resolve(
                        graph,
                        qs,
                        root,
                        keys.to_vec(),
                        FrameKey::Index(i),
                        item_id,
                        continuation.clone(),
                        stack,
                    )?;
                    results.push(value);
                }
                Ok(Value::Array(results))
            }
        }
    }
}

/// Binds `child_id`'s value under `field` inside the container at
/// `container_keys` — from the input document, a schema default, or a
/// derivation rule, in that priority order (spec.md §4.5) — then hands the
/// remaining path to `resolve`.
fn fetch_and_resolve(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    container_keys: Vec<FrameKey>,
    field: FrameKey,
    child_id: NodeId,
    path_after: Path,
    parent_stack: StackPointer,
) -> Result<Value, LazyGraphError> {
    let mut child_keys = container_keys.clone();
    child_keys.push(field.clone());

    let present = match (get_value(root, &container_keys), &field) {
        (Some(Value::Object(map)), FrameKey::Name(n)) => map.get(n).cloned(),
        (Some(Value::Array(arr)), FrameKey::Index(i)) => arr.get(*i).cloned(),
        _ => None,
    };

    if let Some(v) = present {
        if !v.is_missing() {
            return finish_fetch(graph, qs, root, child_id, child_keys, field, path_after, parent_stack, v);
        }
    }

    let node = graph.node(child_id);
    if !node.is_derived() {
        let default = node.default.clone().unwrap_or_else(Value::missing);
        return finish_fetch(graph, qs, root, child_id, child_keys, field, path_after, parent_stack, default);
    }

    let guard_key = (child_id, render_keys(&child_keys));
    let recursion_depth = qs.pool.recursion_depth(parent_stack);
    if recursion_depth >= qs.cycle_guard_depth && qs.active.contains(&guard_key) {
        let node = graph.node(child_id);
        tracing::warn!(node = %node.path, recursion_depth, "infinite recursion detected, returning Missing");
        qs.trace.push(TraceEntry {
            output: node.path.clone(),
            result: Value::missing_because("Infinite Recursion Detected"),
            inputs: IndexMap::new(),
            calc: node.rule.as_ref().and_then(|r| r.src.clone()),
            location: node.path.clone(),
            conditions: IndexMap::new(),
            exception: Some("Infinite Recursion Detected".to_string()),
        });
        return finish_fetch(
            graph,
            qs,
            root,
            child_id,
            child_keys,
            field,
            path_after,
            parent_stack,
            Value::missing_because("Infinite Recursion Detected"),
        );
    }

    qs.active.insert(guard_key.clone());
    let computed = invoke_rule(graph, qs, root, child_id, parent_stack, recursion_depth);
    qs.active.remove(&guard_key);

    finish_fetch(graph, qs, root, child_id, child_keys, field, path_after, parent_stack, computed?)
}

#[allow(clippy::too_many_arguments)]
fn finish_fetch(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    child_id: NodeId,
    child_keys: Vec<FrameKey>,
    field: FrameKey,
    path_after: Path,
    parent_stack: StackPointer,
    raw_value: Value,
) -> Result<Value, LazyGraphError> {
    let node = graph.node(child_id);
    let coerced = crate::value::coerce(&raw_value, &node.node_type);
    if node.validate_presence && coerced.is_missing() {
        return Err(LazyGraphError::Validation {
            path: node.path.clone(),
            message: format!("'{}' is required but resolved to Missing", node.path),
        });
    }
    set_value(root, &child_keys, coerced);

    let stack_child = qs.pool.acquire_child(parent_stack, field);
    let result = resolve(graph, qs, root, child_id, &path_after, stack_child);
    qs.pool.release(stack_child);
    result
}

/// Binds every declared input, applies conditions, and invokes the calc
/// (spec.md §4.4, §4.5). `parent_stack` is the frame that contains the
/// node being derived — one level above the value itself — which is
/// exactly the anchor a relative (non-`$`) input path resolves against.
fn invoke_rule(
    graph: &Graph,
    qs: &mut QueryState,
    root: &mut Value,
    node_id: NodeId,
    parent_stack: StackPointer,
    recursion_depth: usize,
) -> Result<Value, LazyGraphError> {
    let node = graph.node(node_id);
    let rule = node.rule.as_ref().expect("invoke_rule called on a node without a compiled rule");
    let owner_anchor = node.parent.unwrap_or(node_id);

    let mut bindings: IndexMap<String, Value> = IndexMap::new();
    for input in &rule.inputs {
        let anchor_node = if input.absolute { graph.root() } else { owner_anchor };
        let anchor_stack = if input.absolute {
            qs.pool.root_anchor(recursion_depth + 1)
        } else {
            qs.pool.anchor_with_recursion(parent_stack, recursion_depth + 1)
        };

        let mut input_path = input.path.clone();
        let mut dynamic_err = None;
        for (part_idx, option_path) in &input.dynamic {
            // A dynamic index expression (e.g. the `position_id` in
            // `positions[position_id]`) names a sibling of the node the
            // rule is attached to, not a descendant of wherever the main
            // input path's own anchor happens to point (which may be the
            // document root for an absolute input) — so it always
            // resolves against the rule-owning frame (spec.md §4.4
            // "Dynamic segments").
            let dyn_stack = qs.pool.anchor_with_recursion(parent_stack, recursion_depth + 1);
            let outcome = resolve(graph, qs, root, owner_anchor, option_path, dyn_stack);
            qs.pool.release(dyn_stack);
            match outcome {
                Ok(idx_value) => {
                    if let Some(slot) = input_path.parts.get_mut(*part_idx) {
                        *slot = Segment::Part(Part::new(idx_value.to_display_string()));
                    }
                }
                Err(e) => {
                    dynamic_err = Some(e);
                    break;
                }
            }
        }

        let outcome = match dynamic_err {
            Some(e) => Err(e),
            None => resolve(graph, qs, root, anchor_node, &input_path, anchor_stack),
        };
        qs.pool.release(anchor_stack);
        let value = outcome?;

        if graph.node(input.resolver_node).validate_presence && value.is_missing() {
            return Err(LazyGraphError::Validation {
                path: input.path.render(),
                message: format!("input '{}' is required but resolved to Missing", input.name),
            });
        }
        bindings.insert(input.name.clone(), value);
    }

    if let Some(conditions) = &rule.conditions {
        for (name, condition) in conditions {
            let matched = bindings.get(name).map(|v| condition.matches(v)).unwrap_or(false);
            if !matched {
                return Ok(Value::missing_because("condition not met"));
            }
        }
    }

    let computed = match &rule.calc {
        Calc::Copy => bindings.values().next().cloned().unwrap_or_else(Value::missing),
        Calc::Expr(expr) => eval_expr(expr, &bindings),
        Calc::Native(f) => {
            // A host-supplied closure is the one place user code actually
            // runs synchronously inside the walk; spec.md §7 requires any
            // exception it raises to be caught per rule rather than abort
            // the whole query.
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&bindings))) {
                Ok(value) => value,
                Err(payload) => {
                    let message = panic_message(&payload);
                    tracing::error!(node = %node.path, error = %message, "calc panicked");
                    Value::missing_because(format!("calc raised: {message}"))
                }
            }
        }
    };

    if qs.trace.is_enabled() {
        qs.trace.push(TraceEntry {
            output: node.path.clone(),
            result: computed.clone(),
            inputs: bindings,
            calc: rule.src.clone(),
            location: node.path.clone(),
            conditions: IndexMap::new(),
            exception: None,
        });
    }

    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Graph;
    use serde_json::json;

    fn run(schema: &serde_json::Value, input: &serde_json::Value, query: &str) -> Value {
        let graph = Graph::from_schema(schema).unwrap();
        let mut root = Value::from_json(input);
        let mut qs = QueryState::new(8, false);
        let stack = qs.pool.acquire_root();
        let path = crate::path::parse_path(query, true).unwrap();
        let result = resolve(&graph, &mut qs, &mut root, graph.root(), &path, stack).unwrap();
        qs.pool.release(stack);
        result
    }

    #[test]
    fn plain_path_copy_rule_forwards_the_value() {
        let schema = json!({
            "type": "object",
            "properties": {
                "price": {"type": "number"},
                "total": {"type": "number", "rule": "price"}
            }
        });
        let value = run(&schema, &json!({"price": 9.5}), "$.total");
        assert_eq!(value, Value::Float(9.5));
    }

    #[test]
    fn placeholder_calc_multiplies_two_inputs() {
        let schema = json!({
            "type": "object",
            "properties": {
                "price": {"type": "number"},
                "quantity": {"type": "integer"},
                "total": {"type": "number", "rule": "${price} * ${quantity}"}
            }
        });
        let value = run(&schema, &json!({"price": 2.0, "quantity": 3}), "$.total");
        assert_eq!(value, Value::Float(6.0));
    }

    #[test]
    fn missing_dependency_propagates_as_missing() {
        let schema = json!({
            "type": "object",
            "properties": {
                "price": {"type": "number"},
                "total": {"type": "number", "rule": "price"}
            }
        });
        let value = run(&schema, &json!({}), "$.total");
        assert!(value.is_missing());
    }

    #[test]
    fn default_binds_when_input_is_absent() {
        let schema = json!({
            "type": "object",
            "properties": {
                "currency": {"type": "string", "default": "USD"}
            }
        });
        let value = run(&schema, &json!({}), "$.currency");
        assert_eq!(value, Value::String("USD".to_string()));
    }

    #[test]
    fn array_sum_over_nested_objects() {
        let schema = json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "price": {"type": "number"},
                            "quantity": {"type": "integer"},
                            "total": {"type": "number", "rule": "${price} * ${quantity}"}
                        }
                    }
                },
                "grand_total": {"type": "number", "rule": {"inputs": ["items.total"], "calc": "sum(total)"}}
            }
        });
        let input = json!({
            "items": [
                {"price": 2.0, "quantity": 3},
                {"price": 5.0, "quantity": 1},
            ]
        });
        let value = run(&schema, &input, "$.grand_total");
        assert_eq!(value, Value::Float(11.0));
    }

    #[test]
    fn self_referential_rule_hits_the_cycle_guard() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "rule": "b"},
                "b": {"type": "number", "rule": "a"}
            }
        });
        let value = run(&schema, &json!({}), "$.a");
        assert!(value.is_missing());
    }

    #[test]
    fn required_missing_dependency_raises_validation_error() {
        let schema = json!({
            "type": "object",
            "properties": {
                "price": {"type": "number", "validate_presence": true},
                "total": {"type": "number", "rule": "price"}
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let mut root = Value::from_json(&json!({}));
        let mut qs = QueryState::new(8, false);
        let stack = qs.pool.acquire_root();
        let path = crate::path::parse_path("total", true).unwrap();
        let err = resolve(&graph, &mut qs, &mut root, graph.root(), &path, stack);
        assert!(matches!(err, Err(LazyGraphError::Validation { .. })));
    }

    #[test]
    fn calc_is_not_re_invoked_on_a_second_query() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut natives = crate::schema::rule::NativeRegistry::new();
        natives.register("count_calls", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Value::Int(1)
        });

        let schema = json!({
            "type": "object",
            "properties": {
                "counted": {"type": "integer", "rule": {"native": "count_calls", "inputs": []}}
            }
        });
        let graph = Graph::from_schema_with_natives(&schema, &natives).unwrap();
        let mut root = Value::from_json(&json!({}));
        let mut qs = QueryState::new(8, false);
        let stack = qs.pool.acquire_root();
        let path = crate::path::parse_path("counted", true).unwrap();
        resolve(&graph, &mut qs, &mut root, graph.root(), &path, stack).unwrap();
        resolve(&graph, &mut qs, &mut root, graph.root(), &path, stack).unwrap();
        qs.pool.release(stack);

        assert_eq!(calls.load(Ordering::SeqCst), 1, "memoization must prevent a second invocation");
    }
}
