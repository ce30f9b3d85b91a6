//! Schema node tree (spec.md §3.2, §4.2).
//!
//! A [`Graph`] owns every [`Node`] in an arena (`Vec<Node>`, indexed by
//! [`NodeId`]); parent/root back-references are plain indices rather than
//! `Rc`/`Weak`, so the resolver can walk the ancestor chain without
//! fighting the borrow checker while the tree itself never moves after
//! `Graph::from_schema` returns (SPEC_FULL.md §3, §9 "Back-references").

use super::rule::CompiledRule;
use crate::error::SchemaError;
use crate::value::NodeType;
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;

pub type NodeId = usize;

/// The schema position (spec.md §3.2).
#[derive(Debug)]
pub struct Node {
    pub name: String,
    /// Absolute dotted path from root, e.g. `$.a.b[]`.
    pub path: String,
    pub depth: usize,
    pub parent: Option<NodeId>,
    pub node_type: NodeType,
    pub default: Option<Value>,
    pub rule: Option<CompiledRule>,
    pub invisible: bool,
    pub validate_presence: bool,
    /// A non-container leaf without a rule and without a default
    /// short-circuits the resolver (spec.md §4.2).
    pub simple: bool,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Scalar,
    Object {
        properties: IndexMap<String, NodeId>,
        pattern_properties: Vec<(Regex, NodeId)>,
    },
    Array {
        items: NodeId,
    },
}

impl Node {
    pub fn is_object(&self) -> bool {
        matches!(self.kind, NodeKind::Object { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array { .. })
    }

    pub fn is_derived(&self) -> bool {
        self.rule.is_some()
    }

    pub fn property(&self, name: &str) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Object { properties, .. } => properties.get(name).copied(),
            _ => None,
        }
    }

    /// The first `patternProperties` regex matching `name` (spec.md §4.3,
    /// object node table: "the first pattern whose regex matches `name`").
    pub fn matching_pattern(&self, name: &str) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Object {
                pattern_properties, ..
            } => pattern_properties
                .iter()
                .find(|(re, _)| re.is_match(name))
                .map(|(_, id)| *id),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Array { items } => Some(*items),
            _ => None,
        }
    }

    fn fallback(name: &str, parent: NodeId, depth: usize, path: String, kind: NodeKind) -> Node {
        Node {
            name: name.to_string(),
            path,
            depth,
            parent: Some(parent),
            node_type: NodeType::Any,
            default: None,
            rule: None,
            invisible: false,
            validate_presence: false,
            simple: matches!(kind, NodeKind::Scalar),
            kind,
        }
    }
}

/// The immutable, build-once schema graph (spec.md §3.6). `Send + Sync`
/// once built, so a single `Graph` may be shared across threads
/// (SPEC_FULL.md §5); all per-query mutable state (memo tables,
/// cycle-guard bookkeeping, the stack-pointer pool) lives on
/// [`crate::context::Context`], not here.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    root: NodeId,
    /// Fallback nodes used when the resolver walks into a key the schema
    /// never declared but the input document supplies a value for
    /// (spec.md §4.3, object node table, "no declared/pattern property: if
    /// the key is present in the input, treat it as an untyped passthrough
    /// node"). `Any`-typed, no rule, no default: a scalar fallback coerces
    /// to nothing, and the object/array fallbacks have no declared children
    /// of their own, so any further descent into them recurses back into
    /// this same fallback machinery.
    any_scalar: NodeId,
    any_object: NodeId,
    any_array: NodeId,
    /// The raw schema document this graph was built from, retained so a
    /// [`crate::context::Context`] can hand it to the (delegated) JSON
    /// Schema structural validator without the caller threading it through
    /// separately (spec.md §1, §4.7).
    schema_doc: serde_json::Value,
}

/// Raw rule descriptors seen during the build's first pass (§4.2),
/// compiled in a second pass once the whole tree exists.
pub(crate) struct PendingRule {
    pub node: NodeId,
    pub descriptor: serde_json::Value,
    pub location: Option<(String, u32)>,
}

impl Graph {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn any_scalar(&self) -> NodeId {
        self.any_scalar
    }

    pub fn any_object(&self) -> NodeId {
        self.any_object
    }

    pub fn any_array(&self) -> NodeId {
        self.any_array
    }

    /// The raw schema document this graph was built from (spec.md §4.7,
    /// "run optional JSON-schema validation of the input").
    pub fn schema_doc(&self) -> &serde_json::Value {
        &self.schema_doc
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build a `Graph` from a JSON Schema document (spec.md §4.2,
    /// SPEC_FULL.md §6.4). This is the sole supported construction entry
    /// point — the schema-building DSL is out of scope (spec.md §1).
    ///
    /// `natives` supplies the "host-language closure" rule form (spec.md
    /// §4.4): a `rule` descriptor of the shape
    /// `{"native": "<name>", "inputs": [...]}` is bound to the matching
    /// entry. This is how a calc too complex for the bundled expression
    /// subset (SPEC_FULL.md §4.8, §9) is attached without requiring the
    /// schema document itself to carry executable code.
    pub fn from_schema(schema: &serde_json::Value) -> Result<Graph, SchemaError> {
        Graph::from_schema_with_natives(schema, &super::rule::NativeRegistry::default())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn from_schema_with_natives(
        schema: &serde_json::Value,
        natives: &super::rule::NativeRegistry,
    ) -> Result<Graph, SchemaError> {
        let mut nodes = Vec::new();
        let mut pending = Vec::new();
        let root = build_node(schema, "$", None, 0, "$".to_string(), schema, &mut nodes, &mut pending)?;

        let any_scalar = nodes.len();
        nodes.push(Node::fallback("*", root, 0, "$.*".to_string(), NodeKind::Scalar));
        let any_object = nodes.len();
        nodes.push(Node::fallback(
            "*",
            root,
            0,
            "$.*".to_string(),
            NodeKind::Object {
                properties: IndexMap::new(),
                pattern_properties: Vec::new(),
            },
        ));
        let any_array = nodes.len();
        nodes.push(Node::fallback(
            "*",
            root,
            0,
            "$.*[]".to_string(),
            NodeKind::Array { items: any_scalar },
        ));

        let mut graph = Graph {
            nodes,
            root,
            any_scalar,
            any_object,
            any_array,
            schema_doc: schema.clone(),
        };
        super::rule::compile_all(&mut graph, pending, natives)?;
        Ok(graph)
    }
}

/// Recursive descent builder (spec.md §4.2). `full_schema` is threaded
/// through for `$ref`/structural-only keywords that this core accepts but
/// never traverses as rule targets (spec.md §6.1).
#[allow(clippy::too_many_arguments)]
fn build_node(
    schema: &serde_json::Value,
    name: &str,
    parent: Option<NodeId>,
    depth: usize,
    path: String,
    full_schema: &serde_json::Value,
    nodes: &mut Vec<Node>,
    pending: &mut Vec<PendingRule>,
) -> Result<NodeId, SchemaError> {
    let obj = schema.as_object().ok_or_else(|| SchemaError::NotAnObject {
        path: path.clone(),
        found: json_type_name(schema),
    })?;

    let type_str = obj.get("type").and_then(|v| v.as_str());
    let node_type = match (type_str, obj.get("const")) {
        (_, Some(literal)) => NodeType::Const(Value::from_json(literal)),
        (Some(t), None) => NodeType::from_schema_str(t).ok_or_else(|| SchemaError::UnknownType {
            path: path.clone(),
            type_name: t.to_string(),
        })?,
        (None, None) => NodeType::Any,
    };

    let default = obj.get("default").map(Value::from_json);
    let invisible = obj.get("invisible").and_then(|v| v.as_bool()).unwrap_or(false);
    let validate_presence = obj
        .get("validate_presence")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let rule_location = obj.get("rule_location").and_then(|v| v.as_array()).map(|arr| {
        let file = arr.first().and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let line = arr.get(1).and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;
        (file, line)
    });

    let id = nodes.len();
    // Reserve the slot; child nodes get higher indices, so `id` is stable
    // even though children are built (and pushed) before we push `self`.
    nodes.push(Node {
        name: name.to_string(),
        path: path.clone(),
        depth,
        parent,
        node_type: node_type.clone(),
        default,
        rule: None,
        invisible,
        validate_presence,
        simple: false,
        kind: NodeKind::Scalar,
    });

    let kind = match node_type {
        NodeType::Object => {
            let mut properties = IndexMap::new();
            if let Some(props) = obj.get("properties").and_then(|v| v.as_object()) {
                for (key, child_schema) in props {
                    let child_path = format!("{path}.{key}");
                    let child_id = build_node(
                        child_schema,
                        key,
                        Some(id),
                        depth + 1,
                        child_path,
                        full_schema,
                        nodes,
                        pending,
                    )?;
                    properties.insert(key.clone(), child_id);
                }
            }
            let mut pattern_properties = Vec::new();
            if let Some(patterns) = obj.get("patternProperties").and_then(|v| v.as_object()) {
                for (pattern, child_schema) in patterns {
                    let regex = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                        path: path.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                    let child_path = format!("{path}.{{{pattern}}}");
                    let child_id = build_node(
                        child_schema,
                        pattern,
                        Some(id),
                        depth + 1,
                        child_path,
                        full_schema,
                        nodes,
                        pending,
                    )?;
                    pattern_properties.push((regex, child_id));
                }
            }
            NodeKind::Object {
                properties,
                pattern_properties,
            }
        }
        NodeType::Array => {
            let items_schema = obj.get("items").ok_or_else(|| SchemaError::MalformedRule {
                path: path.clone(),
                message: "array node missing 'items'".to_string(),
            })?;
            let child_path = format!("{path}[]");
            let items = build_node(
                items_schema,
                "items",
                Some(id),
                depth + 1,
                child_path,
                full_schema,
                nodes,
                pending,
            )?;
            NodeKind::Array { items }
        }
        _ => NodeKind::Scalar,
    };

    let has_rule = obj.get("rule").is_some();
    if let Some(descriptor) = obj.get("rule") {
        pending.push(PendingRule {
            node: id,
            descriptor: descriptor.clone(),
            location: rule_location,
        });
    }

    let node = &mut nodes[id];
    node.kind = kind;
    node.simple = !node.is_object() && !node.is_array() && !has_rule && node.default.is_none();

    Ok(id)
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_flat_object_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "default": 0},
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let root = graph.node(graph.root());
        assert!(root.is_object());
        let name_id = root.property("name").unwrap();
        assert!(graph.node(name_id).simple);
        let age_id = root.property("age").unwrap();
        assert!(!graph.node(age_id).simple, "node with a default is not simple");
    }

    #[test]
    fn builds_array_of_objects() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "price": {"type": "number"} }
            }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let root = graph.node(graph.root());
        assert!(root.is_array());
        let items = graph.node(root.items().unwrap());
        assert!(items.is_object());
    }

    #[test]
    fn unknown_type_is_a_schema_error() {
        let schema = json!({"type": "bogus"});
        assert!(Graph::from_schema(&schema).is_err());
    }

    #[test]
    fn pattern_properties_compile_and_match() {
        let schema = json!({
            "type": "object",
            "patternProperties": { "^[0-9]+$": {"type": "string"} }
        });
        let graph = Graph::from_schema(&schema).unwrap();
        let root = graph.node(graph.root());
        assert!(root.matching_pattern("42").is_some());
        assert!(root.matching_pattern("abc").is_none());
    }
}
