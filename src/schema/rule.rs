//! Rule compilation (spec.md §4.4) and the bundled expression subset
//! (SPEC_FULL.md §4.8, §9) used to evaluate string `calc`s.

use super::node::{Graph, NodeId, NodeKind, PendingRule};
use crate::error::SchemaError;
use crate::path::{self, Path, Segment};
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A compiled derivation rule attached to a [`super::node::Node`]
/// (spec.md §3.2 "a derived node carries compiled rule state").
pub struct CompiledRule {
    pub inputs: Vec<RuleInput>,
    pub conditions: Option<IndexMap<String, ConditionValue>>,
    pub calc: Calc,
    /// True iff the rule is a single unmapped reference (spec.md §3.2,
    /// §4.5 "copy_input fast path").
    pub copy_input: bool,
    /// Rule source text, supplied verbatim rather than recovered via
    /// introspection (spec.md §9, SPEC_FULL.md §4.8).
    pub src: Option<String>,
    pub location: Option<(String, u32)>,
}

/// One declared rule input (spec.md §3.2:
/// `[(path, resolver_node, slot_index, dynamic_segments?)]`).
pub struct RuleInput {
    pub name: String,
    pub path: Path,
    pub absolute: bool,
    /// The schema node this path resolves to, validated at build time.
    pub resolver_node: NodeId,
    /// `(part index within `path`, key path to resolve at runtime)` pairs
    /// for index expressions that themselves depend on other nodes
    /// (spec.md §4.4 "Dynamic segments").
    pub dynamic: Vec<(usize, Path)>,
}

/// A gating condition on one input (spec.md §4.4 "Conditions").
pub enum ConditionValue {
    Literal(Value),
    Set(Vec<Value>),
}

impl ConditionValue {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ConditionValue::Literal(expected) => expected == value,
            ConditionValue::Set(options) => options.iter().any(|o| o == value),
        }
    }
}

/// The invocable form of a compiled rule (spec.md §3.2 "calc (an
/// invocable closure)").
pub enum Calc {
    /// No calc at all: the single input's value is forwarded verbatim.
    Copy,
    /// A compiled expression tree evaluated against the bound inputs.
    Expr(ExprNode),
    /// A host-language closure supplied out-of-band via
    /// [`NativeRegistry`] (spec.md §4.4 "host-language closure").
    Native(NativeFn),
}

pub type NativeFn = Arc<dyn Fn(&IndexMap<String, Value>) -> Value + Send + Sync>;

/// Registry of host-language closures a `Graph` build can bind `rule:
/// {"native": "<name>", ...}` descriptors against (spec.md §1 "the
/// schema-building DSL" is out of scope, but embedders still need a way
/// to attach real Rust logic for calcs too complex for the bundled
/// expression subset — SPEC_FULL.md §4.8).
#[derive(Clone, Default)]
pub struct NativeRegistry(HashMap<String, NativeFn>);

impl NativeRegistry {
    pub fn new() -> Self {
        NativeRegistry::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&IndexMap<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.0.insert(name.into(), Arc::new(f));
        self
    }

    fn get(&self, name: &str) -> Option<NativeFn> {
        self.0.get(name).cloned()
    }
}

/// Second build pass: compile every rule descriptor collected during tree
/// construction (spec.md §4.2 "a second pass compiles every rule").
pub(crate) fn compile_all(
    graph: &mut Graph,
    pending: Vec<PendingRule>,
    natives: &NativeRegistry,
) -> Result<(), SchemaError> {
    for p in pending {
        let compiled = compile_rule(graph, p.node, &p.descriptor, p.location, natives)?;
        graph.node_mut(p.node).rule = Some(compiled);
    }
    Ok(())
}

fn mangle(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn last_segment_name(path: &str) -> String {
    let trimmed = path.trim_start_matches("$.").trim_start_matches('$');
    let tail = trimmed
        .split(|c| c == '.' || c == '[')
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or(trimmed);
    mangle(tail)
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap())
}

fn compile_rule(
    graph: &Graph,
    node: NodeId,
    descriptor: &serde_json::Value,
    location: Option<(String, u32)>,
    natives: &NativeRegistry,
) -> Result<CompiledRule, SchemaError> {
    let rule_path = graph.node(node).path.clone();
    let owner_anchor = graph.node(node).parent.unwrap_or(node);

    match descriptor {
        serde_json::Value::String(s) if !s.contains("${") => {
            // Plain path: a single-input copy rule (spec.md §4.4).
            let input = compile_input(graph, owner_anchor, s, "value", &rule_path)?;
            Ok(CompiledRule {
                inputs: vec![input],
                conditions: None,
                calc: Calc::Copy,
                copy_input: true,
                src: Some(s.clone()),
                location,
            })
        }
        serde_json::Value::String(s) => {
            // `${expr}` placeholder form (spec.md §4.4): each distinct
            // placeholder becomes one input, in first-seen order, bound
            // to a fresh `__inN` variable in the rewritten calc text.
            let mut order: Vec<String> = Vec::new();
            let mut calc_src = String::new();
            let mut last = 0;
            for m in placeholder_pattern().captures_iter(s) {
                let whole = m.get(0).unwrap();
                let expr_path = m.get(1).unwrap().as_str().trim().to_string();
                calc_src.push_str(&s[last..whole.start()]);
                let idx = match order.iter().position(|p| p == &expr_path) {
                    Some(idx) => idx,
                    None => {
                        order.push(expr_path);
                        order.len() - 1
                    }
                };
                calc_src.push_str(&format!("__in{idx}"));
                last = whole.end();
            }
            calc_src.push_str(&s[last..]);

            let mut inputs = Vec::with_capacity(order.len());
            for (idx, expr_path) in order.iter().enumerate() {
                let name = format!("__in{idx}");
                inputs.push(compile_input(graph, owner_anchor, expr_path, &name, &rule_path)?);
            }

            let expr = parse_expr(&calc_src).map_err(|message| SchemaError::MalformedRule {
                path: rule_path.clone(),
                message,
            })?;
            let copy_input = inputs.len() == 1 && calc_src == "__in0";
            Ok(CompiledRule {
                inputs,
                conditions: None,
                calc: if copy_input { Calc::Copy } else { Calc::Expr(expr) },
                copy_input,
                src: Some(s.clone()),
                location,
            })
        }
        serde_json::Value::Object(map) => {
            let inputs_json = map.get("inputs").ok_or_else(|| SchemaError::MalformedRule {
                path: rule_path.clone(),
                message: "object rule descriptor missing 'inputs'".to_string(),
            })?;
            let raw_inputs = parse_input_list(inputs_json, &rule_path)?;
            let mut inputs = Vec::with_capacity(raw_inputs.len());
            for (name, raw_path) in &raw_inputs {
                inputs.push(compile_input(graph, owner_anchor, raw_path, name, &rule_path)?);
            }

            let conditions = parse_conditions(map.get("conditions"));

            if let Some(native_name) = map.get("native").and_then(|v| v.as_str()) {
                let native = natives.get(native_name).ok_or_else(|| SchemaError::MalformedRule {
                    path: rule_path.clone(),
                    message: format!("no native calc registered under '{native_name}'"),
                })?;
                return Ok(CompiledRule {
                    inputs,
                    conditions,
                    calc: Calc::Native(native),
                    copy_input: false,
                    src: Some(format!("native:{native_name}")),
                    location,
                });
            }

            let calc_src = map
                .get("calc")
                .and_then(|v| v.as_str())
                .ok_or_else(|| SchemaError::MalformedRule {
                    path: rule_path.clone(),
                    message: "object rule descriptor missing 'calc' or 'native'".to_string(),
                })?;
            validate_no_undeclared_reads(calc_src, &inputs, &rule_path)?;
            let expr = parse_expr(calc_src).map_err(|message| SchemaError::MalformedRule {
                path: rule_path.clone(),
                message,
            })?;
            let copy_input = inputs.len() == 1 && calc_src.trim() == inputs[0].name;
            Ok(CompiledRule {
                inputs,
                conditions,
                calc: if copy_input { Calc::Copy } else { Calc::Expr(expr) },
                copy_input,
                src: Some(calc_src.to_string()),
                location,
            })
        }
        other => Err(SchemaError::MalformedRule {
            path: rule_path,
            message: format!("unsupported rule descriptor shape: {other}"),
        }),
    }
}

/// spec.md §9 Open Question (a): this core forbids a calc from reading a
/// path not present in its declared input list. We approximate "reads" as
/// bare identifier references inside the expression text — good enough to
/// catch the common mistake of renaming an input without updating `calc`.
fn validate_no_undeclared_reads(
    calc_src: &str,
    inputs: &[RuleInput],
    rule_path: &str,
) -> Result<(), SchemaError> {
    let declared: std::collections::HashSet<&str> =
        inputs.iter().map(|i| i.name.as_str()).collect();
    for ident in extract_identifiers(calc_src) {
        if BUILTIN_FUNCTIONS.contains(&ident.as_str()) || KEYWORDS.contains(&ident.as_str()) {
            continue;
        }
        if !declared.contains(ident.as_str()) {
            return Err(SchemaError::UndeclaredRead {
                rule_path: rule_path.to_string(),
                input: ident,
            });
        }
    }
    Ok(())
}

const BUILTIN_FUNCTIONS: &[&str] = &["sum", "count", "len", "min", "max"];
const KEYWORDS: &[&str] = &["true", "false", "null"];

fn extract_identifiers(src: &str) -> Vec<String> {
    let mut out = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_alphabetic() || chars[i] == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(chars[start..i].iter().collect());
        } else {
            i += 1;
        }
    }
    out
}

fn parse_input_list(
    json: &serde_json::Value,
    rule_path: &str,
) -> Result<Vec<(String, String)>, SchemaError> {
    match json {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                let path = item.as_str().ok_or_else(|| SchemaError::MalformedRule {
                    path: rule_path.to_string(),
                    message: "input list entries must be path strings".to_string(),
                })?;
                Ok((last_segment_name(path), path.to_string()))
            })
            .collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(name, path)| {
                let path = path.as_str().ok_or_else(|| SchemaError::MalformedRule {
                    path: rule_path.to_string(),
                    message: "input map values must be path strings".to_string(),
                })?;
                Ok((mangle(name), path.to_string()))
            })
            .collect(),
        _ => Err(SchemaError::MalformedRule {
            path: rule_path.to_string(),
            message: "'inputs' must be a list or a map".to_string(),
        }),
    }
}

fn parse_conditions(json: Option<&serde_json::Value>) -> Option<IndexMap<String, ConditionValue>> {
    let map = json?.as_object()?;
    let mut out = IndexMap::new();
    for (name, value) in map {
        let condition = match value {
            serde_json::Value::Array(items) => {
                ConditionValue::Set(items.iter().map(Value::from_json).collect())
            }
            other => ConditionValue::Literal(Value::from_json(other)),
        };
        out.insert(mangle(name), condition);
    }
    Some(out)
}

/// Walks the schema tree following `raw_path`'s segments, recording
/// dynamic (value-dependent) segments along the way (spec.md §4.4).
fn compile_input(
    graph: &Graph,
    owner_anchor: NodeId,
    raw_path: &str,
    name: &str,
    rule_path: &str,
) -> Result<RuleInput, SchemaError> {
    let path = path::parse_path(raw_path, false).map_err(|source| SchemaError::Path {
        path: raw_path.to_string(),
        source,
    })?;
    let start = if path.absolute { graph.root() } else { owner_anchor };
    let (resolver_node, dynamic) = schema_walk(graph, start, owner_anchor, &path, rule_path)?;
    let absolute = path.absolute;
    Ok(RuleInput {
        name: name.to_string(),
        path,
        absolute,
        resolver_node,
        dynamic,
    })
}

fn schema_walk(
    graph: &Graph,
    start: NodeId,
    owner_anchor: NodeId,
    path: &Path,
    rule_path: &str,
) -> Result<(NodeId, Vec<(usize, Path)>), SchemaError> {
    let mut current = start;
    let mut dynamic = Vec::new();

    let unresolved = || SchemaError::UnresolvedInput {
        rule_path: rule_path.to_string(),
        input: path.render(),
    };

    for (i, segment) in path.parts.iter().enumerate() {
        match segment {
            Segment::Part(part) => {
                let node = graph.node(current);
                current = if node.is_array() {
                    node.items().ok_or_else(unresolved)?
                } else if node.is_object() {
                    node.property(&part.part)
                        .or_else(|| node.matching_pattern(&part.part))
                        .ok_or_else(unresolved)?
                } else {
                    return Err(unresolved());
                };
            }
            Segment::Range(_) => {
                let node = graph.node(current);
                current = node.items().ok_or_else(unresolved)?;
            }
            Segment::Group(group) => {
                if group.options.len() != 1 {
                    return Err(SchemaError::AmbiguousGroupInput {
                        rule_path: rule_path.to_string(),
                        input: path.render(),
                    });
                }
                let option = &group.options[0];
                let node = graph.node(current);
                if group.is_index() {
                    current = node.items().ok_or_else(unresolved)?;
                } else if node.is_array() {
                    current = node.items().ok_or_else(unresolved)?;
                    // The index expression names a node reached from the
                    // rule's own owning frame, not from `current` (spec.md
                    // §4.4 "Dynamic segments" — validated the same way the
                    // resolver anchors it at evaluation time).
                    schema_walk(graph, owner_anchor, owner_anchor, option, rule_path)?;
                    dynamic.push((i, option.clone()));
                } else if let NodeKind::Object { pattern_properties, .. } = &node.kind {
                    let (_, resolver) = pattern_properties.first().ok_or_else(unresolved)?;
                    current = *resolver;
                    schema_walk(graph, owner_anchor, owner_anchor, option, rule_path)?;
                    dynamic.push((i, option.clone()));
                } else {
                    return Err(unresolved());
                }
            }
        }
    }
    Ok((current, dynamic))
}

/// A parsed calc expression (SPEC_FULL.md §4.8, §9). Deliberately tiny:
/// arithmetic, comparisons, boolean connectives, and a handful of
/// aggregate builtins — enough for the calcs spec.md's scenarios describe
/// (`price*quantity`, `sum(items.total)`, `pages>200`) without claiming to
/// be a general host-language expression engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    Var(String),
    Call(String, Vec<ExprNode>),
    Unary(UnaryOp, Box<ExprNode>),
    Binary(BinOp, Box<ExprNode>, Box<ExprNode>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

pub fn parse_expr(src: &str) -> Result<ExprNode, String> {
    let mut p = ExprParser {
        chars: src.chars().collect(),
        pos: 0,
    };
    let node = p.parse_or()?;
    p.skip_ws();
    if p.pos != p.chars.len() {
        return Err(format!("unexpected trailing input in calc '{src}'"));
    }
    Ok(node)
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
}

impl ExprParser {
    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn try_consume(&mut self, token: &str) -> bool {
        self.skip_ws();
        let tok: Vec<char> = token.chars().collect();
        if self.chars[self.pos..].starts_with(&tok[..]) {
            self.pos += tok.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<ExprNode, String> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.try_consume("||") {
                let rhs = self.parse_and()?;
                lhs = ExprNode::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ExprNode, String> {
        let mut lhs = self.parse_cmp()?;
        loop {
            self.skip_ws();
            if self.try_consume("&&") {
                let rhs = self.parse_cmp()?;
                lhs = ExprNode::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<ExprNode, String> {
        let lhs = self.parse_add()?;
        self.skip_ws();
        let op = if self.try_consume("==") {
            Some(BinOp::Eq)
        } else if self.try_consume("!=") {
            Some(BinOp::Ne)
        } else if self.try_consume(">=") {
            Some(BinOp::Ge)
        } else if self.try_consume("<=") {
            Some(BinOp::Le)
        } else if self.try_consume(">") {
            Some(BinOp::Gt)
        } else if self.try_consume("<") {
            Some(BinOp::Lt)
        } else {
            None
        };
        match op {
            Some(op) => {
                let rhs = self.parse_add()?;
                Ok(ExprNode::Binary(op, Box::new(lhs), Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn parse_add(&mut self) -> Result<ExprNode, String> {
        let mut lhs = self.parse_mul()?;
        loop {
            self.skip_ws();
            if self.try_consume("+") {
                let rhs = self.parse_mul()?;
                lhs = ExprNode::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs));
            } else if self.try_consume("-") {
                let rhs = self.parse_mul()?;
                lhs = ExprNode::Binary(BinOp::Sub, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<ExprNode, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_ws();
            if self.try_consume("*") {
                let rhs = self.parse_unary()?;
                lhs = ExprNode::Binary(BinOp::Mul, Box::new(lhs), Box::new(rhs));
            } else if self.try_consume("/") {
                let rhs = self.parse_unary()?;
                lhs = ExprNode::Binary(BinOp::Div, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprNode, String> {
        self.skip_ws();
        if self.try_consume("-") {
            return Ok(ExprNode::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.try_consume("!") {
            return Ok(ExprNode::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ExprNode, String> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let node = self.parse_or()?;
                self.skip_ws();
                if !self.try_consume(")") {
                    return Err("expected ')'".to_string());
                }
                Ok(node)
            }
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident_or_call(),
            other => Err(format!("unexpected character in calc expression: {other:?}")),
        }
    }

    fn parse_string(&mut self) -> Result<ExprNode, String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos) {
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    out.push(*c);
                    self.pos += 1;
                }
                None => return Err("unterminated string literal".to_string()),
            }
        }
        Ok(ExprNode::Str(out))
    }

    fn parse_number(&mut self) -> Result<ExprNode, String> {
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_digit() || *c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(ExprNode::Num)
            .map_err(|_| format!("invalid number literal '{text}'"))
    }

    fn parse_ident_or_call(&mut self) -> Result<ExprNode, String> {
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(c) if c.is_alphanumeric() || *c == '_') {
            self.pos += 1;
        }
        let ident: String = self.chars[start..self.pos].iter().collect();
        match ident.as_str() {
            "true" => return Ok(ExprNode::Bool(true)),
            "false" => return Ok(ExprNode::Bool(false)),
            "null" => return Ok(ExprNode::Null),
            _ => {}
        }
        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let mut args = Vec::new();
            self.skip_ws();
            if self.peek() != Some(')') {
                loop {
                    args.push(self.parse_or()?);
                    self.skip_ws();
                    if self.try_consume(",") {
                        continue;
                    }
                    break;
                }
            }
            if !self.try_consume(")") {
                return Err("expected ')' to close call".to_string());
            }
            Ok(ExprNode::Call(ident, args))
        } else {
            Ok(ExprNode::Var(ident))
        }
    }
}

/// Evaluate a compiled expression against bound input values (spec.md
/// §3.4: any arithmetic/string op on `Missing` yields `Missing`, enforced
/// by `Value`'s operator overloads in `crate::value::ops`).
pub fn eval_expr(expr: &ExprNode, bindings: &IndexMap<String, Value>) -> Value {
    match expr {
        ExprNode::Num(n) => {
            if n.fract() == 0.0 {
                Value::Int(*n as i64)
            } else {
                Value::Float(*n)
            }
        }
        ExprNode::Str(s) => Value::String(s.clone()),
        ExprNode::Bool(b) => Value::Bool(*b),
        ExprNode::Null => Value::Null,
        ExprNode::Var(name) => bindings.get(name).cloned().unwrap_or_else(Value::missing),
        ExprNode::Call(name, args) => eval_call(name, args, bindings),
        ExprNode::Unary(op, inner) => {
            let v = eval_expr(inner, bindings);
            if v.is_missing() {
                return Value::missing();
            }
            match op {
                UnaryOp::Neg => Value::Float(-v.to_f()),
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
            }
        }
        ExprNode::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, bindings);
            match op {
                BinOp::And => {
                    if !l.is_truthy() {
                        return l;
                    }
                    eval_expr(rhs, bindings)
                }
                BinOp::Or => {
                    if l.is_truthy() {
                        return l;
                    }
                    eval_expr(rhs, bindings)
                }
                _ => {
                    let r = eval_expr(rhs, bindings);
                    eval_binary(*op, l, r)
                }
            }
        }
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> Value {
    if matches!(op, BinOp::Eq | BinOp::Ne) {
        let eq = l == r;
        return Value::Bool(if op == BinOp::Eq { eq } else { !eq });
    }
    if l.is_missing() || r.is_missing() {
        return Value::missing();
    }
    match op {
        BinOp::Add => {
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                l.concat(&r)
            } else {
                l + r
            }
        }
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => l / r,
        BinOp::Lt => Value::Bool(l.to_f() < r.to_f()),
        BinOp::Le => Value::Bool(l.to_f() <= r.to_f()),
        BinOp::Gt => Value::Bool(l.to_f() > r.to_f()),
        BinOp::Ge => Value::Bool(l.to_f() >= r.to_f()),
        BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(name: &str, args: &[ExprNode], bindings: &IndexMap<String, Value>) -> Value {
    let values: Vec<Value> = args.iter().map(|a| eval_expr(a, bindings)).collect();
    match name {
        "sum" => match values.first() {
            Some(Value::Array(items)) => Value::sum(items.iter()),
            Some(other) => other.clone(),
            None => Value::missing(),
        },
        "count" | "len" => match values.first() {
            Some(Value::Array(items)) => Value::Int(items.len() as i64),
            Some(Value::Missing(_)) => Value::missing(),
            _ => Value::Int(0),
        },
        "min" => values
            .into_iter()
            .reduce(|a, b| if a.to_f() <= b.to_f() { a } else { b })
            .unwrap_or_else(Value::missing),
        "max" => values
            .into_iter()
            .reduce(|a, b| if a.to_f() >= b.to_f() { a } else { b })
            .unwrap_or_else(Value::missing),
        _ => Value::missing_because(format!("unknown function '{name}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn evaluates_arithmetic() {
        let expr = parse_expr("price * quantity").unwrap();
        let v = eval_expr(&expr, &bindings(&[("price", Value::Int(5)), ("quantity", Value::Int(2))]));
        assert_eq!(v, Value::Int(10));
    }

    #[test]
    fn evaluates_comparison() {
        let expr = parse_expr("pages > 200").unwrap();
        assert_eq!(
            eval_expr(&expr, &bindings(&[("pages", Value::Int(300))])),
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&expr, &bindings(&[("pages", Value::Int(100))])),
            Value::Bool(false)
        );
    }

    #[test]
    fn sum_builtin_over_array() {
        let expr = parse_expr("sum(totals)").unwrap();
        let arr = Value::Array(vec![Value::Float(10.0), Value::Float(1.0)]);
        assert_eq!(eval_expr(&expr, &bindings(&[("totals", arr)])), Value::Float(11.0));
    }

    #[test]
    fn missing_propagates_through_arithmetic() {
        let expr = parse_expr("a + b").unwrap();
        assert!(eval_expr(&expr, &bindings(&[("a", Value::Int(1)), ("b", Value::missing())])).is_missing());
    }

    #[test]
    fn mangle_replaces_non_identifier_chars() {
        assert_eq!(mangle("is-long?"), "is_long_");
    }

    #[test]
    fn last_segment_name_strips_root_and_dots() {
        assert_eq!(last_segment_name("$.items.total"), "total");
        assert_eq!(last_segment_name("price"), "price");
    }
}
