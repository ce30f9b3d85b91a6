//! Error types for LazyGraph.
//!
//! Build-time failures (schema construction, rule compilation) and
//! query-time failures (validation, abort, parse) are kept as separate
//! typed enums so callers can tell "the schema you handed me is broken"
//! apart from "this particular query failed."

use thiserror::Error;

/// Errors raised while turning a JSON schema document into a [`crate::schema::Graph`].
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The schema document was not an object at the position expected.
    #[error("expected object schema at '{path}', found {found}")]
    NotAnObject { path: String, found: &'static str },

    /// An unknown or malformed `type` keyword.
    #[error("unknown type '{type_name}' at '{path}'")]
    UnknownType { path: String, type_name: String },

    /// A `patternProperties` key did not compile as a regex.
    #[error("invalid patternProperties regex '{pattern}' at '{path}': {source}")]
    InvalidPattern {
        path: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule's declared input path does not resolve to a schema node.
    #[error("rule at '{rule_path}' declares input '{input}' which does not resolve to a schema node")]
    UnresolvedInput { rule_path: String, input: String },

    /// A rule descriptor could not be parsed into (inputs, calc, conditions).
    #[error("malformed rule descriptor at '{path}': {message}")]
    MalformedRule { path: String, message: String },

    /// A calc body reads a path not present in its declared input list
    /// (spec.md §9 Open Question (a): this crate forbids undeclared reads).
    #[error("rule at '{rule_path}' reads undeclared input '{input}'")]
    UndeclaredRead { rule_path: String, input: String },

    /// A group segment inside an input path did not collapse to a single
    /// resolvable option (spec.md §4.4).
    #[error("ambiguous group segment in input path '{input}' at '{rule_path}'")]
    AmbiguousGroupInput { rule_path: String, input: String },

    /// The path string itself failed to parse.
    #[error("could not parse path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: PathParseError,
    },
}

/// Errors raised by the path grammar (spec.md §4.1).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathParseError {
    /// Brackets in the path string did not balance.
    #[error("unbalanced brackets in path '{0}'")]
    UnbalancedBrackets(String),

    /// A range segment (`a..b` or `a...b`) was missing one side.
    #[error("malformed range '{0}'")]
    MalformedRange(String),

    /// A segment was empty where a symbol or index was required.
    #[error("empty path segment in '{0}'")]
    EmptySegment(String),
}

/// Query-time errors surfaced to the caller via the response envelope
/// (spec.md §6.3, §7).
#[derive(Debug, Clone, Error)]
pub enum LazyGraphError {
    /// Input violates schema, a presence-validated dependency resolved to
    /// `Missing`, or (re-surfaced here) a rule's inputs could not be bound
    /// at build time.
    #[error("validation error at '{path}': {message}")]
    Validation { path: String, message: String },

    /// Unrecoverable error; propagated to the top of `resolve` untouched.
    #[error("abort: {0}")]
    Abort(String),

    /// The query path string failed to parse.
    #[error("parse error: {0}")]
    Parse(#[from] PathParseError),

    /// The graph's schema failed to build (surfaced when a `Context` is
    /// constructed from a bad schema rather than at query time).
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl LazyGraphError {
    /// The error class name spec.md §7 uses to distinguish failure kinds
    /// (`ValidationError`, `AbortError`, `ParseError`, `SchemaError`).
    /// [`crate::context::Context::envelope`] prefixes the response
    /// envelope's `err` field with it (spec.md §6.3, §8.2 scenario 5:
    /// "Query sum ⇒ ValidationError naming b").
    pub fn class_name(&self) -> &'static str {
        match self {
            LazyGraphError::Validation { .. } => "ValidationError",
            LazyGraphError::Abort(_) => "AbortError",
            LazyGraphError::Parse(_) => "ParseError",
            LazyGraphError::Schema(_) => "SchemaError",
        }
    }
}
