//! # Schema Graph
//!
//! A [`Graph`] is the immutable, arena-indexed tree built once from a JSON
//! Schema document ([`Graph::from_schema`], spec.md §4.2) and shared by
//! every query against it. `node` builds the tree and the runtime-facing
//! [`Node`]/[`NodeKind`] types; `rule` compiles `rule` descriptors into
//! [`CompiledRule`] and implements the bundled calc expression language;
//! `validator` is the structural JSON-Schema validation seam (spec.md §1,
//! §4.7 — delegated, not reimplemented here).

pub mod node;
pub mod rule;
pub mod validator;

pub use node::{Graph, Node, NodeId, NodeKind};
pub use rule::{Calc, CompiledRule, ConditionValue, NativeFn, NativeRegistry, RuleInput};
pub use validator::{validate_against_schema, SchemaValidationError};
