//! JSON Schema structural validation seam (spec.md §1, §6.1: "delegated to
//! a validator library"). LazyGraph's own schema tree (§3.2, §4.2) reads
//! `type`/`properties`/`patternProperties`/`items`/`default`/`rule`/etc.
//! directly; this module covers the separate, explicitly out-of-scope
//! obligation in §4.7 — checking an *input document* against the
//! structural subset of the schema (`required`, `enum`, `anyOf`/`oneOf`/
//! `dependencies`, ...) before the resolver ever touches it.
//!
//! The extension keywords this crate adds (`rule`, `rule_location`,
//! `invisible`, `validate_presence`, the extended `type`s) are not valid
//! JSON Schema keywords, so the document handed to the validator is the
//! schema with those keys stripped — `jsonschema` ignores unknown
//! keywords by default, but stripping keeps error messages about the
//! user's own document free of LazyGraph-internal noise.

use jsonschema::{Draft, JSONSchema};

/// Errors surfaced by structural validation of an input document
/// (spec.md §7: folded into `LazyGraphError::Validation` at the call
/// site, kept as its own type here so the validator module has no
/// dependency on the query-time error enum).
#[derive(Debug, Clone, thiserror::Error)]
#[error("input failed schema validation: {}", .messages.join("; "))]
pub struct SchemaValidationError {
    pub messages: Vec<String>,
}

/// The extended type names this crate adds on top of JSON Schema's
/// `type` keyword (spec.md §3.1) — not understood by a structural
/// validator, so they're rewritten to `"string"`/`"number"` (whichever the
/// coercion targets) before compiling.
fn strip_extensions(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "rule" | "rule_location" | "invisible" | "validate_presence" => continue,
                    "type" => {
                        let rewritten = match value.as_str() {
                            Some("decimal" | "integer") => "number",
                            Some("date" | "time" | "timestamp") => "string",
                            Some(other) => other,
                            None => {
                                out.insert(key.clone(), strip_extensions(value));
                                continue;
                            }
                        };
                        out.insert(key.clone(), serde_json::Value::String(rewritten.to_string()));
                    }
                    _ => {
                        out.insert(key.clone(), strip_extensions(value));
                    }
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(strip_extensions).collect())
        }
        other => other.clone(),
    }
}

fn compile(schema: &serde_json::Value) -> Result<JSONSchema, SchemaValidationError> {
    let stripped = strip_extensions(schema);
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&stripped)
        .map_err(|e| SchemaValidationError {
            messages: vec![e.to_string()],
        })
}

/// Validate `instance` against `schema`'s structural subset (spec.md
/// §6.1: `type`, `properties`, `patternProperties`, `items`, `required`,
/// `default`, `enum`, `anyOf`/`oneOf`/`dependencies`). Compiles fresh on
/// every call — structural validation is opt-in and runs at most once per
/// [`crate::context::Context`] query (spec.md §4.7), not on the resolver's
/// hot path, so there is no memoization requirement to meet here.
pub fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Result<(), SchemaValidationError> {
    let compiled = compile(schema)?;
    if let Err(errors) = compiled.validate(instance) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(SchemaValidationError { messages });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_conforming_document() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": {"type": "string"} }
        });
        assert!(validate_against_schema(&schema, &json!({"name": "a"})).is_ok());
    }

    #[test]
    fn rejects_a_missing_required_field() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": {"type": "string"} }
        });
        let err = validate_against_schema(&schema, &json!({})).unwrap_err();
        assert!(!err.messages.is_empty());
    }

    #[test]
    fn extension_keywords_do_not_break_compilation() {
        let schema = json!({
            "type": "object",
            "properties": {
                "total": {
                    "type": "decimal",
                    "rule": "price",
                    "validate_presence": true
                }
            }
        });
        assert!(validate_against_schema(&schema, &json!({"total": "9.99"})).is_ok());
    }

    #[test]
    fn enum_violation_is_reported() {
        let schema = json!({
            "type": "object",
            "properties": { "mode": {"enum": ["hsl", "cmyk", "rgb"]} }
        });
        assert!(validate_against_schema(&schema, &json!({"mode": "bogus"})).is_err());
    }
}
