//! Compiled JSON grammar and the per-step stop check.
//!
//! ## Two kinds of parse
//!
//! ```text
//! mid-generation:  check(text) ──► Complete(value)  → stop, grammar satisfied
//!                              └─► Incomplete       → keep generating
//!
//! after the loop:  parse(text) ──► Ok(value)
//!                              └─► Err(GrammarParse) → surfaced to the caller
//! ```
//!
//! `check` never fails: text that is not yet a valid instance and text that
//! can never become one are both reported as `Incomplete`.

use serde_json::{Map, Value};

use super::schema::{SchemaType, TargetSchema};
use crate::error::{Error, Result};

/// Outcome of a mid-generation grammar check.
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarCheck {
    /// The text is a complete, valid instance.
    Complete(Value),
    /// Not parseable yet; generation should continue.
    Incomplete,
}

impl GrammarCheck {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// A grammar compiled from a [`TargetSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct JsonGrammar {
    schema: TargetSchema,
}

impl JsonGrammar {
    /// Compile a grammar, rejecting inconsistent schemas.
    pub fn compile(schema: &TargetSchema) -> Result<Self> {
        schema.check_consistency()?;
        Ok(Self {
            schema: schema.clone(),
        })
    }

    /// The schema this grammar was compiled from.
    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    /// Mid-generation check. Never an error.
    pub fn check(&self, text: &str) -> GrammarCheck {
        match self.parse_inner(text) {
            Ok(value) => GrammarCheck::Complete(value),
            Err(reason) => {
                tracing::trace!(%reason, "text not yet a valid instance");
                GrammarCheck::Incomplete
            }
        }
    }

    /// Final parse of the completed text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrammarParse`] when `text` is not a complete, valid
    /// instance of the schema.
    pub fn parse(&self, text: &str) -> Result<Value> {
        self.parse_inner(text).map_err(|reason| Error::GrammarParse {
            reason,
            text: text.to_string(),
        })
    }

    fn parse_inner(&self, text: &str) -> std::result::Result<Value, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        validate(&value, &self.schema, "$")?;
        Ok(value)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: SchemaType, value: &Value) -> String {
    format!(
        "{path}: expected {}, found {}",
        expected.as_str(),
        type_name(value)
    )
}

/// Validate `value` against `schema`, reporting the first violation.
fn validate(value: &Value, schema: &TargetSchema, path: &str) -> std::result::Result<(), String> {
    match (schema.kind, value) {
        (SchemaType::Object, Value::Object(map)) => validate_object(map, schema, path),
        (SchemaType::String, Value::String(s)) => validate_string(s, schema, path),
        (SchemaType::Number, Value::Number(n)) => {
            validate_range(n.as_f64().unwrap_or(f64::NAN), schema, path)
        }
        (SchemaType::Integer, Value::Number(n)) => {
            let v = n.as_f64().unwrap_or(f64::NAN);
            if v.fract() != 0.0 {
                return Err(format!("{path}: expected integer, found {n}"));
            }
            validate_range(v, schema, path)
        }
        (SchemaType::Boolean, Value::Bool(_)) | (SchemaType::Null, Value::Null) => Ok(()),
        (SchemaType::Array, Value::Array(items)) => validate_array(items, schema, path),
        (expected, other) => Err(mismatch(path, expected, other)),
    }
}

fn validate_object(
    map: &Map<String, Value>,
    schema: &TargetSchema,
    path: &str,
) -> std::result::Result<(), String> {
    for name in &schema.required {
        if !map.contains_key(name) {
            return Err(format!("{path}: missing required property `{name}`"));
        }
    }
    for (name, value) in map {
        match schema.properties.get(name) {
            Some(property) => validate(value, property, &format!("{path}.{name}"))?,
            None if !schema.additional_properties => {
                return Err(format!("{path}: unexpected property `{name}`"));
            }
            None => {}
        }
    }
    Ok(())
}

fn validate_string(s: &str, schema: &TargetSchema, path: &str) -> std::result::Result<(), String> {
    let len = s.chars().count();
    if let Some(min) = schema.min_length {
        if len < min {
            return Err(format!("{path}: length {len} below minLength {min}"));
        }
    }
    if let Some(max) = schema.max_length {
        if len > max {
            return Err(format!("{path}: length {len} above maxLength {max}"));
        }
    }
    if let Some(allowed) = &schema.enum_values {
        if !allowed.iter().any(|a| a == s) {
            return Err(format!("{path}: {s:?} is not one of {allowed:?}"));
        }
    }
    Ok(())
}

fn validate_range(v: f64, schema: &TargetSchema, path: &str) -> std::result::Result<(), String> {
    if let Some(min) = schema.minimum {
        if v < min {
            return Err(format!("{path}: {v} below minimum {min}"));
        }
    }
    if let Some(max) = schema.maximum {
        if v > max {
            return Err(format!("{path}: {v} above maximum {max}"));
        }
    }
    Ok(())
}

fn validate_array(
    items: &[Value],
    schema: &TargetSchema,
    path: &str,
) -> std::result::Result<(), String> {
    let len = items.len();
    if let Some(min) = schema.min_items {
        if len < min {
            return Err(format!("{path}: {len} items below minItems {min}"));
        }
    }
    if let Some(max) = schema.max_items {
        if len > max {
            return Err(format!("{path}: {len} items above maxItems {max}"));
        }
    }
    if let Some(item_schema) = &schema.items {
        for (i, item) in items.iter().enumerate() {
            validate(item, item_schema, &format!("{path}[{i}]"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer_grammar() -> JsonGrammar {
        JsonGrammar::compile(&TargetSchema::answer()).unwrap()
    }

    #[test]
    fn test_complete_instance() {
        let grammar = answer_grammar();
        let check = grammar.check(r#"{"answer": "Rayleigh scattering", "confidence": 0.9}"#);

        assert_eq!(
            check,
            GrammarCheck::Complete(json!({"answer": "Rayleigh scattering", "confidence": 0.9}))
        );
    }

    #[test]
    fn test_prefixes_are_incomplete() {
        let grammar = answer_grammar();
        let full = r#"{"answer": "blue"}"#;

        for end in 0..full.len() {
            assert_eq!(grammar.check(&full[..end]), GrammarCheck::Incomplete, "{}", &full[..end]);
        }
        assert!(grammar.check(full).is_complete());
    }

    #[test]
    fn test_surrounding_whitespace_accepted() {
        let grammar = answer_grammar();
        assert!(grammar.check("\n  {\"answer\": \"x\"}  \n").is_complete());
    }

    #[test]
    fn test_missing_required_field() {
        let grammar = answer_grammar();
        let err = grammar.parse(r#"{"reason": "because"}"#).unwrap_err();

        match err {
            Error::GrammarParse { reason, .. } => assert!(reason.contains("answer"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_additional_property_rejected() {
        let grammar = answer_grammar();
        assert_eq!(grammar.check(r#"{"answer": "x", "extra": 1}"#), GrammarCheck::Incomplete);
    }

    #[test]
    fn test_max_length_counts_chars() {
        let schema = TargetSchema::object()
            .required_property("s", TargetSchema::string().max_length(3));
        let grammar = JsonGrammar::compile(&schema).unwrap();

        assert!(grammar.check(r#"{"s": "ééé"}"#).is_complete());
        assert!(!grammar.check(r#"{"s": "éééé"}"#).is_complete());
    }

    #[test]
    fn test_wrong_type() {
        let grammar = answer_grammar();
        assert!(!grammar.check(r#"{"answer": 42}"#).is_complete());
        assert!(!grammar.check(r#"{"answer": "x", "confidence": "high"}"#).is_complete());
        assert!(!grammar.check(r#"["answer"]"#).is_complete());
    }

    #[test]
    fn test_integer_range_and_enum() {
        let schema = TargetSchema::object()
            .required_property("n", TargetSchema::integer().range(Some(1.0), Some(10.0)))
            .property("mood", TargetSchema::string().one_of(["happy", "sad"]));
        let grammar = JsonGrammar::compile(&schema).unwrap();

        assert!(grammar.check(r#"{"n": 3}"#).is_complete());
        assert!(grammar.check(r#"{"n": 3.0, "mood": "sad"}"#).is_complete());
        assert!(!grammar.check(r#"{"n": 3.5}"#).is_complete());
        assert!(!grammar.check(r#"{"n": 11}"#).is_complete());
        assert!(!grammar.check(r#"{"n": 2, "mood": "bored"}"#).is_complete());
    }

    #[test]
    fn test_array_items() {
        let schema = TargetSchema::array(TargetSchema::boolean()).items_between(Some(1), Some(2));
        let grammar = JsonGrammar::compile(&schema).unwrap();

        assert!(grammar.check("[true]").is_complete());
        assert!(!grammar.check("[]").is_complete());
        assert!(!grammar.check("[true, false, true]").is_complete());
        assert!(!grammar.check("[1]").is_complete());
    }

    #[test]
    fn test_compile_rejects_inconsistent_schema() {
        let schema = TargetSchema {
            required: vec!["ghost".to_string()],
            ..TargetSchema::object()
        };
        assert!(matches!(JsonGrammar::compile(&schema), Err(Error::Schema(_))));
    }
}
