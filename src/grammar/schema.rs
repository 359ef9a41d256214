//! Target schema: the structural description generated text must satisfy.
//!
//! A JSON Schema subset covering the keywords the structured demo needs:
//! `type`, `properties`, `required`, `additionalProperties`, string length
//! bounds and `enum`, numeric ranges, and array `items` with size bounds.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Primitive JSON type named by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Null,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Structural description of a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSchema {
    /// Expected JSON type.
    #[serde(rename = "type")]
    pub kind: SchemaType,
    /// Object properties by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, TargetSchema>,
    /// Properties that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Whether properties not listed are accepted.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub additional_properties: bool,
    /// Minimum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed string values.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Schema of array elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<TargetSchema>>,
    /// Minimum array length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    /// Maximum array length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl TargetSchema {
    /// A schema of the given type with no constraints.
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
            min_length: None,
            max_length: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            items: None,
            min_items: None,
            max_items: None,
        }
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn array(items: TargetSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaType::Array)
        }
    }

    /// Add an optional property.
    pub fn property(mut self, name: impl Into<String>, schema: TargetSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Add a required property.
    pub fn required_property(mut self, name: impl Into<String>, schema: TargetSchema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Reject properties that are not listed.
    pub fn deny_additional(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn items_between(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    /// The answer/reason/confidence object used by the structured demo.
    pub fn answer() -> Self {
        Self::object()
            .required_property("answer", Self::string().max_length(500))
            .property("reason", Self::string().max_length(500))
            .property("confidence", Self::number())
            .deny_additional()
    }

    /// Parse a schema from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Schema(e.to_string()))
    }

    /// Load a schema from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Schema(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Check that the schema is internally consistent.
    pub fn check_consistency(&self) -> Result<()> {
        self.check_at("$")
    }

    fn check_at(&self, path: &str) -> Result<()> {
        for name in &self.required {
            if !self.properties.contains_key(name) {
                return Err(Error::Schema(format!(
                    "{path}: required property `{name}` is not declared"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(Error::Schema(format!(
                    "{path}: minLength {min} exceeds maxLength {max}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
            if min > max {
                return Err(Error::Schema(format!(
                    "{path}: minimum {min} exceeds maximum {max}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_items, self.max_items) {
            if min > max {
                return Err(Error::Schema(format!(
                    "{path}: minItems {min} exceeds maxItems {max}"
                )));
            }
        }
        for (name, property) in &self.properties {
            property.check_at(&format!("{path}.{name}"))?;
        }
        if let Some(items) = &self.items {
            items.check_at(&format!("{path}[]"))?;
        }
        Ok(())
    }
}
