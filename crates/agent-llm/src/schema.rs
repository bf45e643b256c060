//! Target schemas for structured LLM output
//!
//! A type that an LLM call should produce implements [`StructuredOutput`] and
//! declares its fields in a [`Schema`]. The field table drives three things:
//! the JSON schema sent to backends that need one, the default instance
//! synthesised when every attempt fails, and the name used for forced tools.

use crate::{LLMError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Placeholder used for string fields of a synthesised default
pub const DEFAULT_STRING_PLACEHOLDER: &str = "Error in analysis, using default";

/// Primitive type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text
    String,
    /// Floating point number
    Float,
    /// Whole number
    Integer,
    /// Arbitrary JSON object
    Map,
    /// One of a fixed set of string literals
    Choice(&'static [&'static str]),
}

impl FieldKind {
    /// Default value for a field of this kind
    ///
    /// Choices default to their first literal. An empty choice list has no
    /// sensible default and yields `null`.
    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(DEFAULT_STRING_PLACEHOLDER.to_string()),
            Self::Float => json!(0.0),
            Self::Integer => json!(0),
            Self::Map => Value::Object(Map::new()),
            Self::Choice(options) => options
                .first()
                .map_or(Value::Null, |first| Value::String((*first).to_string())),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Float => json!({"type": "number"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Map => json!({"type": "object"}),
            Self::Choice(options) => json!({"type": "string", "enum": options}),
        }
    }
}

/// One required field of a structured output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// JSON field name
    pub name: &'static str,
    /// Description shown to the model
    pub description: &'static str,
    /// Declared type
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a field specification
    pub const fn new(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
        }
    }
}

/// Field table describing a structured output type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Schema name; also the tool name for providers that force a tool call
    pub name: &'static str,
    /// Short description of the object
    pub description: &'static str,
    /// Required fields, in declaration order
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Create a schema from its field table
    pub fn new(name: &'static str, description: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name,
            description,
            fields,
        }
    }

    /// JSON schema of the object, all fields required
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = field.kind.json_schema();
            if let Value::Object(obj) = &mut property {
                obj.insert("description".to_string(), json!(field.description));
            }
            properties.insert(field.name.to_string(), property);
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Default JSON object built from each field's default value
    pub fn default_value(&self) -> Value {
        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.kind.default_value()))
            .collect();
        Value::Object(object)
    }
}

/// A type an LLM call can be asked to produce
///
/// Implementors declare their field table once; deserialization of model
/// output goes through serde, so a response that does not fit the type is an
/// extraction failure and counts as a failed attempt.
pub trait StructuredOutput: DeserializeOwned + Send + Sized + 'static {
    /// Field table of this type
    fn schema() -> Schema;

    /// JSON schema of this type
    fn json_schema() -> Value {
        Self::schema().json_schema()
    }

    /// Build an instance from a JSON value
    fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            LLMError::ExtractionFailed(format!(
                "response does not match schema '{}': {e}",
                Self::schema().name
            ))
        })
    }

    /// Deterministic default built from the field table
    ///
    /// # Panics
    ///
    /// Panics when the field table does not describe the type, i.e. its
    /// default object fails to deserialize. That is a programming error in
    /// the implementor, not a runtime condition.
    fn synthesize_default() -> Self {
        let schema = Self::schema();
        match serde_json::from_value(schema.default_value()) {
            Ok(value) => value,
            Err(e) => panic!(
                "schema '{}' does not describe its own type: {e}",
                schema.name
            ),
        }
    }
}
