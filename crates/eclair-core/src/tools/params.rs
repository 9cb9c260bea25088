//! Typed parameter metadata for invocable tools

use serde::{Deserialize, Serialize};

use crate::connection::ParameterSchema;

/// Parameter types a reasoning engine can be told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Bool,
    /// Ordered sequence
    Array,
    /// Key-value mapping
    Object,
}

/// JSON Schema type name -> parameter type
const TYPE_TABLE: &[(&str, ParamType)] = &[
    ("string", ParamType::String),
    ("integer", ParamType::Integer),
    ("number", ParamType::Float),
    ("boolean", ParamType::Bool),
    ("array", ParamType::Array),
    ("object", ParamType::Object),
];

impl ParamType {
    /// Look up a schema type; anything unrecognized is a string
    pub fn from_schema_type(schema_type: &str) -> Self {
        TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == schema_type)
            .map(|(_, ty)| *ty)
            .unwrap_or(ParamType::String)
    }

    /// JSON Schema name of this type
    pub fn schema_name(self) -> &'static str {
        TYPE_TABLE
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(name, _)| *name)
            .unwrap_or("string")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    /// Absent from the schema's `required` list
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Assembles a parameter list in declaration order
#[derive(Debug, Default)]
pub struct ParameterListBuilder {
    params: Vec<ToolParameter>,
}

impl ParameterListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, param_type: ParamType, required: bool) -> Self {
        self.params.push(ToolParameter {
            name: name.into(),
            param_type,
            optional: !required,
            description: None,
        });
        self
    }

    /// Add a parameter from its discovered schema
    pub fn schema(mut self, schema: &ParameterSchema) -> Self {
        self.params.push(ToolParameter {
            name: schema.name.clone(),
            param_type: ParamType::from_schema_type(&schema.declared_type),
            optional: !schema.required,
            description: schema.description.clone(),
        });
        self
    }

    pub fn build(self) -> Vec<ToolParameter> {
        self.params
    }
}
