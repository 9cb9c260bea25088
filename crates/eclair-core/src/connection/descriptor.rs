//! Discovered operation descriptors

use std::collections::HashSet;

use eclair_mcp::McpTool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parameter from an operation's input schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    /// JSON Schema type as declared by the server (`"string"` when absent)
    pub declared_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A remote operation discovered after the handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    /// Raw JSON Schema as announced by the server
    pub input_schema: Value,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterSchema>,
}

impl OperationDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        let parameters = parameters_from_schema(&input_schema);
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            parameters,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl From<McpTool> for OperationDescriptor {
    fn from(tool: McpTool) -> Self {
        Self::new(tool.name, tool.description, tool.input_schema)
    }
}

/// Read `properties` / `required` out of a JSON Schema object
fn parameters_from_schema(schema: &Value) -> Vec<ParameterSchema> {
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| ParameterSchema {
            name: name.clone(),
            declared_type: declared_type(prop),
            required: required.contains(name.as_str()),
            description: prop
                .get("description")
                .and_then(|d| d.as_str())
                .map(|s| s.to_string()),
        })
        .collect()
}

/// `"type": "x"` or the first non-null entry of `"type": ["x", "null"]`
fn declared_type(prop: &Value) -> String {
    match prop.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .find(|t| *t != "null")
            .unwrap_or("string")
            .to_string(),
        _ => "string".to_string(),
    }
}

/// Convert a discovery result, keeping the first operation of each name
pub(crate) fn dedupe_operations(tools: Vec<McpTool>) -> (Vec<OperationDescriptor>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut operations = Vec::with_capacity(tools.len());

    for tool in tools {
        if seen.insert(tool.name.clone()) {
            operations.push(OperationDescriptor::from(tool));
        } else {
            duplicates.push(tool.name);
        }
    }

    (operations, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> McpTool {
        McpTool {
            name: name.to_string(),
            description: format!("{} tool", name),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_parameters_keep_declaration_order() {
        let descriptor = OperationDescriptor::new(
            "search",
            "Search files",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "What to look for" },
                    "limit": { "type": "integer" },
                    "case_sensitive": { "type": ["boolean", "null"] },
                    "filters": {}
                },
                "required": ["query"]
            }),
        );

        let names: Vec<&str> = descriptor.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["query", "limit", "case_sensitive", "filters"]);

        let query = descriptor.parameter("query").unwrap();
        assert!(query.required);
        assert_eq!(query.description.as_deref(), Some("What to look for"));

        assert_eq!(descriptor.parameter("case_sensitive").unwrap().declared_type, "boolean");
        assert_eq!(descriptor.parameter("filters").unwrap().declared_type, "string");
        assert!(!descriptor.parameter("limit").unwrap().required);
    }

    #[test]
    fn test_schema_without_properties() {
        let descriptor = OperationDescriptor::new("ping", "", Value::Null);
        assert!(descriptor.parameters.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let mut second_search = tool("search");
        second_search.description = "shadow".to_string();

        let (ops, dupes) = dedupe_operations(vec![tool("search"), tool("read"), second_search]);

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].description, "search tool");
        assert_eq!(dupes, vec!["search"]);
    }
}
