//! MCP Tool adapter
//!
//! Wraps each discovered operation as an `InvocableTool` that a reasoning
//! engine can call. A call never fails from the engine's point of view:
//! errors come back as text so one bad tool call cannot end the turn.

mod params;

pub use params::{ParamType, ParameterListBuilder, ToolParameter};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::connection::{ConnectionManager, OperationDescriptor};
use crate::error::Result;

/// Provider-neutral tool definition handed to a reasoning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// A discovered operation bound to the manager that can run it
pub struct InvocableTool {
    descriptor: OperationDescriptor,
    parameters: Vec<ToolParameter>,
    manager: Arc<ConnectionManager>,
}

impl std::fmt::Debug for InvocableTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocableTool")
            .field("name", &self.descriptor.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl InvocableTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    pub fn parameters_schema(&self) -> &Value {
        &self.descriptor.input_schema
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.descriptor.name.clone(),
            description: if self.descriptor.description.is_empty() {
                None
            } else {
                Some(self.descriptor.description.clone())
            },
            schema: if self.descriptor.input_schema.is_null() {
                None
            } else {
                Some(self.descriptor.input_schema.clone())
            },
        }
    }

    /// Run the operation and render its result as text.
    ///
    /// Failures are rendered as `Error executing tool '<name>': <message>`.
    pub async fn call(&self, arguments: Value) -> String {
        match self.manager.invoke(&self.descriptor.name, arguments).await {
            Ok(result) => format_result(&result),
            Err(e) => {
                debug!(tool = %self.descriptor.name, error = %e, "Tool call failed");
                format!("Error executing tool '{}': {}", self.descriptor.name, e)
            }
        }
    }
}

/// Wrap one descriptor
pub fn build_invocable(
    descriptor: OperationDescriptor,
    manager: Arc<ConnectionManager>,
) -> InvocableTool {
    let parameters = descriptor
        .parameters
        .iter()
        .fold(ParameterListBuilder::new(), |builder, schema| builder.schema(schema))
        .build();

    InvocableTool {
        descriptor,
        parameters,
        manager,
    }
}

/// Wrap every operation cached by `manager`
pub fn build_all(manager: &Arc<ConnectionManager>) -> Result<Vec<Arc<InvocableTool>>> {
    let operations = manager.list_operations()?;

    Ok(operations
        .into_iter()
        .map(|descriptor| Arc::new(build_invocable(descriptor, manager.clone())))
        .collect())
}

/// Render a `tools/call` result.
///
/// A `content` sequence becomes its items joined by newlines (text items by
/// their text, others as JSON); anything else is rendered whole.
pub fn format_result(result: &Value) -> String {
    match result.get("content").and_then(|c| c.as_array()) {
        Some(items) => items
            .iter()
            .map(format_content_item)
            .collect::<Vec<_>>()
            .join("\n"),
        None => stringify(result),
    }
}

fn format_content_item(item: &Value) -> String {
    match item.get("text").and_then(|t| t.as_str()) {
        Some(text) => text.to_string(),
        None => stringify(item),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_joins_content_items() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"}
            ],
            "isError": false
        });

        let text = format_result(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "first");
        assert_eq!(lines[1], "second");
        assert!(lines[2].contains("image/png"));
    }

    #[test]
    fn test_format_without_content_stringifies_whole_result() {
        assert_eq!(format_result(&json!({"status": "ok"})), r#"{"status":"ok"}"#);
        assert_eq!(format_result(&json!("plain")), "plain");
        assert_eq!(format_result(&json!({"content": "not a list"})), r#"{"content":"not a list"}"#);
    }

    #[test]
    fn test_format_empty_content() {
        assert_eq!(format_result(&json!({"content": []})), "");
    }

    #[tokio::test]
    async fn test_call_without_connection_returns_error_text() {
        let manager = Arc::new(ConnectionManager::stdio());
        let descriptor = OperationDescriptor::new(
            "navigate",
            "Navigate to URL",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "timeout": { "type": "number" }
                },
                "required": ["url"]
            }),
        );

        let tool = build_invocable(descriptor, manager);
        assert_eq!(tool.parameters().len(), 2);
        assert!(!tool.parameters()[0].optional);
        assert_eq!(tool.parameters()[1].param_type, ParamType::Float);

        let output = tool.call(json!({"url": "https://example.com"})).await;
        assert!(output.starts_with("Error executing tool 'navigate': "));
        assert!(output.contains("Not connected"));
    }

    #[test]
    fn test_definition_omits_empty_fields() {
        let manager = Arc::new(ConnectionManager::stdio());
        let tool = build_invocable(OperationDescriptor::new("ping", "", Value::Null), manager);

        let definition = tool.to_definition();
        assert_eq!(definition.name, "ping");
        assert!(definition.description.is_none());
        assert!(definition.schema.is_none());
    }
}
