//! Reasoning engine seam
//!
//! The engine's decision logic is external. The coordinator only needs a
//! factory that builds one from an `EngineConfig`, and a per-turn stream of
//! raw JSON events.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::config::SessionConfig;
use crate::tools::{InvocableTool, ToolDefinition};

/// Everything an engine is constructed with
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub system_prompt: String,
    pub max_context_length: u32,
    pub tools: Vec<Arc<InvocableTool>>,
}

impl EngineConfig {
    pub fn new(session: &SessionConfig, tools: Vec<Arc<InvocableTool>>) -> Self {
        Self {
            model: session.model.clone(),
            system_prompt: session.system_prompt.clone(),
            max_context_length: session.max_context_length,
            tools,
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    pub fn find_tool(&self, name: &str) -> Option<&Arc<InvocableTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

/// A constructed engine. One turn runs at a time.
pub trait ReasoningEngine: Send {
    /// Stream the raw events for one turn of user input.
    ///
    /// An `Err` item ends the turn.
    fn stream_turn(&mut self, input: String) -> BoxStream<'_, anyhow::Result<Value>>;
}

#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, config: EngineConfig) -> anyhow::Result<Box<dyn ReasoningEngine>>;
}
