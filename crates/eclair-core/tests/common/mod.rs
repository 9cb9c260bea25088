//! Shared fakes for integration tests
//!
//! - `FakeLauncher` / `FakeSession`: scripted MCP server with call counters.
//!   A tool named `explode` fails and one named `hang` never answers.
//! - `ScriptedFactory` / `ScriptedEngine`: reasoning engine replaying steps
//! - `ScriptedInput` / `RecordingSink`: conversation driver endpoints

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use eclair_core::session::{EventSink, InputSource};
use eclair_core::{
    ConnectionManager, EngineConfig, EngineFactory, InvocableTool, ReasoningEngine,
    ServerConnectionConfig, ServerLauncher, ServerSession, SessionCoordinator, StreamEvent,
};
use eclair_mcp::{McpError, McpTool, ServerInfo};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};

// ============================================================================
// Fake MCP server
// ============================================================================

#[derive(Debug, Clone)]
pub enum ServerBehavior {
    /// The process cannot be started
    SpawnFails,
    /// The server answers `initialize` with an error
    HandshakeFails,
    /// The server never answers `initialize`
    HandshakeHangs,
    /// Handshake succeeds and discovery returns these tools
    Ready(Vec<McpTool>),
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub handshakes: AtomicUsize,
    pub calls: AtomicUsize,
    pub closes: AtomicUsize,
    pub terminates: AtomicUsize,
    /// Handshakes running right now, and the most seen at once
    pub in_handshake: AtomicUsize,
    pub max_in_handshake: AtomicUsize,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn terminates(&self) -> usize {
        self.terminates.load(Ordering::SeqCst)
    }

    pub fn max_in_handshake(&self) -> usize {
        self.max_in_handshake.load(Ordering::SeqCst)
    }
}

pub struct FakeLauncher {
    behavior: ServerBehavior,
    handshake_delay: Duration,
    pub counters: Arc<Counters>,
}

impl FakeLauncher {
    pub fn new(behavior: ServerBehavior) -> Arc<Self> {
        Self::slow(behavior, Duration::ZERO)
    }

    /// Launcher whose handshakes take `handshake_delay`
    pub fn slow(behavior: ServerBehavior, handshake_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            handshake_delay,
            counters: Arc::new(Counters::default()),
        })
    }
}

#[async_trait]
impl ServerLauncher for FakeLauncher {
    async fn launch(
        &self,
        config: &ServerConnectionConfig,
    ) -> Result<Box<dyn ServerSession>, McpError> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);

        if let ServerBehavior::SpawnFails = self.behavior {
            return Err(McpError::Transport(format!(
                "{}: No such file or directory",
                config.command
            )));
        }

        Ok(Box::new(FakeSession {
            behavior: self.behavior.clone(),
            handshake_delay: self.handshake_delay,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    behavior: ServerBehavior,
    handshake_delay: Duration,
    counters: Arc<Counters>,
}

#[async_trait]
impl ServerSession for FakeSession {
    async fn handshake(&mut self) -> Result<ServerInfo, McpError> {
        self.counters.handshakes.fetch_add(1, Ordering::SeqCst);

        if !self.handshake_delay.is_zero() {
            let running = self.counters.in_handshake.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_handshake.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(self.handshake_delay).await;
            self.counters.in_handshake.fetch_sub(1, Ordering::SeqCst);
        }

        match &self.behavior {
            ServerBehavior::HandshakeFails => {
                Err(McpError::Protocol("Connection closed".to_string()))
            }
            ServerBehavior::HandshakeHangs => std::future::pending().await,
            _ => Ok(ServerInfo {
                name: "fake-server".to_string(),
                version: "1.0.0".to_string(),
                protocol_version: "2024-11-05".to_string(),
            }),
        }
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        match &self.behavior {
            ServerBehavior::Ready(tools) => Ok(tools.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);

        match name {
            "explode" => return Err(McpError::Server("internal failure".to_string())),
            "hang" => return std::future::pending().await,
            _ => {}
        }

        Ok(json!({
            "content": [
                { "type": "text", "text": format!("{} ok", name) },
                { "type": "text", "text": arguments.to_string() }
            ]
        }))
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<(), McpError> {
        self.counters.terminates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn tool(name: &str) -> McpTool {
    McpTool {
        name: name.to_string(),
        description: format!("The {} tool", name),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer" }
            },
            "required": ["query"]
        }),
    }
}

pub fn server_config(retry_attempts: u32) -> ServerConnectionConfig {
    ServerConnectionConfig::new("fake-server")
        .with_name("fake")
        .with_timeout(5)
        .with_retry_attempts(retry_attempts)
}

/// Manager already connected to a fake server offering `names`
pub async fn connected_manager(names: &[&str]) -> (Arc<ConnectionManager>, Arc<Counters>) {
    let tools = names.iter().map(|n| tool(n)).collect();
    let launcher = FakeLauncher::new(ServerBehavior::Ready(tools));
    let counters = launcher.counters.clone();
    let manager = Arc::new(
        ConnectionManager::new(launcher)
            .with_span(tracing::info_span!("connection", server = "fake")),
    );

    manager
        .connect(&server_config(1))
        .await
        .expect("fake server should connect");

    (manager, counters)
}

// ============================================================================
// Scripted reasoning engine
// ============================================================================

#[derive(Debug, Clone)]
pub enum Step {
    /// `{"type": "text", "text": ..}`
    Text(&'static str),
    /// Call the named tool and emit a `tool_use` event with its result
    Tool(&'static str, Value),
    /// Emit this raw event as is
    Raw(Value),
    /// Fail the turn
    Fail(&'static str),
}

pub struct ScriptedEngine {
    steps: Vec<Step>,
    tools: Vec<Arc<InvocableTool>>,
    inputs: Arc<Mutex<Vec<String>>>,
    steps_taken: Arc<Mutex<Vec<String>>>,
    dropped: Arc<AtomicUsize>,
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

impl ReasoningEngine for ScriptedEngine {
    fn stream_turn(&mut self, input: String) -> BoxStream<'_, anyhow::Result<Value>> {
        self.inputs.lock().push(input.clone());
        let tools = self.tools.clone();
        let steps_taken = self.steps_taken.clone();

        futures::stream::iter(self.steps.clone().into_iter().enumerate())
            .then(move |(index, step)| {
                let tools = tools.clone();
                steps_taken.lock().push(format!("{}#{}", input, index));
                async move {
                    match step {
                        Step::Text(text) => Ok(json!({ "type": "text", "text": text })),
                        Step::Tool(name, arguments) => {
                            let result = match tools.iter().find(|t| t.name() == name) {
                                Some(tool) => tool.call(arguments.clone()).await,
                                None => format!("no such tool: {}", name),
                            };
                            Ok(json!({
                                "type": "tool_use",
                                "tool_name": name,
                                "arguments": arguments,
                                "result": result
                            }))
                        }
                        Step::Raw(value) => Ok(value),
                        Step::Fail(message) => Err(anyhow::anyhow!(message)),
                    }
                }
            })
            .boxed()
    }
}

#[derive(Default)]
pub struct ScriptedFactory {
    steps: Vec<Step>,
    fail_with: Option<&'static str>,
    /// `create` waits for a permit on this gate when set
    gate: Option<Arc<Notify>>,
    /// Every turn input the engines received
    pub inputs: Arc<Mutex<Vec<String>>>,
    /// `input#step` for every step the engines produced, in order
    pub steps_taken: Arc<Mutex<Vec<String>>>,
    /// Engines dropped so far
    pub dropped: Arc<AtomicUsize>,
    /// Tool names each engine was built with
    pub tool_names: Arc<Mutex<Vec<String>>>,
    pub model: Arc<Mutex<Option<String>>>,
}

impl ScriptedFactory {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            ..Default::default()
        })
    }

    pub fn failing(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message),
            ..Default::default()
        })
    }

    /// Factory whose `create` blocks until the returned gate is notified
    pub fn gated(steps: Vec<Step>) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let factory = Arc::new(Self {
            steps,
            gate: Some(gate.clone()),
            ..Default::default()
        });
        (factory, gate)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }

    pub fn steps_taken(&self) -> Vec<String> {
        self.steps_taken.lock().clone()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for ScriptedFactory {
    async fn create(&self, config: EngineConfig) -> anyhow::Result<Box<dyn ReasoningEngine>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = self.fail_with {
            anyhow::bail!(message);
        }

        *self.tool_names.lock() = config
            .tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        *self.model.lock() = Some(config.model.clone());

        Ok(Box::new(ScriptedEngine {
            steps: self.steps.clone(),
            tools: config.tools,
            inputs: self.inputs.clone(),
            steps_taken: self.steps_taken.clone(),
            dropped: self.dropped.clone(),
        }))
    }
}

// ============================================================================
// Conversation endpoints
// ============================================================================

pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_turn(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Input that never arrives, like a user who stopped typing
pub struct SilentInput;

#[async_trait]
impl InputSource for SilentInput {
    async fn next_turn(&mut self) -> Option<String> {
        std::future::pending().await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<StreamEvent>,
    pub turns: usize,
}

impl EventSink for RecordingSink {
    fn on_event(&mut self, event: &StreamEvent) {
        self.events.push(event.clone());
    }

    fn on_turn_end(&mut self, _coordinator: &SessionCoordinator) {
        self.turns += 1;
    }
}
