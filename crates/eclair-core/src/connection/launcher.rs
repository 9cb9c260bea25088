//! Transport seam between the connection manager and a running server
//!
//! `ServerLauncher` spawns a server process from a config; the returned
//! `ServerSession` exposes the handful of primitives the manager needs.
//! `StdioLauncher` is the real implementation over `eclair_mcp`.

use std::time::Duration;

use async_trait::async_trait;
use eclair_mcp::{ClientInfo, McpClient, McpError, McpTool, ServerInfo, StdioTransport};
use serde_json::Value;

use crate::config::ServerConnectionConfig;

/// Starts server processes
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Spawn the process described by `config` and open a channel to it
    async fn launch(
        &self,
        config: &ServerConnectionConfig,
    ) -> Result<Box<dyn ServerSession>, McpError>;
}

/// One spawned server and its request channel
#[async_trait]
pub trait ServerSession: Send {
    async fn handshake(&mut self) -> Result<ServerInfo, McpError>;
    async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError>;
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError>;
    /// End the protocol session
    async fn close(&mut self) -> Result<(), McpError>;
    /// Stop the process, killing it if it outlives `grace`
    async fn terminate(&mut self, grace: Duration) -> Result<(), McpError>;
}

/// Launches servers as child processes speaking MCP over stdio
#[derive(Debug, Clone, Default)]
pub struct StdioLauncher {
    client_info: Option<ClientInfo>,
}

impl StdioLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identify as `client_info` during the handshake
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = Some(client_info);
        self
    }
}

#[async_trait]
impl ServerLauncher for StdioLauncher {
    async fn launch(
        &self,
        config: &ServerConnectionConfig,
    ) -> Result<Box<dyn ServerSession>, McpError> {
        let transport = StdioTransport::spawn(&config.command, &config.args, &config.env)
            .await
            .map_err(|e| McpError::Transport(format!("{}: {}", config.command, e)))?;

        Ok(Box::new(StdioSession {
            client: McpClient::new(transport),
            client_info: self.client_info.clone().unwrap_or_default(),
        }))
    }
}

struct StdioSession {
    client: McpClient<StdioTransport>,
    client_info: ClientInfo,
}

#[async_trait]
impl ServerSession for StdioSession {
    async fn handshake(&mut self) -> Result<ServerInfo, McpError> {
        self.client.initialize(self.client_info.clone()).await
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        self.client.list_tools().await
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.client.call_tool(name, arguments).await
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.client.close().await
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), McpError> {
        self.client.terminate(grace).await
    }
}
