//! MCP connection lifecycle
//!
//! `ConnectionManager` owns exactly one server process at a time: it connects
//! with a per-attempt handshake timeout and capped exponential backoff,
//! caches the discovered operations, validates calls against that cache, and
//! tears the process down on disconnect. Teardown cancels calls still in
//! flight, so a hung server never blocks `disconnect`.

mod descriptor;
mod launcher;

pub use descriptor::{OperationDescriptor, ParameterSchema};
pub use launcher::{ServerLauncher, ServerSession, StdioLauncher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eclair_mcp::{McpTool, ServerInfo};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};

use crate::config::ServerConnectionConfig;
use crate::error::{ConnectionError, Result, ToolValidationError};
use descriptor::dedupe_operations;

/// Default time a server gets to exit after its session is closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Failure message of a call cut short by `disconnect`
pub const CALL_ABORTED_MESSAGE: &str = "connection closed while the call was in flight";

/// Lifecycle status of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Snapshot of a manager's connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub server_name: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Names of the discovered operations
    pub tools: Vec<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            server_name: None,
            connected_at: None,
            last_error: None,
            tools: Vec::new(),
        }
    }
}

/// Delay between failed connection attempts: `min(base^attempt * unit, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: u32,
    pub unit: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: 2,
            unit: Duration::from_secs(1),
            cap: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay after the failed attempt with index `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .checked_pow(attempt)
            .and_then(|factor| self.unit.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Sum of the delays slept by a connect with `attempts` failing attempts
    pub fn total_delay(&self, attempts: u32) -> Duration {
        (0..attempts.saturating_sub(1)).map(|i| self.delay(i)).sum()
    }
}

/// An installed session plus the token that aborts its in-flight calls
struct LiveSession {
    session: Mutex<Box<dyn ServerSession>>,
    cancel: CancellationToken,
}

impl LiveSession {
    fn new(session: Box<dyn ServerSession>) -> Self {
        Self {
            session: Mutex::new(session),
            cancel: CancellationToken::new(),
        }
    }
}

/// Manager for a single MCP server connection
pub struct ConnectionManager {
    launcher: Arc<dyn ServerLauncher>,
    backoff: BackoffPolicy,
    shutdown_grace: Duration,
    /// Serializes connect/disconnect
    lifecycle: Mutex<()>,
    /// Never held across an await
    session: RwLock<Option<Arc<LiveSession>>>,
    session_open: AtomicBool,
    state: RwLock<ConnectionState>,
    operations: RwLock<Vec<OperationDescriptor>>,
    span: Span,
}

impl ConnectionManager {
    pub fn new(launcher: Arc<dyn ServerLauncher>) -> Self {
        Self {
            launcher,
            backoff: BackoffPolicy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            lifecycle: Mutex::new(()),
            session: RwLock::new(None),
            session_open: AtomicBool::new(false),
            state: RwLock::new(ConnectionState::default()),
            operations: RwLock::new(Vec::new()),
            span: tracing::info_span!("connection"),
        }
    }

    /// Manager that spawns servers over stdio
    pub fn stdio() -> Self {
        Self::new(Arc::new(StdioLauncher::new()))
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Log under `span` instead of the default `connection` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Connect to the server described by `config`.
    ///
    /// Tears down any existing connection first. Makes up to
    /// `config.retry_attempts` attempts, sleeping per the backoff policy in
    /// between, and fails with `RetriesExhausted` carrying the last cause.
    pub async fn connect(&self, config: &ServerConnectionConfig) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let server = config.display_name().to_string();

        if self.is_connected() {
            info!(parent: &self.span, server = %server, "Already connected, disconnecting first");
        }
        self.teardown().await;

        self.set_status(ConnectionStatus::Connecting, Some(&server));

        let attempts = config.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            debug!(
                parent: &self.span,
                server = %server,
                attempt = attempt + 1,
                attempts,
                "Connecting"
            );

            match self.attempt(config).await {
                Ok((session, server_info, tools)) => {
                    self.install(&server, session, tools);
                    info!(
                        parent: &self.span,
                        server = %server,
                        remote = %server_info.name,
                        remote_version = %server_info.version,
                        tools = self.operations.read().len(),
                        "Connected"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        parent: &self.span,
                        server = %server,
                        attempt = attempt + 1,
                        timeout = e.is_timeout(),
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt + 1 < attempts {
                        let delay = self.backoff.delay(attempt);
                        debug!(
                            parent: &self.span,
                            delay_ms = delay.as_millis() as u64,
                            "Backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let err = ConnectionError::RetriesExhausted {
            server: server.clone(),
            attempts,
            last_error,
        };

        {
            let mut state = self.state.write();
            state.status = ConnectionStatus::Failed;
            state.last_error = Some(err.to_string());
        }

        Err(err.into())
    }

    /// One spawn + handshake + discovery. The process is stopped on failure.
    async fn attempt(
        &self,
        config: &ServerConnectionConfig,
    ) -> std::result::Result<(Box<dyn ServerSession>, ServerInfo, Vec<McpTool>), ConnectionError> {
        let server = config.display_name();

        let mut session = self
            .launcher
            .launch(config)
            .await
            .map_err(|e| ConnectionError::Spawn {
                server: server.to_string(),
                message: e.to_string(),
            })?;

        match handshake_and_discover(session.as_mut(), server, config.timeout_duration()).await {
            Ok((info, tools)) => Ok((session, info, tools)),
            Err(e) => {
                if let Err(term) = session.terminate(self.shutdown_grace).await {
                    debug!(
                        parent: &self.span,
                        error = %term,
                        "Failed to stop server after failed attempt"
                    );
                }
                Err(e)
            }
        }
    }

    fn install(&self, server: &str, session: Box<dyn ServerSession>, tools: Vec<McpTool>) {
        let (operations, duplicates) = dedupe_operations(tools);
        for name in &duplicates {
            warn!(
                parent: &self.span,
                tool = %name,
                "Server announced duplicate tool name, keeping the first"
            );
        }

        *self.session.write() = Some(Arc::new(LiveSession::new(session)));
        self.session_open.store(true, Ordering::SeqCst);

        let names = operations.iter().map(|op| op.name.clone()).collect();
        *self.operations.write() = operations;
        *self.state.write() = ConnectionState {
            status: ConnectionStatus::Connected,
            server_name: Some(server.to_string()),
            connected_at: Some(Utc::now()),
            last_error: None,
            tools: names,
        };
    }

    /// Close the session and stop the server. Safe from any state.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        let live = self.session.write().take();
        self.session_open.store(false, Ordering::SeqCst);

        if let Some(live) = live {
            // Pending invokes drop their calls and release the session
            live.cancel.cancel();
            let mut session = live.session.lock().await;

            if let Err(e) = session.close().await {
                warn!(parent: &self.span, error = %e, "Error closing MCP session");
            }
            if let Err(e) = session.terminate(self.shutdown_grace).await {
                warn!(parent: &self.span, error = %e, "Error stopping MCP server");
            }
            info!(parent: &self.span, "Disconnected");
        }

        self.operations.write().clear();
        *self.state.write() = ConnectionState::default();
    }

    /// Connected with a live session
    pub fn is_connected(&self) -> bool {
        self.state.read().status == ConnectionStatus::Connected
            && self.session_open.load(Ordering::SeqCst)
    }

    /// Copy of the discovered operations
    pub fn list_operations(&self) -> Result<Vec<OperationDescriptor>> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        Ok(self.operations.read().clone())
    }

    /// Whether `name` is among the discovered operations
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.read().iter().any(|op| op.name == name)
    }

    /// Invoke a discovered operation.
    ///
    /// Unknown names are rejected locally. Transport failures, and calls cut
    /// short by a disconnect, are returned as `ConnectionError::Invoke`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        if !self.has_operation(name) {
            return Err(ToolValidationError::UnknownOperation(name.to_string()).into());
        }

        let live = self
            .session
            .read()
            .clone()
            .ok_or(ConnectionError::NotConnected)?;

        debug!(parent: &self.span, tool = %name, "Invoking tool");
        let call = async {
            let mut session = live.session.lock().await;
            session.call_tool(name, arguments).await
        };

        let message = tokio::select! {
            _ = live.cancel.cancelled() => {
                warn!(parent: &self.span, tool = %name, "Tool call aborted by disconnect");
                CALL_ABORTED_MESSAGE.to_string()
            }
            result = call => match result {
                Ok(value) => return Ok(value),
                Err(e) => e.to_string(),
            },
        };

        Err(ConnectionError::Invoke {
            name: name.to_string(),
            message,
        }
        .into())
    }

    /// Snapshot of the connection state
    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    /// Name of the connected (or last attempted) server
    pub fn server_name(&self) -> Option<String> {
        self.state.read().server_name.clone()
    }

    fn set_status(&self, status: ConnectionStatus, server: Option<&str>) {
        let mut state = self.state.write();
        state.status = status;
        if let Some(server) = server {
            state.server_name = Some(server.to_string());
        }
    }
}

async fn handshake_and_discover(
    session: &mut dyn ServerSession,
    server: &str,
    timeout: Duration,
) -> std::result::Result<(ServerInfo, Vec<McpTool>), ConnectionError> {
    let info = match tokio::time::timeout(timeout, session.handshake()).await {
        Err(_) => {
            return Err(ConnectionError::Timeout {
                server: server.to_string(),
                timeout,
            })
        }
        Ok(Err(e)) => {
            return Err(ConnectionError::Handshake {
                server: server.to_string(),
                message: e.to_string(),
            })
        }
        Ok(Ok(info)) => info,
    };

    let tools = match tokio::time::timeout(timeout, session.list_tools()).await {
        Err(_) => {
            return Err(ConnectionError::Discovery {
                server: server.to_string(),
                message: format!("timed out after {:?}", timeout),
            })
        }
        Ok(Err(e)) => {
            return Err(ConnectionError::Discovery {
                server: server.to_string(),
                message: e.to_string(),
            })
        }
        Ok(Ok(tools)) => tools,
    };

    Ok((info, tools))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_is_capped_powers_of_two() {
        let backoff = BackoffPolicy::default();
        let delays: Vec<u64> = (0..6).map(|i| backoff.delay(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_backoff_survives_overflow() {
        let backoff = BackoffPolicy::default();
        assert_eq!(backoff.delay(200), Duration::from_secs(10));
    }

    #[test]
    fn test_total_delay_skips_the_last_attempt() {
        let backoff = BackoffPolicy::default();
        assert_eq!(backoff.total_delay(1), Duration::ZERO);
        assert_eq!(backoff.total_delay(3), Duration::from_secs(3));
        assert_eq!(backoff.total_delay(6), Duration::from_secs(25));
    }

    #[test]
    fn test_custom_backoff() {
        let backoff = BackoffPolicy {
            base: 3,
            unit: Duration::from_millis(100),
            cap: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(900));
        assert_eq!(backoff.delay(3), Duration::from_secs(1));
    }

    #[test]
    fn test_new_manager_is_disconnected() {
        let manager = ConnectionManager::stdio();
        assert!(!manager.is_connected());
        assert_eq!(manager.state().status, ConnectionStatus::Disconnected);
        assert!(manager.list_operations().is_err());
    }
}
