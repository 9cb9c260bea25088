//! Session coordinator
//!
//! Binds one reasoning engine to one `ConnectionManager` for the length of a
//! session and turns each user input into a stream of `StreamEvent`s.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

use super::engine::{EngineConfig, EngineFactory, ReasoningEngine};
use super::events::{
    normalize, StreamEvent, COMPLETE_MESSAGE, EMPTY_INPUT_MESSAGE, STATUS_PROCESSING,
};
use super::usage::UsageTracker;
use crate::config::SessionConfig;
use crate::connection::ConnectionManager;
use crate::error::{Error, Result, SessionError};
use crate::logging::log_error;
use crate::tools::{self, InvocableTool};

/// Error message for input received outside an active session
pub const NOT_ACTIVE_MESSAGE: &str = "session not active";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Ending,
}

/// Status snapshot for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub active: bool,
    pub session_id: Option<String>,
    pub server_name: String,
    pub model: String,
    pub tools_loaded: usize,
    pub connected: bool,
    pub started_at: Option<DateTime<Utc>>,
}

type SharedEngine = Arc<Mutex<Box<dyn ReasoningEngine>>>;

struct SessionInner {
    state: SessionState,
    /// Set by `end_session` while a start is in progress
    start_cancelled: bool,
    engine: Option<SharedEngine>,
    tools: Vec<Arc<InvocableTool>>,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
}

impl SessionInner {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            start_cancelled: false,
            engine: None,
            tools: Vec::new(),
            session_id: None,
            started_at: None,
        }
    }
}

/// Events of one turn, in order. Dropping it stops the turn's producer.
pub struct TurnStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl TurnStream {
    /// Stream that yields `event` and ends
    fn single(event: StreamEvent) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // A fresh channel has room for one event
        let _ = tx.try_send(event);
        Self { rx }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for TurnStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Trimmed turn input, or `InputValidation` when nothing is left
pub fn validate_input(input: &str) -> Result<&str> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InputValidation(EMPTY_INPUT_MESSAGE.to_string()));
    }
    Ok(input)
}

/// Producer side of a turn
struct TurnProducer {
    tx: mpsc::Sender<StreamEvent>,
    usage: Arc<UsageTracker>,
}

impl TurnProducer {
    /// Record and forward one event; false once the consumer is gone
    async fn emit(&self, event: StreamEvent) -> bool {
        self.usage.record(&event);
        self.tx.send(event).await.is_ok()
    }

    async fn run(self, engine: SharedEngine, input: String, span: Span) {
        if !self.emit(StreamEvent::status(STATUS_PROCESSING)).await {
            return;
        }

        let mut engine = engine.lock().await;
        let mut events = engine.stream_turn(input);

        while let Some(item) = events.next().await {
            match item {
                Ok(raw) => {
                    if !self.emit(normalize(raw)).await {
                        debug!(parent: &span, "Turn stream dropped by consumer");
                        return;
                    }
                }
                Err(e) => {
                    warn!(parent: &span, error = %e, "Reasoning engine failed mid-turn");
                    self.emit(StreamEvent::error(format!("Engine error: {:#}", e)))
                        .await;
                    return;
                }
            }
        }

        self.emit(StreamEvent::complete(COMPLETE_MESSAGE)).await;
    }
}

/// Orchestrates a single conversational session over one connection
pub struct SessionCoordinator {
    manager: Arc<ConnectionManager>,
    factory: Arc<dyn EngineFactory>,
    config: SessionConfig,
    inner: RwLock<SessionInner>,
    usage: Arc<UsageTracker>,
    span: Span,
}

impl SessionCoordinator {
    pub fn new(
        manager: Arc<ConnectionManager>,
        factory: Arc<dyn EngineFactory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            manager,
            factory,
            config,
            inner: RwLock::new(SessionInner::idle()),
            usage: Arc::new(UsageTracker::new()),
            span: tracing::info_span!("session"),
        }
    }

    /// Log under `span` instead of the default `session` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.usage = Arc::new(UsageTracker::new().with_span(span.clone()));
        self.span = span;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session: load tools from the connection and build the engine.
    ///
    /// On failure, or when `end_session` is called before the engine is
    /// ready, the coordinator is returned to `Idle`.
    pub async fn start_session(&self) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if inner.state != SessionState::Idle {
                return Err(SessionError::AlreadyActive.into());
            }
            if !self.manager.is_connected() {
                return Err(SessionError::NotConnected.into());
            }
            inner.state = SessionState::Starting;
            inner.start_cancelled = false;
        }

        info!(
            parent: &self.span,
            server = %self.config.server_name,
            model = %self.config.model,
            "Starting session"
        );

        let tools = match tools::build_all(&self.manager) {
            Ok(tools) => tools,
            Err(e) => return Err(self.abort_start(SessionError::ToolLoading(e.to_string()))),
        };

        let engine_config = EngineConfig::new(&self.config, tools.clone());
        let engine = match self.factory.create(engine_config).await {
            Ok(engine) => engine,
            Err(e) => {
                return Err(self.abort_start(SessionError::EngineInit(format!("{:#}", e))));
            }
        };

        let session_id = Uuid::new_v4();
        {
            let mut inner = self.inner.write();
            if inner.state != SessionState::Starting || inner.start_cancelled {
                drop(inner);
                drop(engine);
                return Err(self.abort_start(SessionError::StartCancelled));
            }
            inner.state = SessionState::Active;
            inner.engine = Some(Arc::new(Mutex::new(engine)));
            inner.tools = tools;
            inner.session_id = Some(session_id);
            inner.started_at = Some(Utc::now());
        }
        self.usage.reset();

        info!(
            parent: &self.span,
            session_id = %session_id,
            tools = self.tools_loaded(),
            "Session started"
        );
        Ok(())
    }

    /// Log a failed start and return to `Idle`
    fn abort_start(&self, err: SessionError) -> Error {
        let err = Error::from(err);
        let context = [
            ("server", self.config.server_name.as_str()),
            ("model", self.config.model.as_str()),
        ];
        log_error(&self.span, &err, &context);
        self.force_cleanup();
        err
    }

    /// Run one turn.
    ///
    /// Never fails: problems end the turn with an `Error` event. Must be
    /// called from within a Tokio runtime.
    pub fn process_input(&self, input: &str) -> TurnStream {
        let input = match validate_input(input) {
            Ok(input) => input,
            Err(Error::InputValidation(reason)) => {
                debug!(parent: &self.span, reason = %reason, "Rejected turn input");
                return self.single(StreamEvent::error(reason));
            }
            Err(e) => return self.single(StreamEvent::error(e.to_string())),
        };

        let engine = {
            let inner = self.inner.read();
            match (&inner.state, &inner.engine) {
                (SessionState::Active, Some(engine)) => engine.clone(),
                _ => return self.single(StreamEvent::error(NOT_ACTIVE_MESSAGE)),
            }
        };

        debug!(parent: &self.span, chars = input.len(), "Processing input");

        let (tx, rx) = mpsc::channel(1);
        let producer = TurnProducer {
            tx,
            usage: self.usage.clone(),
        };
        tokio::spawn(producer.run(engine, input.to_string(), self.span.clone()));

        TurnStream { rx }
    }

    fn single(&self, event: StreamEvent) -> TurnStream {
        self.usage.record(&event);
        TurnStream::single(event)
    }

    /// End the session. No-op when idle; never fails.
    ///
    /// While a start is still in progress this only cancels it: the pending
    /// `start_session` returns `StartCancelled` and goes back to `Idle`.
    pub fn end_session(&self) {
        {
            let mut inner = self.inner.write();
            match inner.state {
                SessionState::Idle => return,
                SessionState::Starting => {
                    inner.start_cancelled = true;
                    info!(parent: &self.span, "Cancelling session start");
                    return;
                }
                SessionState::Active | SessionState::Ending => {}
            }
        }

        info!(parent: &self.span, "Ending session");

        let result = catch_unwind(AssertUnwindSafe(|| {
            let (engine, tools) = {
                let mut inner = self.inner.write();
                inner.state = SessionState::Ending;
                (inner.engine.take(), std::mem::take(&mut inner.tools))
            };
            drop(tools);
            drop(engine);
            *self.inner.write() = SessionInner::idle();
        }));

        if result.is_err() {
            error!(parent: &self.span, "Session cleanup panicked, forcing reset");
            self.force_cleanup();
        }
    }

    fn force_cleanup(&self) {
        *self.inner.write() = SessionInner::idle();
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn tools(&self) -> Vec<Arc<InvocableTool>> {
        self.inner.read().tools.clone()
    }

    fn tools_loaded(&self) -> usize {
        self.inner.read().tools.len()
    }

    pub fn info(&self) -> SessionInfo {
        let inner = self.inner.read();
        SessionInfo {
            active: inner.state == SessionState::Active,
            session_id: inner.session_id.map(|id| id.to_string()),
            server_name: self.config.server_name.clone(),
            model: self.config.model.clone(),
            tools_loaded: inner.tools.len(),
            connected: self.manager.is_connected(),
            started_at: inner.started_at,
        }
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_input_trims() {
        assert_eq!(validate_input("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn test_blank_input_is_an_input_validation_error() {
        for input in ["", "  ", "\t\n"] {
            match validate_input(input) {
                Err(Error::InputValidation(reason)) => assert_eq!(reason, EMPTY_INPUT_MESSAGE),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }
}
