//! Eclair Core - MCP server test bench
//!
//! This crate provides the core functionality for Eclair:
//! - Connection lifecycle for one MCP server, with timeout and retry
//! - Tool adapter exposing discovered operations to a reasoning engine
//! - Session coordination with streamed, normalized turn events
//! - Usage statistics, configuration, and logging setup

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod session;
pub mod tools;

pub use config::{defaults, ConfigFile, ServerConnectionConfig, SessionConfig};
pub use connection::{
    BackoffPolicy, ConnectionManager, ConnectionState, ConnectionStatus, OperationDescriptor,
    ParameterSchema, ServerLauncher, ServerSession, StdioLauncher,
};
pub use error::{ConnectionError, Error, Result, SessionError, ToolValidationError};
pub use session::{
    normalize, run_conversation, ConversationOutcome, EngineConfig, EngineFactory, EventKind,
    EventSink, InputSource, ReasoningEngine, SessionCoordinator, SessionInfo, SessionState,
    StreamEvent, TurnStream, UsageTracker,
};
pub use tools::{
    build_all, build_invocable, format_result, InvocableTool, ParamType, ToolDefinition,
};
