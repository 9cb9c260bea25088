//! Error types for Eclair Core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using Eclair Error
pub type Result<T> = std::result::Result<T, Error>;

/// Eclair error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Tool validation error: {0}")]
    ToolValidation(#[from] ToolValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while reaching or talking to an MCP server
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to start server '{server}': {message}")]
    Spawn { server: String, message: String },

    #[error("Handshake with server '{server}' timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    #[error("Handshake with server '{server}' failed: {message}")]
    Handshake { server: String, message: String },

    #[error("Tool discovery on server '{server}' failed: {message}")]
    Discovery { server: String, message: String },

    #[error("Failed to connect to server '{server}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        server: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Not connected to an MCP server")]
    NotConnected,

    #[error("Tool '{name}' failed on the server: {message}")]
    Invoke { name: String, message: String },
}

impl ConnectionError {
    /// Whether this failure was a handshake timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout { .. })
    }
}

/// Local validation of tool calls, raised before any transport round-trip
#[derive(Error, Debug)]
pub enum ToolValidationError {
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot start session: not connected to an MCP server")]
    NotConnected,

    #[error("Session is already active")]
    AlreadyActive,

    #[error("Failed to load tools: {0}")]
    ToolLoading(String),

    #[error("Failed to initialize reasoning engine: {0}")]
    EngineInit(String),

    #[error("Session start was cancelled before the engine was ready")]
    StartCancelled,
}

const CONNECTION_SUGGESTIONS: &[&str] = &[
    "Verify the server command and arguments are correct",
    "Check if required dependencies are installed (e.g., uvx, uv)",
    "Ensure environment variables are properly set",
    "Try increasing the connection timeout value",
];

const TOOL_SUGGESTIONS: &[&str] = &[
    "List the server's tools to check the exact tool name",
    "Verify the MCP server supports this tool",
];

const SESSION_SUGGESTIONS: &[&str] = &[
    "Try restarting the session",
    "Check if the MCP server is still connected",
    "Verify the agent model is available and accessible",
];

const INPUT_SUGGESTIONS: &[&str] = &["Enter a non-empty message"];

const CONFIG_SUGGESTIONS: &[&str] = &[
    "Check the configuration file syntax and structure",
    "Make sure at least one server is configured",
];

impl Error {
    /// Short category label, used as a structured log field
    pub fn category(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::ToolValidation(_) => "tool_validation",
            Error::Session(_) => "session",
            Error::InputValidation(_) => "input_validation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    /// Actionable hints for the user, by error category
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Error::Connection(_) => CONNECTION_SUGGESTIONS,
            Error::ToolValidation(_) => TOOL_SUGGESTIONS,
            Error::Session(_) => SESSION_SUGGESTIONS,
            Error::InputValidation(_) => INPUT_SUGGESTIONS,
            Error::Config(_) => CONFIG_SUGGESTIONS,
            Error::Io(_) => &[],
        }
    }

    /// Message followed by a bulleted suggestion list
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                out.push_str("\n  • ");
                out.push_str(suggestion);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_mentions_attempts_and_cause() {
        let err: Error = ConnectionError::RetriesExhausted {
            server: "files".to_string(),
            attempts: 3,
            last_error: "handshake timed out".to_string(),
        }
        .into();

        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("handshake timed out"));
        assert_eq!(err.category(), "connection");
    }

    #[test]
    fn test_report_lists_suggestions() {
        let err = Error::InputValidation("empty input".to_string());
        let report = err.report();

        assert!(report.starts_with("Invalid input: empty input"));
        assert!(report.contains("Suggestions:"));
        assert!(report.contains("Enter a non-empty message"));
    }

    #[test]
    fn test_io_errors_have_no_suggestions() {
        let err = Error::from(std::io::Error::other("disk"));
        assert_eq!(err.report(), err.to_string());
    }

    #[test]
    fn test_cancelled_start_is_a_session_error() {
        let err = Error::from(SessionError::StartCancelled);
        assert_eq!(err.category(), "session");
        assert!(err.report().contains("Try restarting the session"));
    }

    #[test]
    fn test_timeout_detection() {
        let err = ConnectionError::Timeout {
            server: "slow".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out after 5s"));
    }
}
