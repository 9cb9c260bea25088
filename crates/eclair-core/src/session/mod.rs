//! Session module
//!
//! - `SessionCoordinator`: start/stop lifecycle and turn processing
//! - `normalize`: raw engine events to `StreamEvent`s
//! - `UsageTracker`: per-session statistics
//! - `run_conversation`: the interactive loop over an input source and sink

mod coordinator;
mod driver;
mod engine;
mod events;
mod usage;

pub use coordinator::{
    validate_input, SessionCoordinator, SessionInfo, SessionState, TurnStream,
    NOT_ACTIVE_MESSAGE,
};
pub use driver::{run_conversation, ConversationOutcome, EventSink, InputSource, EXIT_COMMANDS};
pub use engine::{EngineConfig, EngineFactory, ReasoningEngine};
pub use events::{
    normalize, EventConversionError, EventKind, RawEvent, StreamEvent, COMPLETE_MESSAGE,
    EMPTY_INPUT_MESSAGE, STATUS_PROCESSING,
};
pub use usage::{
    ExecutionRecord, ExecutionStatus, MostUsed, UsageStats, UsageSummary, UsageTracker,
    RECENT_EXECUTIONS,
};
