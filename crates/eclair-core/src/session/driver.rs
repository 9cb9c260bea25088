//! Interactive turn loop
//!
//! Reads turns from an `InputSource`, runs them through a
//! `SessionCoordinator` and hands every event to an `EventSink`. Terminal
//! input and rendering live behind those traits.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::coordinator::SessionCoordinator;
use super::events::StreamEvent;

/// Inputs that end the conversation
pub const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

#[async_trait]
pub trait InputSource: Send {
    /// Next line of user input, `None` at end of input
    async fn next_turn(&mut self) -> Option<String>;
}

pub trait EventSink: Send {
    fn on_event(&mut self, event: &StreamEvent);

    /// Called after the last event of each turn
    fn on_turn_end(&mut self, _coordinator: &SessionCoordinator) {}
}

/// Why a conversation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationOutcome {
    EndOfInput,
    Exit,
    Interrupted,
}

/// Drive turns until input ends, the user exits, or `cancel` fires.
///
/// The session is ended on every exit path.
pub async fn run_conversation(
    coordinator: &SessionCoordinator,
    input: &mut dyn InputSource,
    sink: &mut dyn EventSink,
    cancel: CancellationToken,
) -> ConversationOutcome {
    let outcome = loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break ConversationOutcome::Interrupted,
            line = input.next_turn() => line,
        };

        let Some(line) = line else {
            break ConversationOutcome::EndOfInput;
        };

        if is_exit_command(&line) {
            break ConversationOutcome::Exit;
        }

        let mut events = coordinator.process_input(&line);
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => None,
                event = events.next() => event,
            };
            match event {
                Some(event) => sink.on_event(&event),
                None => break,
            }
        }

        if cancel.is_cancelled() {
            break ConversationOutcome::Interrupted;
        }
        sink.on_turn_end(coordinator);
    };

    info!(outcome = ?outcome, "Conversation finished");
    coordinator.end_session();
    outcome
}

fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    let exit = EXIT_COMMANDS.iter().any(|cmd| line.eq_ignore_ascii_case(cmd));
    if exit {
        debug!(command = %line, "Exit requested");
    }
    exit
}
