//! Per-session usage statistics

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, Span};

use super::events::{EventKind, StreamEvent};

/// Number of executions reported by `summary()`
pub const RECENT_EXECUTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executing,
    Completed,
}

/// One observed tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// `<name>#<occurrence>`
    pub key: String,
    pub name: String,
    pub arguments: Map<String, Value>,
    pub result: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostUsed {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_calls: u64,
    pub unique_names: usize,
    pub most_used: Option<MostUsed>,
    pub recent_executions: Vec<ExecutionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub session_duration_seconds: f64,
    pub total_events_processed: u64,
    pub per_name_counts: BTreeMap<String, u64>,
    pub unique_names: usize,
    pub response_length: usize,
    pub execution_count: usize,
}

#[derive(Debug)]
struct UsageInner {
    started: Instant,
    events_processed: u64,
    response: String,
    counts: HashMap<String, u64>,
    /// First-seen order of names, for stable tie-breaking
    order: Vec<String>,
    executions: Vec<ExecutionRecord>,
}

impl UsageInner {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            events_processed: 0,
            response: String::new(),
            counts: HashMap::new(),
            order: Vec::new(),
            executions: Vec::new(),
        }
    }
}

/// Accumulates statistics from the events of a session
#[derive(Debug)]
pub struct UsageTracker {
    inner: Mutex<UsageInner>,
    span: Span,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(UsageInner::new()),
            span: tracing::debug_span!("usage"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn record(&self, event: &StreamEvent) {
        let mut inner = self.inner.lock();
        inner.events_processed += 1;

        match &event.kind {
            EventKind::Text { content } => inner.response.push_str(content),
            EventKind::ToolUse {
                name,
                arguments,
                result,
            } => {
                let count = match inner.counts.get_mut(name) {
                    Some(count) => {
                        *count += 1;
                        *count
                    }
                    None => {
                        inner.counts.insert(name.clone(), 1);
                        inner.order.push(name.clone());
                        1
                    }
                };

                let record = ExecutionRecord {
                    key: format!("{}#{}", name, count),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    result: result.clone(),
                    timestamp: Utc::now(),
                    status: if result.is_some() {
                        ExecutionStatus::Completed
                    } else {
                        ExecutionStatus::Executing
                    },
                };

                trace!(
                    parent: &self.span,
                    key = %record.key,
                    status = ?record.status,
                    "Recorded tool use"
                );

                match inner.executions.iter_mut().find(|r| r.key == record.key) {
                    Some(existing) => *existing = record,
                    None => inner.executions.push(record),
                }
            }
            _ => {}
        }
    }

    pub fn summary(&self) -> UsageSummary {
        let inner = self.inner.lock();

        // Highest count wins; ties go to the name seen first
        let most_used = inner
            .order
            .iter()
            .filter_map(|name| inner.counts.get(name).map(|count| (name, *count)))
            .fold(None::<MostUsed>, |best, (name, count)| match best {
                Some(best) if best.count >= count => Some(best),
                _ => Some(MostUsed {
                    name: name.clone(),
                    count,
                }),
            });

        let skip = inner.executions.len().saturating_sub(RECENT_EXECUTIONS);

        UsageSummary {
            total_calls: inner.counts.values().sum(),
            unique_names: inner.counts.len(),
            most_used,
            recent_executions: inner.executions[skip..].to_vec(),
        }
    }

    pub fn stats(&self) -> UsageStats {
        let inner = self.inner.lock();

        UsageStats {
            session_duration_seconds: inner.started.elapsed().as_secs_f64(),
            total_events_processed: inner.events_processed,
            per_name_counts: inner
                .counts
                .iter()
                .map(|(name, count)| (name.clone(), *count))
                .collect(),
            unique_names: inner.counts.len(),
            response_length: inner.response.chars().count(),
            execution_count: inner.executions.len(),
        }
    }

    /// Accumulated response text
    pub fn response_text(&self) -> String {
        self.inner.lock().response.clone()
    }

    /// Clear everything and restart the session clock
    pub fn reset(&self) {
        *self.inner.lock() = UsageInner::new();
    }
}
