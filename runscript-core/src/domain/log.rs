//! Run trace domain types
//!
//! The run tool records what it observed and every soft fallback it took as
//! structured entries, independent of the tracing output on the console.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::stage::{MonitorState, StageStatus};

/// A single entry in the run trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub event: TraceEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// The stage monitor moved between states
    Transition {
        from: MonitorState,
        to: MonitorState,
    },
    /// One poll of a stage
    Poll {
        stage: MonitorState,
        attempt: u32,
        limit: u32,
        observed: Option<String>,
        status: StageStatus,
    },
    /// A soft fallback was taken and execution continued
    Degraded(Degradation),
    /// The ticket label was replaced by a task name found in the script
    LabelDerived { label: String },
    /// A service option was picked in the variable form
    ServiceSelected { option: String },
    /// The pipeline id was recorded
    PipelineId { id: u64 },
    /// Read-only pass over the page after a failure
    Snapshot {
        url: Option<String>,
        title: Option<String>,
        badges: Vec<BadgeSnapshot>,
    },
    Message { text: String },
}

/// Soft fallbacks the run tool may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Degradation {
    /// The pipeline detail page did not appear in time
    PageWaitTimedOut { expected_prefix: String },
    /// No task declaration was found for a `sec` service
    LabelNotExtracted { service: String },
    /// No dropdown option matched the service name
    ServiceOptionMissing {
        service: String,
        fallback_index: usize,
    },
    /// The approve control was not enabled when it was about to be clicked
    ApproveNotEnabled,
    /// Clicking a not-yet-enabled approve control failed
    ApproveClickFailed { error: String },
    /// Both the reload and the re-navigation fallback failed
    ReloadFailed { error: String },
    /// The run completed but no numeric pipeline id could be read
    PipelineIdUnresolved,
}

/// One stage badge as seen by the failure snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeSnapshot {
    pub id: String,
    pub icon_class: Option<String>,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Transition { from, to } => write!(f, "{} -> {}", from, to),
            TraceEvent::Poll {
                stage,
                attempt,
                limit,
                observed,
                status,
            } => write!(
                f,
                "{} poll {}/{}: {} ({})",
                stage,
                attempt,
                limit,
                status,
                observed.as_deref().unwrap_or("no element")
            ),
            TraceEvent::Degraded(degradation) => write!(f, "degraded: {}", degradation),
            TraceEvent::LabelDerived { label } => {
                write!(f, "ticket label taken from script: {}", label)
            }
            TraceEvent::ServiceSelected { option } => write!(f, "service selected: {}", option),
            TraceEvent::PipelineId { id } => write!(f, "pipeline id: {}", id),
            TraceEvent::Snapshot { url, title, badges } => {
                write!(
                    f,
                    "snapshot of {} ({})",
                    url.as_deref().unwrap_or("<unknown url>"),
                    title.as_deref().unwrap_or("<unknown title>")
                )?;
                for badge in badges {
                    write!(
                        f,
                        "; {}={}",
                        badge.id,
                        badge.icon_class.as_deref().unwrap_or("?")
                    )?;
                }
                Ok(())
            }
            TraceEvent::Message { text } => f.write_str(text),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::PageWaitTimedOut { expected_prefix } => {
                write!(f, "pipeline page never matched {}", expected_prefix)
            }
            Degradation::LabelNotExtracted { service } => {
                write!(
                    f,
                    "no task name in script for {}, kept ticket label",
                    service
                )
            }
            Degradation::ServiceOptionMissing {
                service,
                fallback_index,
            } => write!(
                f,
                "no option for {}, picked option {}",
                service, fallback_index
            ),
            Degradation::ApproveNotEnabled => f.write_str("approve button was not enabled"),
            Degradation::ApproveClickFailed { error } => {
                write!(f, "approve click failed: {}", error)
            }
            Degradation::ReloadFailed { error } => write!(f, "reload failed: {}", error),
            Degradation::PipelineIdUnresolved => f.write_str("pipeline id could not be read"),
        }
    }
}
