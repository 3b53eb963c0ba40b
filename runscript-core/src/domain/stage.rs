//! Stage status and polling state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Marker carried by a job status icon's accessibility label on success
pub const PASSED_MARKER: &str = "Status: Passed";

/// Marker carried by a job status icon's accessibility label on failure
pub const FAILED_MARKER: &str = "Status: Failed";

/// Observed state of a single stage badge
///
/// A fresh snapshot is produced on every poll; snapshots are never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Unknown,
    Pending,
    Running,
    Success,
    Failed,
}

impl StageStatus {
    /// Classifies the class list of a `ci-icon` element
    ///
    /// Both `ci-icon-variant-*` and `badge-*` class families are recognised.
    /// When several variants are present the most decisive one wins.
    pub fn from_icon_class(class: &str) -> Self {
        let mut status = StageStatus::Unknown;

        for token in class.split_whitespace() {
            let variant = token
                .strip_prefix("ci-icon-variant-")
                .or_else(|| token.strip_prefix("badge-"));
            let Some(variant) = variant else {
                continue;
            };

            let observed = match variant {
                "success" => StageStatus::Success,
                "failed" | "error" | "danger" => StageStatus::Failed,
                "info" | "running" => StageStatus::Running,
                "warning" | "pending" | "neutral" | "created" | "manual" | "scheduled" => {
                    StageStatus::Pending
                }
                _ => continue,
            };

            if observed.rank() > status.rank() {
                status = observed;
            }
        }

        status
    }

    /// Classifies the accessibility label of a job status icon
    pub fn from_aria_label(label: &str) -> Self {
        if label.contains(PASSED_MARKER) {
            StageStatus::Success
        } else if label.contains(FAILED_MARKER) {
            StageStatus::Failed
        } else if label.contains("Status: Running") {
            StageStatus::Running
        } else if label.contains("Status: Pending")
            || label.contains("Status: Created")
            || label.contains("Status: Waiting")
        {
            StageStatus::Pending
        } else {
            StageStatus::Unknown
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            StageStatus::Unknown => 0,
            StageStatus::Pending => 1,
            StageStatus::Running => 2,
            StageStatus::Success => 3,
            StageStatus::Failed => 4,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Unknown => "unknown",
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Bounded attempt counter for one polling stage
///
/// Invariant: `0 <= count <= limit`. Once `count == limit` the stage has
/// timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorAttempt {
    count: u32,
    limit: u32,
    interval: Duration,
}

impl MonitorAttempt {
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self {
            count: 0,
            limit,
            interval,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Records a poll that did not reach a terminal status
    ///
    /// Returns `true` while further attempts remain.
    pub fn record_miss(&mut self) -> bool {
        if self.count < self.limit {
            self.count += 1;
        }
        !self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.limit
    }
}

/// States of the stage monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    AwaitingPage,
    Requesting,
    Approving,
    Triggered,
    Monitoring,
    Completed,
    Failed,
    TimedOut,
}

impl MonitorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MonitorState::Completed | MonitorState::Failed | MonitorState::TimedOut
        )
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorState::AwaitingPage => "awaiting-page",
            MonitorState::Requesting => "requesting",
            MonitorState::Approving => "approving",
            MonitorState::Triggered => "triggered",
            MonitorState::Monitoring => "monitoring",
            MonitorState::Completed => "completed",
            MonitorState::Failed => "failed",
            MonitorState::TimedOut => "timed-out",
        };
        f.write_str(s)
    }
}
