//! Run context
//!
//! Holds the state of one pipeline run:
//! - The run id used to correlate log lines
//! - The [`PipelineRun`] being driven
//! - The run trace collecting transitions, polls and soft fallbacks

use runscript_core::domain::log::{Degradation, LogLevel, TraceEntry, TraceEvent};
use runscript_core::domain::run::PipelineRun;
use tracing::{info, warn};
use uuid::Uuid;

/// State owned by the orchestrator for the duration of one run
pub struct RunContext {
    run_id: Uuid,

    /// The run being driven; its pipeline id is filled in by the monitor
    pub run: PipelineRun,

    trace: Vec<TraceEntry>,
}

impl RunContext {
    pub fn new(run_id: Uuid, run: PipelineRun) -> Self {
        Self {
            run_id,
            run,
            trace: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Appends an entry to the run trace
    pub fn record(&mut self, level: LogLevel, event: TraceEvent) {
        self.trace.push(TraceEntry {
            timestamp: chrono::Utc::now(),
            level,
            event,
        });
    }

    /// Records a soft fallback; execution continues
    pub fn degrade(&mut self, degradation: Degradation) {
        warn!(?degradation, "Continuing after soft failure");
        self.record(LogLevel::Warning, TraceEvent::Degraded(degradation));
    }

    /// Logs an informational message to both tracing and the run trace
    pub fn log_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.record(LogLevel::Info, TraceEvent::Message { text });
    }

    /// Stores the pipeline id unless one is already known
    pub fn record_pipeline_id(&mut self, id: u64) {
        if self.run.record_pipeline_id(id) {
            info!(pipeline_id = id, "Pipeline id recorded");
            self.record(LogLevel::Info, TraceEvent::PipelineId { id });
        }
    }

    #[allow(dead_code)]
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Soft fallbacks taken so far, in order
    pub fn degradations(&self) -> Vec<&Degradation> {
        self.trace
            .iter()
            .filter_map(|entry| match &entry.event {
                TraceEvent::Degraded(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Consumes the context, returning the run and its trace
    pub fn into_parts(self) -> (PipelineRun, Vec<TraceEntry>) {
        (self.run, self.trace)
    }
}
