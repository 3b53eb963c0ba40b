//! Run orchestrator
//!
//! Validates the request, attaches a browser session, then sequences the
//! form filler and the stage monitor. The session is closed on every exit
//! path, including an interrupt.

use runscript_core::domain::log::{LogLevel, TraceEntry, TraceEvent};
use runscript_core::domain::run::{Branch, ParseBranchError, PipelineRun};
use runscript_core::domain::stage::MonitorState;
use std::future::Future;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::context::RunContext;
use crate::error::{RunError, RunResult};
use crate::form::FormFiller;
use crate::monitor::{PageObserver, StageMonitor};
use crate::script::read_script;
use crate::session::{Session, Transport};

/// Parameters of one run as given on the command line
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub ticket: String,
    /// Script name, resolved to `<scripts_dir>/<script>.rb`
    pub script: String,
    pub service: String,
    pub branch: String,
}

/// Outcome of one run, with everything collected along the way
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunResult<()>,
    /// `None` when the request was rejected before a run existed
    pub run: Option<PipelineRun>,
    /// Terminal state of the stage monitor, if it ran to one
    pub final_state: Option<MonitorState>,
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn pipeline_id(&self) -> Option<u64> {
        self.run.as_ref().and_then(PipelineRun::pipeline_id)
    }

    fn rejected(run_id: Uuid, error: RunError) -> Self {
        Self {
            run_id,
            outcome: Err(error),
            run: None,
            final_state: None,
            trace: Vec::new(),
        }
    }

    fn finish(ctx: RunContext, outcome: RunResult<()>, final_state: Option<MonitorState>) -> Self {
        let run_id = ctx.run_id();
        let (run, trace) = ctx.into_parts();
        Self {
            run_id,
            outcome,
            run: Some(run),
            final_state,
            trace,
        }
    }
}

pub struct RunOrchestrator {
    config: Config,
    /// Tried in order until one yields a session
    transports: Vec<Box<dyn Transport>>,
}

impl RunOrchestrator {
    pub fn new(config: Config, transports: Vec<Box<dyn Transport>>) -> Self {
        Self { config, transports }
    }

    /// Executes one run
    ///
    /// When `interrupt` completes first the run stops with
    /// [`RunError::Interrupted`] after the session is released.
    pub async fn run<F>(&self, request: RunRequest, interrupt: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        async move {
            let run = match self.prepare(&request).await {
                Ok(run) => run,
                Err(e) => {
                    error!("Rejected run: {}", e);
                    return RunReport::rejected(run_id, e);
                }
            };

            let mut ctx = RunContext::new(run_id, run);
            ctx.log_info(format!(
                "Running '{}' for {} on {}",
                request.script, ctx.run.service_name, ctx.run.branch
            ));

            tokio::pin!(interrupt);

            let attached = tokio::select! {
                result = self.attach() => result,
                _ = &mut interrupt => Err(RunError::Interrupted),
            };
            let mut session = match attached {
                Ok(session) => session,
                Err(e) => {
                    error!("{}", e);
                    return RunReport::finish(ctx, Err(e), None);
                }
            };

            let (outcome, final_state) = {
                let mut monitor = StageMonitor::new(&*session, &self.config);
                let outcome = tokio::select! {
                    result = drive(&*session, &self.config, &mut ctx, &mut monitor) => result,
                    _ = &mut interrupt => Err(RunError::Interrupted),
                };
                let state = settled_state(&outcome, monitor.state());
                (outcome, state)
            };

            match &outcome {
                Ok(()) => {
                    let fallbacks = ctx.degradations().len();
                    if fallbacks > 0 {
                        warn!("Completed after {} soft fallback(s)", fallbacks);
                    }
                    ctx.log_info("Run completed");
                }
                Err(RunError::Interrupted) => {
                    warn!("Run interrupted");
                    ctx.record(
                        LogLevel::Warning,
                        TraceEvent::Message {
                            text: "interrupted".to_string(),
                        },
                    );
                }
                Err(e) => {
                    error!("Run failed: {}", e);
                    ctx.record(
                        LogLevel::Error,
                        TraceEvent::Message {
                            text: e.to_string(),
                        },
                    );
                    let snapshot = PageObserver::new(&*session, &self.config)
                        .snapshot()
                        .await;
                    ctx.record(LogLevel::Error, snapshot);
                }
            }

            if let Err(e) = session.close().await {
                warn!("Failed to close browser session: {}", e);
            }

            RunReport::finish(ctx, outcome, final_state)
        }
        .instrument(span)
        .await
    }

    /// Checks the request and loads the script; no browser is touched
    async fn prepare(&self, request: &RunRequest) -> RunResult<PipelineRun> {
        let required = [
            ("ticket", &request.ticket),
            ("script", &request.script),
            ("service", &request.service),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RunError::InvalidInput(format!("{} is required", name)));
            }
        }

        let script = request.script.trim();
        if script.contains(['/', '\\']) {
            return Err(RunError::InvalidInput(format!(
                "script must be a name, not a path: {}",
                script
            )));
        }

        let branch: Branch = request
            .branch
            .parse()
            .map_err(|e: ParseBranchError| RunError::InvalidInput(e.to_string()))?;

        let body = read_script(&self.config, script).await?;
        Ok(PipelineRun::new(
            branch,
            request.ticket.trim(),
            body,
            request.service.trim(),
        ))
    }

    async fn attach(&self) -> RunResult<Box<dyn Session>> {
        let mut failures = Vec::new();

        for transport in &self.transports {
            match transport.connect().await {
                Ok(session) => {
                    info!("Browser session via {}", transport.name());
                    return Ok(session);
                }
                Err(e) => {
                    warn!("Transport {} unavailable: {}", transport.name(), e);
                    failures.push(format!("{}: {}", transport.name(), e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no transports configured".to_string());
        }
        Err(RunError::NoSession(failures.join("; ")))
    }
}

async fn drive(
    session: &dyn Session,
    config: &Config,
    ctx: &mut RunContext,
    monitor: &mut StageMonitor<'_>,
) -> RunResult<()> {
    let form = FormFiller::new(session, config);
    form.open().await?;

    let branch = ctx.run.branch;
    form.select_branch(ctx, branch).await?;
    form.fill_and_submit(ctx).await?;

    monitor.run(ctx).await
}

/// Terminal state of a run that reached the browser
///
/// Any error other than an interrupt settles the run even when the monitor
/// never started.
fn settled_state(outcome: &RunResult<()>, monitor: MonitorState) -> Option<MonitorState> {
    match outcome {
        _ if monitor.is_terminal() => Some(monitor),
        Ok(()) | Err(RunError::Interrupted) => None,
        Err(e) => Some(e.terminal_state()),
    }
}
