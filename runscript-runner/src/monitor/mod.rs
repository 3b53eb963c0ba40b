//! Stage monitor
//!
//! Advances a submitted pipeline through its manual gates:
//!
//! ```text
//! AwaitingPage -> Requesting -> Approving -> Triggered -> Monitoring -> Completed
//!                     |             |            |            |
//!                     +-------------+------------+------------+-> Failed | TimedOut
//! ```
//!
//! The polling stages share one shape: observe, then advance on success,
//! abort on failure, or reload the page and wait before polling again until
//! the attempt ceiling is reached.

mod observe;

pub use observe::{Observation, PageObserver};

use runscript_core::domain::log::{Degradation, LogLevel, TraceEvent};
use runscript_core::domain::run::pipeline_id_from_url;
use runscript_core::domain::stage::{MonitorAttempt, MonitorState, StageStatus};
use tracing::{info, warn};

use crate::config::Config;
use crate::context::RunContext;
use crate::error::{RunError, RunResult};
use crate::selectors::{ACTION_BUTTON, Gate};
use crate::session::{Session, is_enabled, reload_or_renavigate, wait_for, wait_until};

pub struct StageMonitor<'a> {
    session: &'a dyn Session,
    config: &'a Config,
    observer: PageObserver<'a>,
    state: MonitorState,
    /// Id read from the detail URL, used when the execution page links none
    url_pipeline_id: Option<u64>,
}

impl<'a> StageMonitor<'a> {
    pub fn new(session: &'a dyn Session, config: &'a Config) -> Self {
        Self {
            session,
            config,
            observer: PageObserver::new(session, config),
            state: MonitorState::AwaitingPage,
            url_pipeline_id: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Drives the pipeline to a terminal state
    ///
    /// `Ok` means `Completed`; errors map to `Failed` or `TimedOut`.
    pub async fn run(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        let outcome = self.drive(ctx).await;

        let terminal = match &outcome {
            Ok(()) => MonitorState::Completed,
            Err(e) => e.terminal_state(),
        };
        self.transition(ctx, terminal);

        outcome
    }

    async fn drive(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        self.await_page(ctx).await;

        self.transition(ctx, MonitorState::Requesting);
        self.request(ctx).await?;

        self.transition(ctx, MonitorState::Approving);
        self.approve(ctx).await?;

        self.transition(ctx, MonitorState::Triggered);
        self.trigger(ctx).await?;

        self.transition(ctx, MonitorState::Monitoring);
        self.await_completion(ctx).await
    }

    fn transition(&mut self, ctx: &mut RunContext, to: MonitorState) {
        let from = self.state;
        if from == to {
            return;
        }

        let level = match to {
            MonitorState::Failed | MonitorState::TimedOut => LogLevel::Error,
            _ => LogLevel::Info,
        };
        info!(%from, %to, "Stage transition");
        ctx.record(level, TraceEvent::Transition { from, to });
        self.state = to;
    }

    /// Waits for the pipeline detail page; a timeout only degrades
    async fn await_page(&mut self, ctx: &mut RunContext) {
        let session = self.session;
        let config = self.config;
        let timings = &config.timings;

        let reached = wait_until(timings.page_wait, timings.url_poll, || async move {
            session
                .current_url()
                .await
                .map(|url| config.is_pipeline_detail_url(&url))
                .unwrap_or(false)
        })
        .await;

        if reached {
            info!("Pipeline page loaded");
        } else {
            ctx.degrade(Degradation::PageWaitTimedOut {
                expected_prefix: config.pipeline_url_prefix(),
            });
        }
    }

    async fn request(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        let stage = MonitorState::Requesting;
        let timings = &self.config.timings;

        if let Ok(url) = self.session.current_url().await {
            if self.config.is_pipeline_detail_url(&url) {
                self.url_pipeline_id = pipeline_id_from_url(&url);
            }
        }

        let mut attempt = MonitorAttempt::new(timings.request_attempts, timings.request_interval);
        loop {
            let badge = self
                .observer
                .locate_badge(Gate::Request, timings.badge_wait)
                .await
                .ok_or_else(|| {
                    RunError::ElementNotFound(Gate::Request.badge_id(&self.config.stage_suffix))
                })?;

            let observation = self.observer.badge_status(&badge).await;
            record_poll(ctx, stage, &attempt, &observation);

            match observation.status {
                StageStatus::Success => return Ok(()),
                StageStatus::Failed => {
                    return Err(RunError::StageFailedStatus {
                        stage,
                        status: StageStatus::Failed,
                    });
                }
                _ => {}
            }

            if !attempt.record_miss() {
                return Err(RunError::StageTimeout {
                    stage,
                    attempts: attempt.count(),
                });
            }

            self.reload(ctx).await;
            tokio::time::sleep(attempt.interval()).await;
        }
    }

    /// Clicks the approve action once
    ///
    /// A control that is not enabled yet gets one reload and is clicked
    /// regardless; that click may fail without ending the run.
    async fn approve(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        let timings = &self.config.timings;
        let badge = self
            .observer
            .locate_badge(Gate::Approve, timings.badge_wait)
            .await
            .ok_or_else(|| {
                RunError::ElementNotFound(Gate::Approve.badge_id(&self.config.stage_suffix))
            })?;

        tokio::time::sleep(timings.approve_settle).await;

        let button = badge.child(ACTION_BUTTON);
        if !wait_for(self.session, &button, timings.element_wait).await {
            return Err(RunError::ElementNotFound(button.to_string()));
        }

        if is_enabled(self.session, &button).await? {
            self.session.click(&button).await?;
            ctx.log_info("Approve clicked");
            return Ok(());
        }

        ctx.degrade(Degradation::ApproveNotEnabled);
        self.reload(ctx).await;

        match self.session.click(&button).await {
            Ok(()) => ctx.log_info("Approve clicked after reload"),
            Err(e) => ctx.degrade(Degradation::ApproveClickFailed {
                error: e.to_string(),
            }),
        }
        Ok(())
    }

    async fn trigger(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        let timings = &self.config.timings;
        let badge = self
            .observer
            .locate_badge(Gate::RunScript, timings.element_wait)
            .await
            .ok_or_else(|| {
                RunError::ElementNotFound(Gate::RunScript.badge_id(&self.config.stage_suffix))
            })?;

        self.session.click(&badge).await?;
        ctx.log_info("Run stage triggered");

        tokio::time::sleep(timings.run_settle).await;
        Ok(())
    }

    async fn await_completion(&mut self, ctx: &mut RunContext) -> RunResult<()> {
        let stage = MonitorState::Monitoring;
        let timings = &self.config.timings;

        let mut attempt =
            MonitorAttempt::new(timings.completion_attempts, timings.completion_interval);
        loop {
            let observation = self.observer.job_status().await;
            record_poll(ctx, stage, &attempt, &observation);

            match observation.status {
                StageStatus::Success => {
                    self.capture_pipeline_id(ctx).await;
                    return Ok(());
                }
                StageStatus::Failed => {
                    return Err(RunError::StageFailedStatus {
                        stage,
                        status: StageStatus::Failed,
                    });
                }
                _ => {}
            }

            if !attempt.record_miss() {
                return Err(RunError::StageTimeout {
                    stage,
                    attempts: attempt.count(),
                });
            }

            self.reload(ctx).await;
            tokio::time::sleep(attempt.interval()).await;
        }
    }

    async fn capture_pipeline_id(&mut self, ctx: &mut RunContext) {
        match self
            .observer
            .linked_pipeline_id()
            .await
            .or(self.url_pipeline_id)
        {
            Some(id) => ctx.record_pipeline_id(id),
            None => ctx.degrade(Degradation::PipelineIdUnresolved),
        }
    }

    async fn reload(&self, ctx: &mut RunContext) {
        if let Err(e) = reload_or_renavigate(self.session).await {
            warn!("Page could not be refreshed: {}", e);
            ctx.degrade(Degradation::ReloadFailed {
                error: e.to_string(),
            });
        }
    }
}

fn record_poll(
    ctx: &mut RunContext,
    stage: MonitorState,
    attempt: &MonitorAttempt,
    observation: &Observation,
) {
    let number = attempt.count() + 1;
    info!(
        %stage,
        attempt = number,
        limit = attempt.limit(),
        status = %observation.status,
        "Polled {}",
        observation.observed.as_deref().unwrap_or("<missing>")
    );
    ctx.record(
        LogLevel::Info,
        TraceEvent::Poll {
            stage,
            attempt: number,
            limit: attempt.limit(),
            observed: observation.observed.clone(),
            status: observation.status,
        },
    );
}
