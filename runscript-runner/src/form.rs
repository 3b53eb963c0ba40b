//! New-pipeline form
//!
//! Selects the ref, fills the three CI variables and submits:
//! 1. ticket label (replaced by the script's task name for `sec` services)
//! 2. service dropdown
//! 3. script body

use regex::Regex;
use runscript_core::domain::log::{Degradation, LogLevel, TraceEvent};
use runscript_core::domain::run::Branch;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::RunContext;
use crate::error::{RunError, RunResult};
use crate::selectors::{
    LISTBOX_ITEM_PREFIX, LISTBOX_OPTIONS, REF_OPTIONS, REF_SELECTOR, REF_SELECTOR_BUTTON,
    RUN_PIPELINE_BUTTON, SCROLL_TO_FORM_END, VARIABLE_ROW, VARIABLE_VALUE_DROPDOWN,
    VARIABLE_VALUE_FIELD, variable_row,
};
use crate::session::{
    DEFAULT_POLL, Locator, Session, is_enabled, reload_or_renavigate, wait_for, wait_until,
};

/// Number of CI variable rows the form must offer
pub const EXPECTED_CONTAINERS: usize = 3;

/// Option picked when no service option matches
pub const DEFAULT_SERVICE_OPTION: usize = 4;

/// Tries at selecting the ref before giving up
const BRANCH_ATTEMPTS: u32 = 3;

static TASK_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"task\s+([a-zA-Z0-9_]+)\s*:\s*:environment\s+do").expect("valid task regex")
});

/// Name of the first `task NAME: :environment do` declaration in a script
pub fn task_name(script: &str) -> Option<&str> {
    TASK_DECLARATION
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Where the ticket label of a run comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// Used as supplied
    Supplied,
    /// Replaced by the task name declared in the script
    Derived(String),
    /// A replacement was wanted but the script declares no task
    NotFound,
}

/// Decides the label source for a service and script
///
/// Only services whose name contains `sec` (any case) take the label from
/// the script.
pub fn label_source(service: &str, script: &str) -> LabelSource {
    if !service.to_lowercase().contains("sec") {
        return LabelSource::Supplied;
    }

    match task_name(script) {
        Some(name) => LabelSource::Derived(name.to_string()),
        None => LabelSource::NotFound,
    }
}

/// Label that ends up in the first form row
pub fn effective_label(ticket: &str, service: &str, script: &str) -> String {
    match label_source(service, script) {
        LabelSource::Derived(name) => name,
        LabelSource::Supplied | LabelSource::NotFound => ticket.to_string(),
    }
}

/// Drives the new-pipeline form
pub struct FormFiller<'a> {
    session: &'a dyn Session,
    config: &'a Config,
}

impl<'a> FormFiller<'a> {
    pub fn new(session: &'a dyn Session, config: &'a Config) -> Self {
        Self { session, config }
    }

    /// Opens the new-pipeline page and waits for the ref selector
    pub async fn open(&self) -> RunResult<()> {
        let url = self.config.new_pipeline_url();
        info!("Opening {}", url);
        self.session.navigate(&url).await?;

        let selector = Locator::css(REF_SELECTOR);
        if !wait_for(self.session, &selector, self.config.timings.element_wait).await {
            return Err(RunError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    /// Picks `branch` in the ref selector, reloading between failed tries
    pub async fn select_branch(&self, ctx: &mut RunContext, branch: Branch) -> RunResult<()> {
        let option = Locator::css(REF_OPTIONS).nth(branch.option_index());

        for attempt in 1..=BRANCH_ATTEMPTS {
            match self.try_select(&option).await {
                Ok(()) => {
                    ctx.log_info(format!("Selected branch {}", branch));
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Branch selection failed (attempt {}/{}): {}",
                        attempt, BRANCH_ATTEMPTS, e
                    );
                    if attempt < BRANCH_ATTEMPTS {
                        if let Err(e) = reload_or_renavigate(self.session).await {
                            ctx.degrade(Degradation::ReloadFailed {
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        Err(RunError::ElementNotFound(option.to_string()))
    }

    async fn try_select(&self, option: &Locator) -> RunResult<()> {
        let timings = &self.config.timings;
        let button = Locator::css(REF_SELECTOR_BUTTON);
        if !wait_for(self.session, &button, timings.element_wait).await {
            return Err(RunError::ElementNotFound(button.to_string()));
        }
        self.session.click(&button).await?;
        tokio::time::sleep(timings.ui_settle).await;

        if !wait_for(self.session, option, timings.element_wait).await {
            return Err(RunError::ElementNotFound(option.to_string()));
        }
        self.session.click(option).await?;
        tokio::time::sleep(timings.ui_settle).await;
        Ok(())
    }

    /// Fills the three variable rows and submits the form
    pub async fn fill_and_submit(&self, ctx: &mut RunContext) -> RunResult<()> {
        let timings = &self.config.timings;

        let rows = Locator::css(VARIABLE_ROW);
        let session = self.session;
        let rows_ref = &rows;
        wait_until(timings.element_wait, DEFAULT_POLL, || async move {
            session.count(rows_ref).await.unwrap_or(0) >= EXPECTED_CONTAINERS
        })
        .await;
        let found = self.session.count(&rows).await?;
        if found < EXPECTED_CONTAINERS {
            return Err(RunError::MissingContainer {
                expected: EXPECTED_CONTAINERS,
                found,
            });
        }

        self.apply_label(ctx);
        self.session
            .fill(
                &variable_row(0).child(VARIABLE_VALUE_FIELD),
                &ctx.run.ticket_label,
            )
            .await?;

        self.select_service(ctx).await?;

        self.session
            .fill(
                &variable_row(2).child(VARIABLE_VALUE_FIELD),
                &ctx.run.script_body,
            )
            .await?;

        self.session.execute(SCROLL_TO_FORM_END).await?;
        tokio::time::sleep(timings.ui_settle).await;

        self.submit().await?;
        ctx.log_info("Pipeline submitted");
        Ok(())
    }

    fn apply_label(&self, ctx: &mut RunContext) {
        match label_source(&ctx.run.service_name, &ctx.run.script_body) {
            LabelSource::Supplied => {}
            LabelSource::Derived(label) => {
                info!("Using task name '{}' as ticket label", label);
                ctx.run.ticket_label = label.clone();
                ctx.record(LogLevel::Info, TraceEvent::LabelDerived { label });
            }
            LabelSource::NotFound => {
                let service = ctx.run.service_name.clone();
                ctx.degrade(Degradation::LabelNotExtracted { service });
            }
        }
    }

    async fn select_service(&self, ctx: &mut RunContext) -> RunResult<()> {
        let timings = &self.config.timings;
        let dropdown = variable_row(1).child(VARIABLE_VALUE_DROPDOWN);
        self.session.click(&dropdown).await?;
        tokio::time::sleep(timings.ui_settle).await;

        let options = Locator::css(LISTBOX_OPTIONS);
        wait_for(self.session, &options, timings.element_wait).await;
        let test_ids = self.session.attributes(&options, "data-testid").await?;

        let wanted = ctx.run.service_name.to_lowercase();
        let matched = test_ids.iter().enumerate().find_map(|(index, id)| {
            id.as_deref()
                .filter(|id| id.to_lowercase().contains(&wanted))
                .map(|id| (index, id.to_string()))
        });

        match matched {
            Some((index, test_id)) => {
                self.session.click(&options.clone().nth(index)).await?;
                let option = test_id
                    .strip_prefix(LISTBOX_ITEM_PREFIX)
                    .unwrap_or(&test_id)
                    .to_string();
                info!("Selected service '{}'", option);
                ctx.record(LogLevel::Info, TraceEvent::ServiceSelected { option });
            }
            None => {
                ctx.degrade(Degradation::ServiceOptionMissing {
                    service: ctx.run.service_name.clone(),
                    fallback_index: DEFAULT_SERVICE_OPTION,
                });
                if let Err(e) = self
                    .session
                    .click(&options.nth(DEFAULT_SERVICE_OPTION))
                    .await
                {
                    warn!("Could not select the default service option: {}", e);
                }
            }
        }

        tokio::time::sleep(timings.ui_settle).await;
        Ok(())
    }

    async fn submit(&self) -> RunResult<()> {
        let button = Locator::css(RUN_PIPELINE_BUTTON);
        let session = self.session;
        let target = &button;
        let clickable = wait_until(self.config.timings.element_wait, DEFAULT_POLL, || async move {
            is_enabled(session, target).await.unwrap_or(false)
        })
        .await;
        if !clickable {
            return Err(RunError::SubmitUnavailable);
        }

        self.session.click(&button).await.map_err(|e| {
            warn!("Clicking the run pipeline button failed: {}", e);
            RunError::SubmitUnavailable
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::scripted::{Element, Frame, ScriptedSession};
    use runscript_core::domain::run::PipelineRun;
    use uuid::Uuid;

    const FORM_URL: &str = "https://gitlab.test/group/tool/-/pipelines/new";

    fn config() -> Config {
        Config::new("https://gitlab.test", "group/tool")
    }

    fn context(ticket: &str, service: &str, script: &str) -> RunContext {
        RunContext::new(
            Uuid::new_v4(),
            PipelineRun::new(Branch::Production, ticket, script, service),
        )
    }

    fn service_option(name: &str) -> Element {
        let testid = format!("{}{}", LISTBOX_ITEM_PREFIX, name);
        Element::new().attr("data-testid", &testid)
    }

    fn form_frame(rows: usize) -> Frame {
        Frame::new()
            .with(&Locator::css(VARIABLE_ROW), vec![Element::new(); rows])
            .with(
                &variable_row(0).child(VARIABLE_VALUE_FIELD),
                vec![Element::new()],
            )
            .with(
                &variable_row(1).child(VARIABLE_VALUE_DROPDOWN),
                vec![Element::new()],
            )
            .with(
                &variable_row(2).child(VARIABLE_VALUE_FIELD),
                vec![Element::new()],
            )
            .with(
                &Locator::css(LISTBOX_OPTIONS),
                vec![
                    service_option("ejar3-auth"),
                    service_option("ejar3-contracts"),
                    service_option("ejar3-core-app"),
                    service_option("ejar3-payments"),
                    service_option("ejar3-default"),
                    service_option("ejar3-sec-deposit"),
                ],
            )
            .with(&Locator::css(RUN_PIPELINE_BUTTON), vec![Element::new()])
    }

    #[test]
    fn test_task_name_extraction() {
        let script = "namespace :ops do\n  task fix_contracts: :environment do\n    puts 1\n  end\nend";
        assert_eq!(task_name(script), Some("fix_contracts"));
        assert_eq!(
            task_name("task  spaced_name :  :environment   do"),
            Some("spaced_name")
        );
        assert_eq!(task_name("puts 'no task here'"), None);
    }

    #[test]
    fn test_label_unchanged_without_sec() {
        let script = "task fix_contracts: :environment do\nend";
        for service in ["ejar3-core-app", "payments", ""] {
            assert_eq!(effective_label("ES-1", service, script), "ES-1");
            assert_eq!(label_source(service, script), LabelSource::Supplied);
        }
    }

    #[test]
    fn test_label_derived_for_sec_services() {
        let script = "task fix_contracts: :environment do\n...\nend";
        for service in ["ejar3-sec", "EJAR3-SEC-deposit", "security"] {
            assert_eq!(effective_label("ES-1", service, script), "fix_contracts");
        }
        assert_eq!(label_source("ejar3-sec", "puts 1"), LabelSource::NotFound);
        assert_eq!(effective_label("ES-1", "ejar3-sec", "puts 1"), "ES-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_and_submit_matches_service() {
        let session = ScriptedSession::new(FORM_URL, vec![form_frame(3)]);
        let config = config();
        let mut ctx = context("ES-1", "ejar3-core-app", "puts 'noop'");

        FormFiller::new(&session, &config)
            .fill_and_submit(&mut ctx)
            .await
            .unwrap();

        let state = session.state();
        assert_eq!(state.fills[0].1, "ES-1");
        assert_eq!(state.fills[1].1, "puts 'noop'");
        let option = Locator::css(LISTBOX_OPTIONS).nth(2).to_string();
        assert!(state.clicks.contains(&option));
        assert_eq!(state.clicks.last(), Some(&RUN_PIPELINE_BUTTON.to_string()));
        assert_eq!(state.scripts, vec![SCROLL_TO_FORM_END.to_string()]);
        assert!(ctx.degradations().is_empty());
        assert!(ctx.trace().iter().any(|e| e.event
            == TraceEvent::ServiceSelected {
                option: "ejar3-core-app".to_string()
            }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sec_service_uses_task_name() {
        let session = ScriptedSession::new(FORM_URL, vec![form_frame(3)]);
        let config = config();
        let mut ctx = context(
            "ES-2",
            "ejar3-sec",
            "task fix_contracts: :environment do\n  puts 1\nend",
        );

        FormFiller::new(&session, &config)
            .fill_and_submit(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.run.ticket_label, "fix_contracts");
        assert_eq!(session.state().fills[0].1, "fix_contracts");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_service_falls_back_to_fifth_option() {
        let session = ScriptedSession::new(FORM_URL, vec![form_frame(3)]);
        let config = config();
        let mut ctx = context("ES-3", "unknown-service", "puts 1");

        FormFiller::new(&session, &config)
            .fill_and_submit(&mut ctx)
            .await
            .unwrap();

        assert!(session
            .state()
            .clicks
            .contains(&Locator::css(LISTBOX_OPTIONS).nth(4).to_string()));
        assert_eq!(
            ctx.degradations(),
            vec![&Degradation::ServiceOptionMissing {
                service: "unknown-service".to_string(),
                fallback_index: 4,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container() {
        let session = ScriptedSession::new(FORM_URL, vec![form_frame(2)]);
        let config = config();
        let mut ctx = context("ES-1", "ejar3-core-app", "puts 1");

        let result = FormFiller::new(&session, &config)
            .fill_and_submit(&mut ctx)
            .await;
        assert!(matches!(
            result,
            Err(RunError::MissingContainer {
                expected: 3,
                found: 2
            })
        ));
        assert!(session.state().fills.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_submit_is_unavailable() {
        let frame = form_frame(3).with(
            &Locator::css(RUN_PIPELINE_BUTTON),
            vec![Element::new().attr("disabled", "disabled")],
        );
        let session = ScriptedSession::new(FORM_URL, vec![frame]);
        let config = config();
        let mut ctx = context("ES-1", "ejar3-core-app", "puts 1");

        let result = FormFiller::new(&session, &config)
            .fill_and_submit(&mut ctx)
            .await;
        assert!(matches!(result, Err(RunError::SubmitUnavailable)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_branch_clicks_fixed_index() {
        let ref_frame = Frame::new()
            .with(&Locator::css(REF_SELECTOR), vec![Element::new()])
            .with(&Locator::css(REF_SELECTOR_BUTTON), vec![Element::new()])
            .with(&Locator::css(REF_OPTIONS), vec![Element::new(); 8]);
        let session = ScriptedSession::new("about:blank", vec![ref_frame]);
        let config = config();
        let mut ctx = context("ES-1", "ejar3-core-app", "puts 1");

        let filler = FormFiller::new(&session, &config);
        filler.open().await.unwrap();
        filler.select_branch(&mut ctx, Branch::Uat).await.unwrap();

        let state = session.state();
        assert_eq!(state.url, FORM_URL);
        assert_eq!(
            state.clicks.last(),
            Some(&Locator::css(REF_OPTIONS).nth(7).to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_branch_gives_up_after_retries() {
        let ref_frame = Frame::new()
            .with(&Locator::css(REF_SELECTOR), vec![Element::new()])
            .with(&Locator::css(REF_SELECTOR_BUTTON), vec![Element::new()])
            .with(&Locator::css(REF_OPTIONS), vec![Element::new(); 3]);
        let session = ScriptedSession::new(FORM_URL, vec![ref_frame]);
        let config = config();
        let mut ctx = context("ES-1", "ejar3-core-app", "puts 1");

        let result = FormFiller::new(&session, &config)
            .select_branch(&mut ctx, Branch::Production)
            .await;

        assert!(matches!(result, Err(RunError::ElementNotFound(_))));
        assert_eq!(session.state().reloads, 2);
    }
}
