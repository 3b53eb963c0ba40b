//! Reads stage state off the pipeline pages
//!
//! The monitor only asks for observations; how they are obtained (DOM
//! polling here) stays behind [`PageObserver`].

use runscript_core::domain::log::{BadgeSnapshot, TraceEvent};
use runscript_core::domain::run::pipeline_id_from_url;
use runscript_core::domain::stage::StageStatus;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::selectors::{CI_ICON, Gate, JOB_STATUS_ICON, PIPELINE_LINKS, STAGE_BADGES};
use crate::session::{Locator, Session, wait_for};

/// One poll's reading: the raw attribute and its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub observed: Option<String>,
    pub status: StageStatus,
}

impl Observation {
    fn missing() -> Self {
        Self {
            observed: None,
            status: StageStatus::Unknown,
        }
    }
}

pub struct PageObserver<'a> {
    session: &'a dyn Session,
    config: &'a Config,
}

impl<'a> PageObserver<'a> {
    pub fn new(session: &'a dyn Session, config: &'a Config) -> Self {
        Self { session, config }
    }

    /// Locates a gate's badge by id, then by the substring fallback
    pub async fn locate_badge(&self, gate: Gate, primary_wait: Duration) -> Option<Locator> {
        let primary = gate.badge(&self.config.stage_suffix);
        if wait_for(self.session, &primary, primary_wait).await {
            return Some(primary);
        }

        debug!("Badge {} not found, trying fallback", primary);
        let fallback = gate.fallback_badge();
        let fallback_wait = self.config.timings.badge_fallback_wait;
        if wait_for(self.session, &fallback, fallback_wait).await {
            info!("Using fallback badge {}", fallback);
            return Some(fallback);
        }

        None
    }

    /// Status of the icon inside a badge, read from its class list
    pub async fn badge_status(&self, badge: &Locator) -> Observation {
        let icon = badge.clone().child(CI_ICON);
        match self.session.attribute(&icon, "class").await {
            Ok(class) => Observation {
                status: class
                    .as_deref()
                    .map(StageStatus::from_icon_class)
                    .unwrap_or(StageStatus::Unknown),
                observed: class,
            },
            Err(e) => {
                debug!("Could not read {}: {}", icon, e);
                Observation::missing()
            }
        }
    }

    /// Status of the job on the execution page, read from its aria label
    pub async fn job_status(&self) -> Observation {
        let icon = Locator::css(JOB_STATUS_ICON);
        match self.session.attribute(&icon, "aria-label").await {
            Ok(label) => Observation {
                status: label
                    .as_deref()
                    .map(StageStatus::from_aria_label)
                    .unwrap_or(StageStatus::Unknown),
                observed: label,
            },
            Err(e) => {
                debug!("Job status icon not available: {}", e);
                Observation::missing()
            }
        }
    }

    /// First numeric pipeline id linked from the current page
    pub async fn linked_pipeline_id(&self) -> Option<u64> {
        let hrefs = self
            .session
            .attributes(&Locator::css(PIPELINE_LINKS), "href")
            .await
            .ok()?;

        hrefs
            .iter()
            .flatten()
            .find_map(|href| pipeline_id_from_url(href))
    }

    /// Read-only pass over the page; never fails
    pub async fn snapshot(&self) -> TraceEvent {
        let url = self.session.current_url().await.ok();
        let title = self.session.title().await.ok();

        let ids = self
            .session
            .attributes(&Locator::css(STAGE_BADGES), "id")
            .await
            .unwrap_or_default();

        let mut badges = Vec::new();
        for id in ids.into_iter().flatten() {
            let icon = Locator::id(&id).child(CI_ICON);
            let icon_class = self.session.attribute(&icon, "class").await.ok().flatten();
            badges.push(BadgeSnapshot { id, icon_class });
        }

        TraceEvent::Snapshot { url, title, badges }
    }
}
