//! Element selectors of the GitLab pipeline pages

use crate::session::Locator;

/// Ref selector dropdown on the new-pipeline page
pub const REF_SELECTOR: &str = ".ref-selector";
pub const REF_SELECTOR_BUTTON: &str = ".ref-selector button";
pub const REF_OPTIONS: &str = ".ref-selector ul li";

/// One row of the CI variable form
pub const VARIABLE_ROW: &str = r#"div[data-testid="ci-variable-row-container"]"#;
pub const VARIABLE_VALUE_FIELD: &str = r#"[data-testid="pipeline-form-ci-variable-value-field"]"#;
pub const VARIABLE_VALUE_DROPDOWN: &str =
    r#"[data-testid="pipeline-form-ci-variable-value-dropdown"]"#;

/// Options of an open listbox; their `data-testid` is `listbox-item-<value>`
pub const LISTBOX_OPTIONS: &str = r#"[role="listbox"] li[data-testid^="listbox-item-"]"#;
pub const LISTBOX_ITEM_PREFIX: &str = "listbox-item-";

pub const RUN_PIPELINE_BUTTON: &str = r#"[data-testid="run-pipeline-button"]"#;

/// Status icon inside a stage badge
pub const CI_ICON: &str = r#"[data-testid="ci-icon"]"#;

/// Manual action button inside a stage badge
pub const ACTION_BUTTON: &str = r#"[data-testid="ci-action-button"]"#;

/// Status icon of the job on the job execution page
pub const JOB_STATUS_ICON: &str = r#".build-job a[data-testid="ci-icon"]"#;

/// Links pointing back to a pipeline page
pub const PIPELINE_LINKS: &str = r#"a[href*="/-/pipelines/"]"#;

/// Every stage badge on a pipeline page
pub const STAGE_BADGES: &str = r#"[id^="ci-badge-"]"#;

pub const SCROLL_TO_FORM_END: &str = "window.scrollTo(0, document.body.scrollHeight - 500);";

/// The three manual gates of the run-script pipeline, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Request,
    Approve,
    RunScript,
}

impl Gate {
    /// Job name prefix of the gate
    pub fn job_prefix(self) -> &'static str {
        match self {
            Gate::Request => "request",
            Gate::Approve => "approve",
            Gate::RunScript => "runscript",
        }
    }

    /// Id of the gate's badge for jobs named `<prefix>_<suffix>`
    pub fn badge_id(self, suffix: &str) -> String {
        format!("ci-badge-{}_{}", self.job_prefix(), suffix)
    }

    pub fn badge(self, suffix: &str) -> Locator {
        Locator::id(&self.badge_id(suffix))
    }

    /// Substring match used when the exact id is not on the page
    pub fn fallback_badge(self) -> Locator {
        Locator::css(format!(r#"[id*="ci-badge-{}"]"#, self.job_prefix()))
    }
}

/// Parameter row `index` of the variable form (zero based)
pub fn variable_row(index: usize) -> Locator {
    Locator::css(VARIABLE_ROW).nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_ids() {
        assert_eq!(Gate::Request.badge_id("prod"), "ci-badge-request_prod");
        assert_eq!(Gate::Approve.badge_id("prod"), "ci-badge-approve_prod");
        assert_eq!(Gate::RunScript.badge_id("uat"), "ci-badge-runscript_uat");
        assert_eq!(
            Gate::RunScript.fallback_badge().to_string(),
            r#"[id*="ci-badge-runscript"]"#
        );
    }
}
