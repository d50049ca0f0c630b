use super::error::{LifecycleError, Result};
use super::state_graph::TransitionRule;
use super::types::{non_blank, IssueReport, IssueType, TransitionMetadata};

/// Checks the conditional issue fields of exceptional transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueReportValidator;

impl IssueReportValidator {
    pub fn new() -> Self {
        Self
    }

    /// Returns the validated report for issue-flagged rules, `None` for the rest.
    /// Issue fields sent with an ordinary transition are ignored.
    pub fn validate(
        &self,
        rule: &TransitionRule,
        metadata: &TransitionMetadata,
    ) -> Result<Option<IssueReport>> {
        if !rule.requires_issue {
            return Ok(None);
        }
        self.parse_report(metadata).map(Some)
    }

    fn parse_report(&self, metadata: &TransitionMetadata) -> Result<IssueReport> {
        let raw_type = non_blank(metadata.issue_type.as_deref()).ok_or_else(|| {
            LifecycleError::validation("issue_type", "an issue type is required")
        })?;
        let issue_type = raw_type
            .parse::<IssueType>()
            .map_err(|e| LifecycleError::validation("issue_type", e.to_string()))?;

        let description = non_blank(metadata.issue_description.as_deref()).ok_or_else(|| {
            LifecycleError::validation("issue_description", "a non-empty description is required")
        })?;

        Ok(IssueReport {
            issue_type,
            description,
        })
    }
}
