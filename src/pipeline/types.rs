//! Per-message decisions and the run summary.

use std::fmt;

/// Where a draft body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Ai,
    Template,
}

impl fmt::Display for DraftSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ai => write!(f, "AI"),
            Self::Template => write!(f, "template"),
        }
    }
}

/// What the engine did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageAction {
    /// Not relevant. `archived` is true only when the archive call was made
    /// and succeeded.
    Archive { archived: bool },
    /// A reply draft was persisted.
    Draft {
        source: DraftSource,
        draft_id: String,
    },
    /// Needs a response, but a draft already exists on the thread.
    Skip,
    /// Relevant, no response needed.
    Keep,
    /// Abandoned on a per-message error.
    Failed { reason: String },
}

/// Outcome of triaging one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub message_id: String,
    pub is_relevant: bool,
    pub needs_response: bool,
    pub has_existing_draft: bool,
    pub action: TriageAction,
}

impl Decision {
    /// A message skipped on error.
    pub fn failed(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            is_relevant: false,
            needs_response: false,
            has_existing_draft: false,
            action: TriageAction::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Aggregate counters for one run.
///
/// Every processed message lands in exactly one of `kept`, `archived`,
/// `not_relevant`, `drafts_created`, `existing_drafts_skipped` or
/// `skipped_on_error`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u32,
    pub drafts_created: u32,
    pub ai_drafts: u32,
    pub template_drafts: u32,
    pub existing_drafts_skipped: u32,
    pub kept: u32,
    pub archived: u32,
    /// Irrelevant but left in the inbox (reported only, or archive failed).
    pub not_relevant: u32,
    pub skipped_on_error: u32,
    /// Whether the archive line is printed.
    archive_requested: bool,
}

impl RunSummary {
    pub fn new(archive_requested: bool) -> Self {
        Self {
            archive_requested,
            ..Self::default()
        }
    }

    /// Count one decision.
    pub fn record(&mut self, decision: &Decision) {
        self.processed += 1;
        match &decision.action {
            TriageAction::Archive { archived: true } => self.archived += 1,
            TriageAction::Archive { archived: false } => self.not_relevant += 1,
            TriageAction::Draft { source, .. } => {
                self.drafts_created += 1;
                match source {
                    DraftSource::Ai => self.ai_drafts += 1,
                    DraftSource::Template => self.template_drafts += 1,
                }
            }
            TriageAction::Skip => self.existing_drafts_skipped += 1,
            TriageAction::Keep => self.kept += 1,
            TriageAction::Failed { .. } => self.skipped_on_error += 1,
        }
    }

    /// True when the outcome counters add up to `processed`.
    pub fn is_consistent(&self) -> bool {
        self.processed
            == self.kept
                + self.archived
                + self.not_relevant
                + self.drafts_created
                + self.existing_drafts_skipped
                + self.skipped_on_error
            && self.drafts_created == self.ai_drafts + self.template_drafts
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Summary ===")?;
        writeln!(f, "Total processed: {}", self.processed)?;
        writeln!(f, "Drafts created: {}", self.drafts_created)?;
        if self.drafts_created > 0 {
            writeln!(f, "  - AI drafts: {}", self.ai_drafts)?;
            writeln!(f, "  - Template drafts: {}", self.template_drafts)?;
        }
        if self.existing_drafts_skipped > 0 {
            writeln!(f, "Existing drafts found: {}", self.existing_drafts_skipped)?;
        }
        writeln!(f, "Emails kept: {}", self.kept)?;
        if self.archive_requested {
            writeln!(f, "Emails archived: {}", self.archived)?;
        }
        Ok(())
    }
}
