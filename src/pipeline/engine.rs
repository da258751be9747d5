//! Triage engine: one pass over recent inbox messages.
//!
//! For each message, in fetch order:
//! 1. Load metadata (failure skips the message)
//! 2. Relevance: rules, then classifier. No classifier or filtering off
//!    means relevant.
//! 3. Not relevant → archive (if enabled) or report
//! 4. Relevant → response-need check (auto-draft with a classifier only)
//! 5. Needs response → skip if the thread already has a draft, else save an
//!    AI reply, falling back to the template
//! 6. Otherwise keep
//!
//! Each message causes at most one mutating mailbox call.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{MailError, PipelineError};
use crate::mail::{DraftRequest, Mailbox, MessageMeta};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::editor::DraftEditor;
use crate::pipeline::prompts::{Prompts, reply_user_prompt};
use crate::pipeline::rules::RelevanceRules;
use crate::pipeline::types::{Decision, DraftSource, RunSummary, TriageAction};

/// Progress sink for the per-message report lines.
pub type Report<'a> = &'a mut (dyn Write + Send);

/// Drives one triage run against a mailbox.
pub struct TriageEngine {
    mailbox: Arc<dyn Mailbox>,
    prompts: Arc<Prompts>,
    config: EngineConfig,
    classifier: Option<Arc<dyn Classifier>>,
    rules: RelevanceRules,
    editor: Option<Arc<dyn DraftEditor>>,
}

impl TriageEngine {
    /// An engine without a classifier: every message is kept.
    pub fn new(mailbox: Arc<dyn Mailbox>, prompts: Arc<Prompts>, config: EngineConfig) -> Self {
        Self {
            mailbox,
            prompts,
            config,
            classifier: None,
            rules: RelevanceRules::empty(),
            editor: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_rules(mut self, rules: RelevanceRules) -> Self {
        self.rules = rules;
        self
    }

    /// Review every draft body in `editor` before saving it.
    pub fn with_editor(mut self, editor: Arc<dyn DraftEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Triage recent inbox messages, writing progress lines to `out`.
    ///
    /// Only a failure to list messages ends the run early.
    pub async fn run(&self, out: Report<'_>) -> Result<RunSummary, MailError> {
        let mut summary = RunSummary::new(self.config.archive_irrelevant);

        let ids = self
            .mailbox
            .list_recent(self.config.window_days, self.config.max_messages)
            .await?;

        if ids.is_empty() {
            say(out, format_args!("No recent messages found."));
            return Ok(summary);
        }

        info!(
            count = ids.len(),
            window_days = self.config.window_days,
            classifier = self.classifier.is_some(),
            "Triaging recent messages"
        );
        say(
            out,
            format_args!("Found {} recent messages. Processing emails...", ids.len()),
        );

        for (index, id) in ids.iter().enumerate() {
            let position = index + 1;
            let decision = match self.triage_one(position, id, out).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping message");
                    match &e {
                        PipelineError::Metadata(_) => say(
                            out,
                            format_args!(
                                "Skipping message {position} (processed {position} total): failed to load metadata."
                            ),
                        ),
                        _ => say(
                            out,
                            format_args!(
                                "Message {position} (processed {position} total): {e} - skipping"
                            ),
                        ),
                    }
                    Decision::failed(id.as_str(), e.to_string())
                }
            };
            debug!(id = %id, action = ?decision.action, "Message triaged");
            summary.record(&decision);
        }

        debug_assert!(summary.is_consistent());
        info!(
            processed = summary.processed,
            drafts = summary.drafts_created,
            kept = summary.kept,
            archived = summary.archived,
            errors = summary.skipped_on_error,
            "Triage run complete"
        );
        Ok(summary)
    }

    async fn triage_one(
        &self,
        position: usize,
        id: &str,
        out: Report<'_>,
    ) -> Result<Decision, PipelineError> {
        let message = self
            .mailbox
            .get_metadata(id)
            .await
            .map_err(PipelineError::Metadata)?;

        debug!(id = %message.id, sender = %message.sender.raw, subject = %message.subject, "Loaded message");

        let is_relevant = self.check_relevance(&message).await?;
        if !is_relevant {
            say(
                out,
                format_args!(
                    "Message {position} (processed {position} total): not relevant - archiving"
                ),
            );
            let archived = self.config.archive_irrelevant && self.archive(position, &message, out).await;
            return Ok(Decision {
                message_id: message.id,
                is_relevant,
                needs_response: false,
                has_existing_draft: false,
                action: TriageAction::Archive { archived },
            });
        }

        let needs_response = self.check_response_need(&message).await?;
        if !needs_response {
            say(
                out,
                format_args!(
                    "Message {position} (processed {position} total): important but no response needed - keeping in inbox"
                ),
            );
            return Ok(Decision {
                message_id: message.id,
                is_relevant,
                needs_response,
                has_existing_draft: false,
                action: TriageAction::Keep,
            });
        }

        if self.has_existing_draft(&message).await {
            say(
                out,
                format_args!(
                    "Message {position} (processed {position} total): needs response - existing draft found, skipping"
                ),
            );
            return Ok(Decision {
                message_id: message.id,
                is_relevant,
                needs_response,
                has_existing_draft: true,
                action: TriageAction::Skip,
            });
        }

        let (body, source) = self.compose_reply(position, &message, out).await;
        let body = self.review(&message, body).await;

        let draft_id = self
            .mailbox
            .create_draft(&DraftRequest::reply_to(&message, body))
            .await
            .map_err(PipelineError::DraftCreation)?;

        info!(id = %message.id, draft_id = %draft_id, source = %source, "Draft created");
        say(
            out,
            format_args!(
                "Message {position} (processed {position} total): needs response - {source} draft created"
            ),
        );
        say(out, format_args!("  → Draft saved (ID: {draft_id})"));

        Ok(Decision {
            message_id: message.id,
            is_relevant,
            needs_response,
            has_existing_draft: false,
            action: TriageAction::Draft { source, draft_id },
        })
    }

    /// Rules first, then the classifier. Fail-open when there is no
    /// classifier or filtering is off.
    async fn check_relevance(&self, message: &MessageMeta) -> Result<bool, PipelineError> {
        if !self.config.filter_relevance {
            return Ok(true);
        }
        let Some(classifier) = &self.classifier else {
            return Ok(true);
        };

        if let Some(verdict) = self.rules.evaluate(message) {
            debug!(id = %message.id, reason = verdict.reason(), "Relevance decided by rule");
            return Ok(verdict.is_relevant());
        }

        classifier
            .classify(&self.prompts.relevance_system, message.classification_text())
            .await
            .map_err(|source| PipelineError::Classifier {
                stage: "relevance",
                source,
            })
    }

    async fn check_response_need(&self, message: &MessageMeta) -> Result<bool, PipelineError> {
        if !self.config.auto_draft {
            return Ok(false);
        }
        let Some(classifier) = &self.classifier else {
            return Ok(false);
        };

        classifier
            .classify(&self.prompts.response_system, message.classification_text())
            .await
            .map_err(|source| PipelineError::Classifier {
                stage: "response",
                source,
            })
    }

    /// Best-effort. Returns whether the message left the inbox.
    async fn archive(&self, position: usize, message: &MessageMeta, out: Report<'_>) -> bool {
        match self.mailbox.archive(&message.id).await {
            Ok(()) => {
                info!(id = %message.id, "Archived message");
                say(out, format_args!("  → Archived message {position}"));
                true
            }
            Err(e) => {
                warn!(id = %message.id, error = %e, "Failed to archive message");
                say(out, format_args!("  → Failed to archive message {position}"));
                false
            }
        }
    }

    /// Scans every draft for one on the same thread. Lookup failure counts
    /// as no draft.
    async fn has_existing_draft(&self, message: &MessageMeta) -> bool {
        let Some(thread_id) = message.thread_id.as_deref() else {
            return false;
        };
        match self.mailbox.list_drafts().await {
            Ok(drafts) => drafts
                .iter()
                .any(|d| d.thread_id.as_deref() == Some(thread_id)),
            Err(e) => {
                warn!(id = %message.id, thread_id, error = %e, "Failed to check existing drafts");
                false
            }
        }
    }

    async fn compose_reply(
        &self,
        position: usize,
        message: &MessageMeta,
        out: Report<'_>,
    ) -> (String, DraftSource) {
        if let Some(classifier) = &self.classifier {
            match classifier
                .generate_reply(&self.prompts.reply_system, &reply_user_prompt(message))
                .await
            {
                Ok(body) => return (body, DraftSource::Ai),
                Err(e) => {
                    warn!(id = %message.id, error = %e, "Reply generation failed, using template");
                    say(
                        out,
                        format_args!("Message {position}: AI generation failed ({e}), using template"),
                    );
                }
            }
        }

        let body = self
            .prompts
            .template_reply(message.sender.display_name(), &message.subject);
        (body, DraftSource::Template)
    }

    /// Editor failures and empty results keep the unedited body.
    async fn review(&self, message: &MessageMeta, body: String) -> String {
        let Some(editor) = &self.editor else {
            return body;
        };
        match editor.edit(&body).await {
            Ok(edited) if !edited.trim().is_empty() => edited,
            Ok(_) => {
                warn!(id = %message.id, "Edited draft is empty, keeping original");
                body
            }
            Err(e) => {
                warn!(id = %message.id, error = %e, "Draft review failed, keeping original");
                body
            }
        }
    }
}

/// Write one report line. A closed stdout does not abort the run.
fn say(out: Report<'_>, line: fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{line}") {
        warn!(error = %e, "Failed to write report line");
    }
}
