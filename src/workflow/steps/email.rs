//! Step 6: draft the urgent email.

use super::require;
use crate::audit::{actions, NewAuditEntry};
use crate::gateway::DEFAULT_EMAIL_RECIPIENT;
use crate::workflow::{ActionKind, TextField, WorkflowContext, WorkflowError, WorkflowResult};

#[derive(Debug, Clone)]
pub struct EmailStep {
    ctx: WorkflowContext,
}

impl EmailStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn set_recipient(&self, recipient: &str) {
        self.ctx.state.set(TextField::EmailRecipient, recipient);
    }

    /// Overwrite the violations summary, e.g. when no report was generated.
    pub fn set_violations_summary(&self, summary: &str) {
        self.ctx.state.set(TextField::ViolationsSummaryForEmail, summary);
    }

    pub fn set_draft(&self, draft: &str) {
        self.ctx.state.set(TextField::UrgentEmailDraft, draft);
    }

    /// The recipient the next draft will address.
    pub fn recipient(&self) -> String {
        let recipient = self.ctx.state.get(TextField::EmailRecipient);
        if recipient.trim().is_empty() {
            DEFAULT_EMAIL_RECIPIENT.to_string()
        } else {
            recipient
        }
    }

    /// Draft the email. A given `recipient` replaces the stored one.
    pub async fn draft(&self, recipient: Option<&str>) -> WorkflowResult<String> {
        self.ctx
            .run(async {
                if let Some(recipient) = recipient {
                    self.set_recipient(recipient);
                }
                let summary = self.ctx.state.get(TextField::ViolationsSummaryForEmail);
                require(
                    !summary.trim().is_empty(),
                    "No violations summary available. Please generate a safety report first, \
                     or manually input a summary.",
                )?;
                let recipient = self.recipient();

                let token = self.ctx.state.begin(ActionKind::DraftEmail);
                let draft = self.ctx.gateway.draft_urgent_email(&summary, &recipient).await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.urgent_email_draft = draft.clone())
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::URGENT_EMAIL_DRAFTED)
                        .detail("page", "DraftEmail")
                        .detail("recipient", recipient)
                        .detail("draftLength", draft.len()),
                );
                Ok(draft)
            })
            .await
    }
}
