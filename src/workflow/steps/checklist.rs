//! Step 2: prepare the inspection checklist.

use super::require;
use crate::audit::{actions, NewAuditEntry};
use crate::workflow::{ActionKind, TextField, WorkflowContext, WorkflowError, WorkflowResult};

#[derive(Debug, Clone)]
pub struct ChecklistStep {
    ctx: WorkflowContext,
}

impl ChecklistStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn set_existing(&self, checklist: &str) {
        self.ctx.state.set(TextField::ExistingChecklist, checklist);
    }

    /// Manual edits to the updated checklist are kept as-is.
    pub fn set_updated(&self, checklist: &str) {
        self.ctx.state.set(TextField::UpdatedChecklist, checklist);
    }

    /// Update the existing checklist against the regulation summary.
    pub async fn update(&self) -> WorkflowResult<String> {
        self.ctx
            .run(async {
                let (existing, summary) = self.ctx.state.read(|s| {
                    (s.existing_checklist.clone(), s.regulation_summary.clone())
                });
                require(!existing.trim().is_empty(), "Please provide the existing safety checklist.")?;
                require(
                    !summary.trim().is_empty(),
                    "Please analyze a regulation document first (on \"Analyze Rules\" page) to get \
                     a summary for updating the checklist.",
                )?;

                let token = self.ctx.state.begin(ActionKind::UpdateChecklist);
                let updated = self.ctx.gateway.update_checklist(&existing, &summary).await?;

                self.ctx
                    .state
                    .commit(&token, |s| s.updated_checklist = updated.clone())
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::CHECKLIST_UPDATED)
                        .detail("page", "PrepareChecklist")
                        .detail("existingLength", existing.len())
                        .detail("updatedLength", updated.len()),
                );
                Ok(updated)
            })
            .await
    }
}
