//! Step 4: review a contractor's H&S plan.

use std::path::Path;

use serde::Serialize;

use super::{read_text_document, require};
use crate::audit::{actions, NewAuditEntry};
use crate::gateway::prompts;
use crate::workflow::{
    ActionKind, Contractor, TextField, WorkflowContext, WorkflowError, WorkflowResult,
};

const NO_CONTRACTOR: &str = "Please select a contractor first.";

/// The three results of a plan analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReview {
    pub plan_summary: String,
    pub scope_summary: String,
    pub violations: String,
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    ctx: WorkflowContext,
}

impl PlanStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn contractors(&self) -> &'static [Contractor] {
        Contractor::roster()
    }

    /// Select a contractor by id or name. Every plan-review field is cleared.
    pub fn select(&self, key: &str) -> WorkflowResult<Contractor> {
        let contractor = Contractor::find(key)
            .cloned()
            .ok_or_else(|| WorkflowError::validation(format!("Unknown contractor: {key}")))?;
        self.ctx.state.select_contractor(Some(contractor.clone()));
        self.ctx.state.set_error(None);
        Ok(contractor)
    }

    /// Load the selected contractor's plan from a file.
    pub async fn load_file(&self, path: &Path) -> WorkflowResult<usize> {
        self.ctx
            .run(async {
                let contractor = self
                    .ctx
                    .state
                    .selected_contractor()
                    .ok_or_else(|| WorkflowError::validation(NO_CONTRACTOR))?;

                let text = match read_text_document(path).await {
                    Ok(text) => text,
                    Err(e) => {
                        self.ctx.state.set(TextField::ContractorSafetyPlanText, "");
                        return Err(e);
                    }
                };
                let len = text.len();
                self.ctx.state.set(TextField::ContractorSafetyPlanText, text);

                let file_name =
                    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                self.ctx.audit.record(
                    NewAuditEntry::now(actions::FILE_CONTENT_EXTRACTED)
                        .detail("page", "ReviewSafetyPlan")
                        .detail("contractorName", contractor.name)
                        .detail("fileName", file_name)
                        .detail("extractedTextLength", len),
                );
                Ok(len)
            })
            .await
    }

    pub fn paste(&self, text: &str) -> WorkflowResult<()> {
        if self.ctx.state.selected_contractor().is_none() {
            let err = WorkflowError::validation(NO_CONTRACTOR);
            self.ctx.state.set_error(Some(err.to_string()));
            return Err(err);
        }
        self.ctx.state.set(TextField::ContractorSafetyPlanText, text);
        Ok(())
    }

    /// Summarize the plan, summarize its scope of work, then look for violations.
    ///
    /// The three calls run in order and each result is stored as soon as it
    /// arrives, so a failure in a later call keeps the earlier results.
    pub async fn analyze(&self) -> WorkflowResult<PlanReview> {
        self.ctx
            .run(async {
                let contractor = self
                    .ctx
                    .state
                    .selected_contractor()
                    .ok_or_else(|| WorkflowError::validation(NO_CONTRACTOR))?;
                let (plan, regulation_summary) = self.ctx.state.read(|s| {
                    (s.contractor_safety_plan_text.clone(), s.regulation_summary.clone())
                });
                require(
                    !plan.trim().is_empty(),
                    "Please upload or paste the contractor H&S plan first.",
                )?;

                let token = self.ctx.state.begin(ActionKind::AnalyzePlan);
                let gateway = &self.ctx.gateway;
                let superseded = || WorkflowError::Superseded(token.kind);

                let plan_summary =
                    gateway.summarize_with_focus(&plan, prompts::PLAN_SUMMARY_FOCUS).await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.contractor_safety_plan_summary = plan_summary.clone())
                    .ok_or_else(superseded)?;

                let scope_summary =
                    gateway.summarize_with_focus(&plan, prompts::SCOPE_OF_WORK_FOCUS).await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.contractor_scope_of_work_summary = scope_summary.clone())
                    .ok_or_else(superseded)?;

                let review =
                    prompts::plan_violation_review(&plan_summary, &scope_summary, &regulation_summary);
                let violations =
                    gateway.summarize_with_focus(&review, prompts::PLAN_VIOLATION_FOCUS).await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.contractor_plan_violations = violations.clone())
                    .ok_or_else(superseded)?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::CONTRACTOR_PLAN_ANALYZED)
                        .detail("page", "ReviewSafetyPlan")
                        .detail("contractorName", contractor.name)
                        .detail("planTextLength", plan.len())
                        .detail("planSummaryLength", plan_summary.len())
                        .detail("scopeSummaryLength", scope_summary.len())
                        .detail("violationsIdentifiedLength", violations.len())
                        .detail("regulationSummaryUsed", !regulation_summary.trim().is_empty()),
                );
                Ok(PlanReview { plan_summary, scope_summary, violations })
            })
            .await
    }
}
