//! Step 5: create the safety violations report.

use serde::Serialize;
use serde_json::json;

use crate::audit::{actions, NewAuditEntry};
use crate::gateway::prompts;
use crate::workflow::{ActionKind, TextField, WorkflowContext, WorkflowError, WorkflowResult};

const NOT_ENOUGH_INPUT: &str = "Not enough information to generate a report. Please complete \
                                previous steps like checklist updates, risk detection, or plan review.";

/// A generated report and the violations list extracted from it for the email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    pub report: String,
    pub violations_summary: String,
}

#[derive(Debug, Clone)]
pub struct ReportStep {
    ctx: WorkflowContext,
}

/// Fall back to `placeholder` when `value` is empty.
fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

impl ReportStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn set_notes(&self, notes: &str) {
        self.ctx.state.set(TextField::InspectionNotes, notes);
    }

    /// Append a paragraph to the inspection notes.
    pub fn append_notes(&self, text: &str) {
        let notes = self.ctx.state.get(TextField::InspectionNotes);
        let joined = if notes.is_empty() { text.to_string() } else { format!("{notes}\n\n{text}") };
        self.ctx.state.set(TextField::InspectionNotes, joined);
    }

    /// Manual edits to the report are kept as-is.
    pub fn set_report(&self, report: &str) {
        self.ctx.state.set(TextField::SafetyReport, report);
    }

    /// Draft the report from every earlier step, then extract the critical
    /// violations for the urgent email.
    pub async fn generate(&self) -> WorkflowResult<SafetyReport> {
        self.ctx
            .run(async {
                let (checklist, notes, scope, violations) = self.ctx.state.read(|s| {
                    (
                        s.updated_checklist.clone(),
                        s.inspection_notes.clone(),
                        s.contractor_scope_of_work_summary.clone(),
                        s.contractor_plan_violations.clone(),
                    )
                });
                if [&checklist, &notes, &scope, &violations].iter().all(|v| v.is_empty()) {
                    return Err(WorkflowError::validation(NOT_ENOUGH_INPUT));
                }

                let combined_notes = format!(
                    "{}\n\nContractor Plan Violations (if any):\n{}",
                    or_placeholder(&notes, "No specific inspection notes."),
                    or_placeholder(&violations, "No specific contractor plan violations noted."),
                );

                let token = self.ctx.state.begin(ActionKind::GenerateReport);
                let report = self
                    .ctx
                    .gateway
                    .generate_report(
                        or_placeholder(&checklist, "No checklist available."),
                        &combined_notes,
                        or_placeholder(&scope, "No scope of work summary available."),
                    )
                    .await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.safety_report = report.clone())
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                let focus = prompts::email_violations_focus(&report);
                let violations_summary = self.ctx.gateway.summarize_with_focus(&report, &focus).await?;
                self.ctx
                    .state
                    .commit(&token, |s| s.violations_summary_for_email = violations_summary.clone())
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::SAFETY_REPORT_GENERATED)
                        .detail("page", "CreateReport")
                        .detail("reportLength", report.len())
                        .detail("violationsSummaryForEmailLength", violations_summary.len())
                        .detail(
                            "sources",
                            json!({
                                "checklistAvailable": !checklist.is_empty(),
                                "inspectionNotesLength": notes.len(),
                                "contractorScopeAvailable": !scope.is_empty(),
                                "contractorViolationsAvailable": !violations.is_empty(),
                            }),
                        ),
                );
                Ok(SafetyReport { report, violations_summary })
            })
            .await
    }
}
