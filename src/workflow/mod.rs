//! Inspection workflow.
//!
//! Six steps share one [`StateStore`]; the output of one step becomes the
//! input of the next. Steps receive an explicit [`WorkflowContext`] that
//! bundles the state, the completion gateway and the audit trail.
//!
//! ## Steps
//!
//! 1. [`RulesStep`] - summarize a regulation document and answer questions
//! 2. [`ChecklistStep`] - update a checklist against the regulation summary
//! 3. [`RiskStep`] - analyze a worksite image, promote findings to notes
//! 4. [`PlanStep`] - review a contractor's H&S plan
//! 5. [`ReportStep`] - draft the violations report
//! 6. [`EmailStep`] - draft the urgent email

mod contractors;
mod state;
mod steps;

pub use contractors::Contractor;
pub use state::{
    ActionKind, QaItem, RequestToken, SiteImage, StateStore, TextField, WorkflowState,
};
pub use steps::{
    ChecklistStep, EmailStep, PlanReview, PlanStep, ReportStep, RiskStep, RulesStep,
    SafetyReport, SUPPORTED_IMAGE_TYPES, UNSUPPORTED_TEXT_FORMATS,
};

use std::future::Future;

use crate::audit::AuditTrail;
use crate::gateway::{CompletionGateway, GatewayError};
use crate::ingest::FileReadError;

/// Errors surfaced by workflow steps.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A precondition of the step is not met.
    #[error("{0}")]
    Validation(String),

    /// The file format cannot be analyzed directly.
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    FileRead(#[from] FileReadError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A newer request of the same kind was issued; this result was dropped.
    #[error("Discarded {0} result: a newer request replaced it")]
    Superseded(ActionKind),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Result type for workflow steps.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Shared context handed to every step.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub state: StateStore,
    pub gateway: CompletionGateway,
    pub audit: AuditTrail,
}

impl WorkflowContext {
    pub fn new(state: StateStore, gateway: CompletionGateway, audit: AuditTrail) -> Self {
        Self { state, gateway, audit }
    }

    pub fn rules(&self) -> RulesStep {
        RulesStep::new(self.clone())
    }

    pub fn checklist(&self) -> ChecklistStep {
        ChecklistStep::new(self.clone())
    }

    pub fn risk(&self) -> RiskStep {
        RiskStep::new(self.clone())
    }

    pub fn plan(&self) -> PlanStep {
        PlanStep::new(self.clone())
    }

    pub fn report(&self) -> ReportStep {
        ReportStep::new(self.clone())
    }

    pub fn email(&self) -> EmailStep {
        EmailStep::new(self.clone())
    }

    /// Run a step action under the loading/error protocol.
    ///
    /// The error slot is cleared when the action starts, and a failure is
    /// stored there as one readable message. The loading flag is released
    /// on both paths. Superseded results are not reported as errors.
    pub async fn run<T, F>(&self, action: F) -> WorkflowResult<T>
    where
        F: Future<Output = WorkflowResult<T>>,
    {
        self.state.start_loading();
        let result = action.await;
        self.state.finish_loading();

        match &result {
            Err(e) if e.is_superseded() => tracing::debug!(error = %e, "Stale result dropped"),
            Err(e) => self.state.set_error(Some(e.to_string())),
            Ok(_) => {}
        }

        result
    }
}
