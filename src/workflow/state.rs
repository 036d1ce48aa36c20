//! Workflow state store.
//!
//! The single source of truth every step reads from and writes to. Reads
//! and writes are synchronous and immediately visible; compound updates
//! happen under one write lock. The store never performs I/O.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::contractors::Contractor;
use crate::core::Step;

/// Label used in the notes block when an image has no file name.
const UNNAMED_IMAGE: &str = "Uploaded Image";

/// A question asked about the regulation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaItem {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// The image currently under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteImage {
    pub id: String,
    pub file_name: String,
    /// Raw bytes, base64 encoded
    pub base64: String,
    pub mime_type: String,
    pub analysis: String,
}

impl SiteImage {
    /// The block appended to the inspection notes when this image is promoted.
    pub fn notes_block(&self) -> String {
        let name = if self.file_name.is_empty() { UNNAMED_IMAGE } else { self.file_name.as_str() };
        format!(
            "\n\n--- Image Analysis ({}) ---\n{}\n--- End Image Analysis ---",
            name, self.analysis
        )
    }
}

/// Everything the six steps produce and consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowState {
    // Analyze rules
    pub regulation_document_text: String,
    pub regulation_summary: String,
    pub regulation_qas: Vec<QaItem>,

    // Prepare checklist
    pub existing_checklist: String,
    pub updated_checklist: String,

    // Risk detection
    pub site_image: Option<SiteImage>,

    // Review contractor plan
    pub selected_contractor: Option<Contractor>,
    pub contractor_safety_plan_text: String,
    pub contractor_safety_plan_summary: String,
    pub contractor_scope_of_work_summary: String,
    pub contractor_plan_violations: String,

    // Create report
    pub safety_report: String,
    pub inspection_notes: String,

    // Draft email
    pub email_recipient: String,
    pub urgent_email_draft: String,
    pub violations_summary_for_email: String,
}

impl WorkflowState {
    /// Current value of a free-text field.
    pub fn field(&self, field: TextField) -> &str {
        field.value(self)
    }

    /// Whether `step` has produced its main output.
    pub fn step_complete(&self, step: Step) -> bool {
        match step {
            Step::AnalyzeRules => !self.regulation_summary.is_empty(),
            Step::PrepareChecklist => !self.updated_checklist.is_empty(),
            Step::RiskDetection => {
                self.site_image.as_ref().is_some_and(|img| !img.analysis.is_empty())
            }
            Step::ReviewPlan => !self.contractor_plan_violations.is_empty(),
            Step::CreateReport => !self.safety_report.is_empty(),
            Step::DraftEmail => !self.urgent_email_draft.is_empty(),
        }
    }
}

fn has_qa(items: &[QaItem], id: &str) -> bool {
    items.iter().any(|q| q.id == id)
}

/// What a free-text field was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Regulation,
    Contractor,
}

impl WorkflowState {
    /// Apply the changes made since `base` on top of `latest`.
    ///
    /// `self` and `latest` both started from `base`. Fields `self` left
    /// untouched keep their value from `latest`; notes appended on both
    /// sides keep both appendices. When only `latest` moved to another
    /// regulation document or contractor, results `self` derived from the
    /// old one are dropped.
    pub fn rebase(&self, base: &Self, latest: &Self) -> Self {
        let mut merged = latest.clone();

        let regulation = (
            self.regulation_document_text != base.regulation_document_text,
            latest.regulation_document_text != base.regulation_document_text,
        );
        let contractor = (
            self.selected_contractor != base.selected_contractor,
            latest.selected_contractor != base.selected_contractor,
        );

        for field in TextField::ALL {
            let (ours_moved, theirs_moved) = match field.anchor() {
                Some(Anchor::Regulation) => regulation,
                Some(Anchor::Contractor) => contractor,
                None => (false, false),
            };
            let ours = self.field(field);
            if ours_moved {
                *field.slot(&mut merged) = ours.to_string();
            } else if theirs_moved || ours == base.field(field) {
                continue;
            } else if field == TextField::InspectionNotes {
                let theirs = latest.field(field);
                *field.slot(&mut merged) = match ours.strip_prefix(base.field(field)) {
                    Some(appended) => format!("{theirs}{appended}"),
                    None => ours.to_string(),
                };
            } else {
                *field.slot(&mut merged) = ours.to_string();
            }
        }

        merged.regulation_qas = match regulation {
            (true, _) => self.regulation_qas.clone(),
            (false, true) => latest.regulation_qas.clone(),
            (false, false) => {
                let mut qas: Vec<QaItem> = latest
                    .regulation_qas
                    .iter()
                    .filter(|q| !has_qa(&base.regulation_qas, &q.id) || has_qa(&self.regulation_qas, &q.id))
                    .cloned()
                    .collect();
                let added: Vec<QaItem> = self
                    .regulation_qas
                    .iter()
                    .filter(|q| !has_qa(&base.regulation_qas, &q.id) && !has_qa(&qas, &q.id))
                    .cloned()
                    .collect();
                qas.extend(added);
                qas
            }
        };

        if contractor.0 {
            merged.selected_contractor = self.selected_contractor.clone();
        }
        if self.site_image != base.site_image {
            merged.site_image = self.site_image.clone();
        }
        merged
    }
}

/// Process-wide loading/error signal. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UiSignal {
    in_flight: usize,
    error: Option<String>,
}

impl UiSignal {
    fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}

/// Free-text fields addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    RegulationDocumentText,
    RegulationSummary,
    ExistingChecklist,
    UpdatedChecklist,
    ContractorSafetyPlanText,
    ContractorSafetyPlanSummary,
    ContractorScopeOfWorkSummary,
    ContractorPlanViolations,
    SafetyReport,
    InspectionNotes,
    EmailRecipient,
    UrgentEmailDraft,
    ViolationsSummaryForEmail,
}

impl TextField {
    pub const ALL: [Self; 13] = [
        Self::RegulationDocumentText,
        Self::RegulationSummary,
        Self::ExistingChecklist,
        Self::UpdatedChecklist,
        Self::ContractorSafetyPlanText,
        Self::ContractorSafetyPlanSummary,
        Self::ContractorScopeOfWorkSummary,
        Self::ContractorPlanViolations,
        Self::SafetyReport,
        Self::InspectionNotes,
        Self::EmailRecipient,
        Self::UrgentEmailDraft,
        Self::ViolationsSummaryForEmail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RegulationDocumentText => "regulation-text",
            Self::RegulationSummary => "regulation-summary",
            Self::ExistingChecklist => "existing-checklist",
            Self::UpdatedChecklist => "updated-checklist",
            Self::ContractorSafetyPlanText => "plan-text",
            Self::ContractorSafetyPlanSummary => "plan-summary",
            Self::ContractorScopeOfWorkSummary => "scope-summary",
            Self::ContractorPlanViolations => "plan-violations",
            Self::SafetyReport => "safety-report",
            Self::InspectionNotes => "inspection-notes",
            Self::EmailRecipient => "email-recipient",
            Self::UrgentEmailDraft => "email-draft",
            Self::ViolationsSummaryForEmail => "violations-summary",
        }
    }

    fn anchor(self) -> Option<Anchor> {
        match self {
            Self::RegulationDocumentText | Self::RegulationSummary => Some(Anchor::Regulation),
            Self::ContractorSafetyPlanText
            | Self::ContractorSafetyPlanSummary
            | Self::ContractorScopeOfWorkSummary
            | Self::ContractorPlanViolations => Some(Anchor::Contractor),
            _ => None,
        }
    }

    fn value(self, state: &WorkflowState) -> &String {
        match self {
            Self::RegulationDocumentText => &state.regulation_document_text,
            Self::RegulationSummary => &state.regulation_summary,
            Self::ExistingChecklist => &state.existing_checklist,
            Self::UpdatedChecklist => &state.updated_checklist,
            Self::ContractorSafetyPlanText => &state.contractor_safety_plan_text,
            Self::ContractorSafetyPlanSummary => &state.contractor_safety_plan_summary,
            Self::ContractorScopeOfWorkSummary => &state.contractor_scope_of_work_summary,
            Self::ContractorPlanViolations => &state.contractor_plan_violations,
            Self::SafetyReport => &state.safety_report,
            Self::InspectionNotes => &state.inspection_notes,
            Self::EmailRecipient => &state.email_recipient,
            Self::UrgentEmailDraft => &state.urgent_email_draft,
            Self::ViolationsSummaryForEmail => &state.violations_summary_for_email,
        }
    }

    fn slot(self, state: &mut WorkflowState) -> &mut String {
        match self {
            Self::RegulationDocumentText => &mut state.regulation_document_text,
            Self::RegulationSummary => &mut state.regulation_summary,
            Self::ExistingChecklist => &mut state.existing_checklist,
            Self::UpdatedChecklist => &mut state.updated_checklist,
            Self::ContractorSafetyPlanText => &mut state.contractor_safety_plan_text,
            Self::ContractorSafetyPlanSummary => &mut state.contractor_safety_plan_summary,
            Self::ContractorScopeOfWorkSummary => &mut state.contractor_scope_of_work_summary,
            Self::ContractorPlanViolations => &mut state.contractor_plan_violations,
            Self::SafetyReport => &mut state.safety_report,
            Self::InspectionNotes => &mut state.inspection_notes,
            Self::EmailRecipient => &mut state.email_recipient,
            Self::UrgentEmailDraft => &mut state.urgent_email_draft,
            Self::ViolationsSummaryForEmail => &mut state.violations_summary_for_email,
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("Unknown field: {s}"))
    }
}

/// Kinds of compound step actions, each with its own request counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SummarizeRegulation,
    AnswerQuestion,
    UpdateChecklist,
    AnalyzeImage,
    AnalyzePlan,
    GenerateReport,
    DraftEmail,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SummarizeRegulation => "regulation summary",
            Self::AnswerQuestion => "regulation question",
            Self::UpdateChecklist => "checklist update",
            Self::AnalyzeImage => "image analysis",
            Self::AnalyzePlan => "contractor plan analysis",
            Self::GenerateReport => "safety report",
            Self::DraftEmail => "email draft",
        };
        f.write_str(name)
    }
}

/// Ticket for one in-flight action. Only the newest ticket of a kind may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub kind: ActionKind,
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    state: WorkflowState,
    ui: UiSignal,
    generations: HashMap<ActionKind, u64>,
}

impl Inner {
    fn invalidate(&mut self, kind: ActionKind) {
        *self.generations.entry(kind).or_insert(0) += 1;
    }

    fn is_current(&self, token: &RequestToken) -> bool {
        self.generations.get(&token.kind).copied().unwrap_or(0) == token.generation
    }

    fn reset_regulation_derivatives(&mut self) {
        self.state.regulation_summary.clear();
        self.state.regulation_qas.clear();
        self.invalidate(ActionKind::SummarizeRegulation);
        self.invalidate(ActionKind::AnswerQuestion);
    }
}

/// Shared handle to the workflow state. Clones see the same state.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<Inner>>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("StateStore").field("state", &inner.state).field("ui", &inner.ui).finish()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved state.
    pub fn from_state(state: WorkflowState) -> Self {
        Self { inner: Arc::new(RwLock::new(Inner { state, ..Inner::default() })) }
    }

    /// A copy of the whole state.
    pub fn snapshot(&self) -> WorkflowState {
        self.inner.read().state.clone()
    }

    /// Read through a closure without cloning.
    pub fn read<R>(&self, f: impl FnOnce(&WorkflowState) -> R) -> R {
        f(&self.inner.read().state)
    }

    pub fn get(&self, field: TextField) -> String {
        self.inner.read().state.field(field).to_string()
    }

    /// Replace a field.
    ///
    /// Changing the regulation text supersedes any summary or answer still
    /// in flight for the old text. Blanking it also drops its summary and
    /// Q&A list.
    pub fn set(&self, field: TextField, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.inner.write();
        if field == TextField::RegulationDocumentText {
            if value.trim().is_empty() {
                inner.reset_regulation_derivatives();
            } else if inner.state.regulation_document_text != value {
                inner.invalidate(ActionKind::SummarizeRegulation);
                inner.invalidate(ActionKind::AnswerQuestion);
            }
        }
        *field.slot(&mut inner.state) = value;
    }

    /// Start a new regulation document, discarding everything derived from the old one.
    pub fn load_regulation_document(&self, text: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.reset_regulation_derivatives();
        inner.state.regulation_document_text = text.into();
    }

    pub fn regulation_qas(&self) -> Vec<QaItem> {
        self.inner.read().state.regulation_qas.clone()
    }

    /// Append a Q&A pair with a fresh id.
    pub fn add_regulation_qa(&self, question: impl Into<String>, answer: impl Into<String>) -> QaItem {
        let item = QaItem {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            answer: answer.into(),
        };
        self.inner.write().state.regulation_qas.push(item.clone());
        item
    }

    pub fn clear_regulation_qas(&self) {
        let mut inner = self.inner.write();
        inner.state.regulation_qas.clear();
        inner.invalidate(ActionKind::AnswerQuestion);
    }

    pub fn site_image(&self) -> Option<SiteImage> {
        self.inner.read().state.site_image.clone()
    }

    pub fn set_site_image(&self, image: Option<SiteImage>) {
        let mut inner = self.inner.write();
        if image.is_none() {
            inner.invalidate(ActionKind::AnalyzeImage);
        }
        inner.state.site_image = image;
    }

    /// Append the image's analysis block to the inspection notes.
    pub fn append_image_to_notes(&self, image: &SiteImage) {
        let block = image.notes_block();
        self.inner.write().state.inspection_notes.push_str(&block);
    }

    pub fn selected_contractor(&self) -> Option<Contractor> {
        self.inner.read().state.selected_contractor.clone()
    }

    /// Switch contractor and clear every plan-review field in the same update.
    pub fn select_contractor(&self, contractor: Option<Contractor>) {
        let mut inner = self.inner.write();
        let state = &mut inner.state;
        state.selected_contractor = contractor;
        state.contractor_safety_plan_text.clear();
        state.contractor_safety_plan_summary.clear();
        state.contractor_scope_of_work_summary.clear();
        state.contractor_plan_violations.clear();
        inner.invalidate(ActionKind::AnalyzePlan);
    }

    /// Replace the whole state, e.g. to start a new document.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.state = WorkflowState::default();
        let kinds: Vec<ActionKind> = inner.generations.keys().copied().collect();
        for kind in kinds {
            inner.invalidate(kind);
        }
    }

    // --- Request tokens ---

    /// Take a new token for `kind`, superseding any outstanding one.
    pub fn begin(&self, kind: ActionKind) -> RequestToken {
        let mut inner = self.inner.write();
        inner.invalidate(kind);
        RequestToken { kind, generation: inner.generations[&kind] }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.inner.read().is_current(token)
    }

    /// Apply `f` only if `token` is still the newest of its kind.
    ///
    /// The check and the write happen under the same lock.
    pub fn commit<R>(&self, token: &RequestToken, f: impl FnOnce(&mut WorkflowState) -> R) -> Option<R> {
        let mut inner = self.inner.write();
        if inner.is_current(token) {
            Some(f(&mut inner.state))
        } else {
            None
        }
    }

    // --- UI signal ---

    pub fn is_loading(&self) -> bool {
        self.inner.read().ui.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().ui.error.clone()
    }

    pub fn set_error(&self, message: Option<String>) {
        self.inner.write().ui.error = message;
    }

    pub(crate) fn start_loading(&self) {
        let mut inner = self.inner.write();
        inner.ui.in_flight += 1;
        inner.ui.error = None;
    }

    pub(crate) fn finish_loading(&self) {
        let mut inner = self.inner.write();
        inner.ui.in_flight = inner.ui.in_flight.saturating_sub(1);
    }
}
