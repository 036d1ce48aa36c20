//! Workflow step handlers.

mod checklist;
mod email;
mod plan;
mod report;
mod risk;
mod rules;

pub use checklist::ChecklistStep;
pub use email::EmailStep;
pub use plan::{PlanReview, PlanStep};
pub use report::{ReportStep, SafetyReport};
pub use risk::{RiskStep, SUPPORTED_IMAGE_TYPES};
pub use rules::RulesStep;

use std::path::Path;

use super::{WorkflowError, WorkflowResult};
use crate::ingest::{self, SourceFile};

/// Document formats that cannot be read as text and must be pasted instead.
pub const UNSUPPORTED_TEXT_FORMATS: &[&str] = &["pdf", "doc", "docx", "xlsx"];

/// Read a text document, routing complex formats to manual paste.
async fn read_text_document(path: &Path) -> WorkflowResult<String> {
    let file = SourceFile::new(path);

    if let Some(ext) = file.extension().filter(|e| UNSUPPORTED_TEXT_FORMATS.contains(&e.as_str())) {
        return Err(WorkflowError::UnsupportedFormat(format!(
            "For {} files, direct text analysis is not supported. Please open the file, then copy \
             and paste the relevant text content for analysis.",
            ext.to_uppercase()
        )));
    }

    Ok(ingest::read_as_text(path).await?)
}

fn require(condition: bool, message: &str) -> WorkflowResult<()> {
    if condition {
        Ok(())
    } else {
        Err(WorkflowError::validation(message))
    }
}
