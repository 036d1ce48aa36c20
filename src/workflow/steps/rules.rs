//! Step 1: analyze new safety rules.

use std::path::Path;

use super::{read_text_document, require};
use crate::audit::{actions, NewAuditEntry};
use crate::workflow::{
    ActionKind, QaItem, TextField, WorkflowContext, WorkflowError, WorkflowResult,
};

/// Summarize a regulation document and answer questions about it.
#[derive(Debug, Clone)]
pub struct RulesStep {
    ctx: WorkflowContext,
}

impl RulesStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Load a regulation document from a file.
    ///
    /// Everything derived from the previous document is cleared first, also
    /// when the file turns out to be unreadable.
    pub async fn load_file(&self, path: &Path) -> WorkflowResult<usize> {
        self.ctx
            .run(async {
                self.ctx.state.load_regulation_document(String::new());
                let text = read_text_document(path).await?;
                let len = text.len();
                self.ctx.state.load_regulation_document(text);
                tracing::info!(path = %path.display(), bytes = len, "Regulation document loaded");
                Ok(len)
            })
            .await
    }

    /// Replace the document text with pasted content.
    pub fn paste(&self, text: &str) {
        self.ctx.state.set(TextField::RegulationDocumentText, text);
        if !text.trim().is_empty() {
            self.ctx.state.set_error(None);
        }
    }

    pub async fn summarize(&self) -> WorkflowResult<String> {
        self.ctx
            .run(async {
                let document = self.ctx.state.get(TextField::RegulationDocumentText);
                require(
                    !document.trim().is_empty(),
                    "Please upload or paste a regulation document first.",
                )?;

                let token = self.ctx.state.begin(ActionKind::SummarizeRegulation);
                let summary = self.ctx.gateway.summarize_text(&document).await?;

                self.ctx
                    .state
                    .commit(&token, |s| s.regulation_summary = summary.clone())
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::REGULATION_SUMMARY_GENERATED)
                        .detail("page", "AnalyzeRules")
                        .detail("documentLength", document.len())
                        .detail("summaryLength", summary.len()),
                );
                Ok(summary)
            })
            .await
    }

    /// Ask a question about the document; the answer is appended to the Q&A list.
    pub async fn ask(&self, question: &str) -> WorkflowResult<QaItem> {
        self.ctx
            .run(async {
                let document = self.ctx.state.get(TextField::RegulationDocumentText);
                require(
                    !document.trim().is_empty(),
                    "Please upload or paste a regulation document to ask questions about it.",
                )?;
                require(!question.trim().is_empty(), "Please enter a question.")?;

                let token = self.ctx.state.begin(ActionKind::AnswerQuestion);
                let answer = self.ctx.gateway.answer_question(&document, question).await?;

                // Questions are independent, so only a document change or a
                // cleared list invalidates the answer.
                if !self.ctx.state.is_current(&token) {
                    return Err(WorkflowError::Superseded(token.kind));
                }
                let item = self.ctx.state.add_regulation_qa(question, answer);

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::REGULATION_QUESTION_ANSWERED)
                        .detail("page", "AnalyzeRules")
                        .detail("question", question)
                        .detail("answerLength", item.answer.len()),
                );
                Ok(item)
            })
            .await
    }

    pub fn clear_qas(&self) {
        self.ctx.state.clear_regulation_qas();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::workflow::steps::testing::{context, context_with_audit, ScriptedBackend};

    #[tokio::test]
    async fn test_summarize_keeps_document_text() {
        let backend = ScriptedBackend::replying(&["Hard hats are mandatory."]);
        let ctx = context(backend.clone());
        let step = ctx.rules();

        step.paste("Workers must wear hard hats.");
        let summary = step.summarize().await.unwrap();

        assert_eq!(summary, "Hard hats are mandatory.");
        assert_eq!(ctx.state.get(TextField::RegulationSummary), "Hard hats are mandatory.");
        assert_eq!(ctx.state.get(TextField::RegulationDocumentText), "Workers must wear hard hats.");
        assert!(backend.prompts()[0].contains("Workers must wear hard hats."));
    }

    #[tokio::test]
    async fn test_summarize_requires_document() {
        let backend = ScriptedBackend::replying(&[]);
        let ctx = context(backend.clone());

        let err = ctx.rules().summarize().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(ctx.state.error().as_deref(), Some("Please upload or paste a regulation document first."));
        assert!(backend.requests.lock().is_empty());
        assert!(!ctx.state.is_loading());
    }

    #[tokio::test]
    async fn test_ask_appends_in_order() {
        let backend = ScriptedBackend::replying(&["Hard hats.", "Yes, harnesses above 2m."]);
        let ctx = context(backend);
        let step = ctx.rules();
        step.paste("Workers must wear hard hats.");

        step.ask("What PPE is required?").await.unwrap();
        step.ask("Is fall protection required?").await.unwrap();

        let qas = ctx.state.regulation_qas();
        assert_eq!(qas.len(), 2);
        assert_eq!(qas[0].question, "What PPE is required?");
        assert_eq!(qas[0].answer, "Hard hats.");
        assert_eq!(qas[1].question, "Is fall protection required?");
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let ctx = context(ScriptedBackend::replying(&[]));
        ctx.rules().paste("text");
        let err = ctx.rules().ask("   ").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a question.");
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_prior_fields() {
        let backend = ScriptedBackend::failing(GatewayError::Upstream("quota exceeded".into()));
        let ctx = context(backend);
        ctx.rules().paste("Workers must wear hard hats.");
        ctx.state.set(TextField::RegulationSummary, "earlier summary");

        let err = ctx.rules().summarize().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Gateway(_)));
        assert_eq!(ctx.state.get(TextField::RegulationSummary), "earlier summary");
        assert!(ctx.state.error().unwrap().contains("quota exceeded"));
        assert!(!ctx.state.is_loading());
    }

    #[tokio::test]
    async fn test_load_file_resets_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regs.md");
        std::fs::write(&path, "# Rule 1\nWear hard hats.").unwrap();

        let ctx = context(ScriptedBackend::replying(&[]));
        ctx.state.load_regulation_document("old");
        ctx.state.set(TextField::RegulationSummary, "old summary");
        ctx.state.add_regulation_qa("q", "a");

        ctx.rules().load_file(&path).await.unwrap();

        assert_eq!(ctx.state.get(TextField::RegulationDocumentText), "# Rule 1\nWear hard hats.");
        assert!(ctx.state.get(TextField::RegulationSummary).is_empty());
        assert!(ctx.state.regulation_qas().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_is_routed_to_paste_and_old_text_cleared() {
        let ctx = context(ScriptedBackend::replying(&[]));
        ctx.state.load_regulation_document("old");

        let err = ctx.rules().load_file(Path::new("rules.pdf")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnsupportedFormat(_)));
        assert!(ctx.state.get(TextField::RegulationDocumentText).is_empty());
    }

    #[tokio::test]
    async fn test_summary_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, store) = context_with_audit(ScriptedBackend::replying(&["s"]), &dir);
        ctx.rules().paste("doc");
        ctx.rules().summarize().await.unwrap();
        ctx.audit.flush().await;

        let entries = store.by_action_type(actions::REGULATION_SUMMARY_GENERATED).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["summaryLength"], 1);
    }
}
