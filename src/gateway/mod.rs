//! Completion gateway.
//!
//! A single request/response bridge to an external text/vision completion
//! service. Every call is stateless; there is no conversation and no
//! automatic retry.
//!
//! ## Layout
//!
//! - [`CompletionBackend`] - the wire-level seam (Gemini in production, a
//!   scripted backend in tests)
//! - [`CompletionGateway`] - credential check, timeout, structured-output
//!   unwrapping and the named inspection operations
//! - [`prompts`] - the fixed prompt templates

mod gemini;
pub mod prompts;

pub use gemini::GeminiBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::GatewayConfig;

/// Default prompt used when an image is analyzed without a custom prompt.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image focusing on potential safety hazards. Identify any unsafe acts or conditions, particularly concerning work near high voltage equipment if visible.";

/// Default recipient for the urgent email.
pub const DEFAULT_EMAIL_RECIPIENT: &str = "Head of H&S";

/// Gateway error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No credential is configured; raised before any network attempt.
    #[error("API key not configured. Please set the {0} environment variable.")]
    Configuration(String),

    /// The upstream call failed or returned a non-success outcome.
    #[error("Completion API error: {0}")]
    Upstream(String),

    /// The upstream call did not finish in time.
    #[error("Completion API error: request timed out after {0}s")]
    Timeout(u64),

    /// The service answered but produced no text.
    #[error("Completion API error: empty response")]
    EmptyResponse,
}

impl GatewayError {
    /// Whether this error is a missing-credential error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// One part of a multi-part prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Instruction or document text.
    Text(String),
    /// Inline binary payload, base64 encoded.
    InlineData { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData { mime_type: mime_type.into(), data: data.into() }
    }
}

/// Prompt content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Parts(Vec<Part>),
}

impl Prompt {
    /// Flatten the prompt into parts for the wire.
    pub fn into_parts(self) -> Vec<Part> {
        match self {
            Self::Text(text) => vec![Part::Text(text)],
            Self::Parts(parts) => parts,
        }
    }

    /// Concatenated text of all text parts.
    pub fn text_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text(t) => Some(t.as_str()),
                    Part::InlineData { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<Part>> for Prompt {
    fn from(parts: Vec<Part>) -> Self {
        Self::Parts(parts)
    }
}

/// A fully-formed completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: Prompt,
    /// Ask the service for machine-parseable output.
    pub structured: bool,
}

/// Trait for completion backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Issue one request and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;

    /// Whether a credential is available.
    fn is_configured(&self) -> bool;

    /// Name of the environment variable the credential is read from.
    fn credential_name(&self) -> &str;

    /// Get the backend name.
    fn name(&self) -> &str;
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").expect("fence regex is valid")
});

/// Strip a surrounding code fence from a structured reply.
///
/// The input is trimmed first. A fenced block (with or without a language
/// tag) yields its trimmed inner content, which is empty for an empty
/// fence; anything else is returned as-is.
pub fn unwrap_structured(raw: &str) -> String {
    let text = raw.trim();
    match FENCE_RE.captures(text).and_then(|c| c.get(2)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => text.to_string(),
    }
}

/// Completion gateway shared by all workflow steps.
#[derive(Clone)]
pub struct CompletionGateway {
    backend: Arc<dyn CompletionBackend>,
    text_model: String,
    image_model: String,
    timeout: Duration,
}

impl std::fmt::Debug for CompletionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGateway")
            .field("backend", &self.backend.name())
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompletionGateway {
    /// Create a gateway over an arbitrary backend.
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &GatewayConfig) -> Self {
        if !backend.is_configured() {
            tracing::debug!(
                backend = backend.name(),
                credential = backend.credential_name(),
                "No credential configured; completion calls will be rejected"
            );
        }

        Self {
            backend,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Create a gateway backed by the Gemini REST API.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(Arc::new(GeminiBackend::from_config(config)), config)
    }

    /// Fail fast when no credential is configured.
    pub fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.backend.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Configuration(self.backend.credential_name().to_string()))
        }
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Issue a single completion call.
    pub async fn generate(
        &self,
        model: &str,
        prompt: impl Into<Prompt>,
        structured: bool,
    ) -> Result<String, GatewayError> {
        self.ensure_configured()?;

        let request = CompletionRequest { model: model.to_string(), prompt: prompt.into(), structured };
        tracing::debug!(backend = self.backend.name(), model, structured, "Completion request");

        let raw = tokio::time::timeout(self.timeout, self.backend.complete(&request))
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout.as_secs()))??;

        if structured {
            Ok(unwrap_structured(&raw))
        } else {
            Ok(raw)
        }
    }

    /// Summarize a document.
    pub async fn summarize_text(&self, text: &str) -> Result<String, GatewayError> {
        self.generate(&self.text_model, prompts::summarize(text), false).await
    }

    /// Answer a question about a document.
    pub async fn answer_question(&self, document: &str, question: &str) -> Result<String, GatewayError> {
        self.generate(&self.text_model, prompts::answer_question(document, question), false).await
    }

    /// Update a checklist to comply with a regulation summary.
    pub async fn update_checklist(
        &self,
        existing_checklist: &str,
        regulation_summary: &str,
    ) -> Result<String, GatewayError> {
        let prompt = prompts::update_checklist(existing_checklist, regulation_summary);
        self.generate(&self.text_model, prompt, false).await
    }

    /// Analyze an image for hazards. A blank prompt falls back to the default.
    pub async fn analyze_image(
        &self,
        base64_image: &str,
        mime_type: &str,
        custom_prompt: &str,
    ) -> Result<String, GatewayError> {
        let instruction =
            if custom_prompt.trim().is_empty() { DEFAULT_IMAGE_PROMPT } else { custom_prompt };
        let parts = vec![Part::inline(mime_type, base64_image), Part::text(instruction)];
        self.generate(&self.image_model, parts, false).await
    }

    /// Synthesize a violations report.
    pub async fn generate_report(
        &self,
        checklist: &str,
        notes: &str,
        scope_of_work: &str,
    ) -> Result<String, GatewayError> {
        let prompt = prompts::safety_report(checklist, notes, scope_of_work);
        self.generate(&self.text_model, prompt, false).await
    }

    /// Draft an urgent email about the violations.
    pub async fn draft_urgent_email(
        &self,
        violations_summary: &str,
        recipient: &str,
    ) -> Result<String, GatewayError> {
        let recipient =
            if recipient.trim().is_empty() { DEFAULT_EMAIL_RECIPIENT } else { recipient };
        self.generate(&self.text_model, prompts::urgent_email(violations_summary, recipient), false)
            .await
    }

    /// Summarize a document with a focus instruction.
    pub async fn summarize_with_focus(
        &self,
        document: &str,
        focus: &str,
    ) -> Result<String, GatewayError> {
        self.generate(&self.text_model, prompts::focused_summary(document, focus), false).await
    }
}
