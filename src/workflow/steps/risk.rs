//! Step 3: detect risks in a worksite image.

use std::path::Path;

use uuid::Uuid;

use crate::audit::{actions, NewAuditEntry};
use crate::gateway::DEFAULT_IMAGE_PROMPT;
use crate::ingest::{self, SourceFile};
use crate::workflow::{
    ActionKind, SiteImage, WorkflowContext, WorkflowError, WorkflowResult,
};

/// Image types the vision model accepts.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Clone)]
pub struct RiskStep {
    ctx: WorkflowContext,
}

impl RiskStep {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Analyze an image for hazards and make it the current site image.
    ///
    /// `prompt` replaces the default hazard prompt when given and not blank.
    pub async fn analyze(&self, path: &Path, prompt: Option<&str>) -> WorkflowResult<SiteImage> {
        self.ctx
            .run(async {
                let file = SourceFile::new(path);
                if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
                    return Err(WorkflowError::validation(format!(
                        "Unsupported image type '{}'. Please upload a PNG, JPEG or WEBP image.",
                        file.mime_type
                    )));
                }

                let prompt = prompt.filter(|p| !p.trim().is_empty()).unwrap_or(DEFAULT_IMAGE_PROMPT);
                let token = self.ctx.state.begin(ActionKind::AnalyzeImage);
                let base64 = ingest::read_as_base64(path).await?;
                let analysis =
                    self.ctx.gateway.analyze_image(&base64, &file.mime_type, prompt).await?;

                let image = SiteImage {
                    id: Uuid::new_v4().to_string(),
                    file_name: file.file_name.clone(),
                    base64,
                    mime_type: file.mime_type.clone(),
                    analysis,
                };
                self.ctx
                    .state
                    .commit(&token, |s| s.site_image = Some(image.clone()))
                    .ok_or(WorkflowError::Superseded(token.kind))?;

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::IMAGE_RISK_ANALYZED)
                        .detail("page", "RiskDetection")
                        .detail("fileName", file.file_name)
                        .detail("mimeType", file.mime_type)
                        .detail("analysisLength", image.analysis.len())
                        .detail("promptUsed", prompt),
                );
                Ok(image)
            })
            .await
    }

    /// Append the current image analysis to the inspection notes.
    pub async fn promote(&self) -> WorkflowResult<SiteImage> {
        self.ctx
            .run(async {
                let image = self
                    .ctx
                    .state
                    .site_image()
                    .filter(|img| !img.analysis.is_empty())
                    .ok_or_else(|| {
                        WorkflowError::validation("No image analysis available to add to notes.")
                    })?;

                self.ctx.state.append_image_to_notes(&image);

                self.ctx.audit.record(
                    NewAuditEntry::now(actions::IMAGE_ANALYSIS_APPENDED_TO_NOTES)
                        .detail("page", "RiskDetection")
                        .detail("fileName", image.file_name.as_str())
                        .detail("analysisLength", image.analysis.len()),
                );
                Ok(image)
            })
            .await
    }

    /// Drop the current image; an analysis still in flight is discarded.
    pub fn clear(&self) {
        self.ctx.state.set_site_image(None);
    }
}
