//! Gemini API integration.
//!
//! Implements the CompletionBackend trait for the Gemini `generateContent`
//! REST endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionBackend, CompletionRequest, GatewayError, Part};
use crate::core::GatewayConfig;

/// Gemini API backend.
pub struct GeminiBackend {
    client: Client,
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
}

impl GeminiBackend {
    /// Create a backend from configuration.
    ///
    /// Reads the API key from the environment variable named by
    /// `api_key_env`. A missing or blank key leaves the backend unconfigured.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());

        Self {
            client: Client::new(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create with an explicit API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Create with a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Configuration(self.api_key_env.clone()))?;

        let body = GenerateRequest::from_request(request);

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Upstream(format!("{} ({})", message, status)));
        }

        let response: GenerateResponse =
            response.json().await.map_err(|e| GatewayError::Upstream(e.to_string()))?;

        response.text().ok_or(GatewayError::EmptyResponse)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn credential_name(&self) -> &str {
        &self.api_key_env
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Gemini request structure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    fn from_request(request: &CompletionRequest) -> Self {
        let parts = request.prompt.clone().into_parts().into_iter().map(WirePart::from).collect();

        Self {
            contents: vec![Content { parts }],
            generation_config: request.structured.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<WirePart>,
}

/// A part on the wire. Exactly one field is set.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl From<Part> for WirePart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => Self { text: Some(text), inline_data: None },
            Part::InlineData { mime_type, data } => {
                Self { text: None, inline_data: Some(InlineData { mime_type, data }) }
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

/// Gemini response structure.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String =
            candidate.content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
