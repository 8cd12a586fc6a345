use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::engine::Engine;
use crate::prompt::PromptTemplate;
use crate::types::{BugType, ClassificationRequest, ClassificationResult, MARKER, UNKNOWN_LABEL};

pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

pub const RETRIES_EXHAUSTED: &str = "Error: Max retries reached for Gemini API";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Network(e.to_string())
    }
}

/// Transport for a single completion call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()?
            .text
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        parsed
            .first_text()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("No text in first candidate".to_string()))
    }
}

/// Fixed-delay retry budget for the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Pulls the answer out of free-form model output.
///
/// The label is whatever follows the first marker up to the end of that line.
/// Anything outside the taxonomy, including a missing marker, is `None`.
pub fn extract_label(text: &str) -> Option<BugType> {
    let (_, after) = text.split_once(MARKER)?;
    let answer = after.split('\n').next().unwrap_or_default().trim();
    answer.parse().ok()
}

pub struct RemoteEngine {
    provider: Arc<dyn CompletionProvider>,
    template: Arc<PromptTemplate>,
    retry: RetryPolicy,
}

impl RemoteEngine {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        template: Arc<PromptTemplate>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            template,
            retry,
        }
    }

    #[tracing::instrument(skip(self, code), fields(code_len = code.len(), max_attempts = self.retry.max_attempts))]
    pub async fn predict(&self, code: &str) -> ClassificationResult {
        let prompt = self.template.build(code);
        let max_attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!("Completion attempt {}/{}", attempt, max_attempts);

            match self.provider.complete(&prompt).await {
                Ok(text) => {
                    tracing::debug!(response_len = text.len(), "Completion received");
                    return match extract_label(&text) {
                        Some(bug) => {
                            ClassificationResult::classified(format!("{MARKER} {bug}"), bug.as_str())
                        }
                        None => {
                            tracing::warn!("No recognizable bug type in completion");
                            ClassificationResult::unknown(format!("{MARKER} {UNKNOWN_LABEL}"))
                        }
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Completion failed (attempt {}/{})", attempt, max_attempts);
                    if attempt >= max_attempts {
                        tracing::error!("Max retries reached, giving up");
                        return ClassificationResult::failed(
                            format!("{MARKER} {RETRIES_EXHAUSTED}"),
                            RETRIES_EXHAUSTED,
                        );
                    }
                    let wait = self.retry.delay;
                    tracing::info!(wait_secs = wait.as_secs(), "Sleeping before retry");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[async_trait]
impl Engine for RemoteEngine {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        self.predict(&request.code).await
    }
}
