//! LLM backend HTTP client. Grounded on the `reqwest`-based
//! `chat_completion` idiom the teacher used for its own LLM integration
//! (`jlon-stellar`'s now-removed provider client): a single POST with a
//! JSON body and bearer-less backend URL, since the editorial system talks
//! to one configured local backend rather than a multi-provider registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

pub struct LlmClient {
    http: reqwest::Client,
    backend_url: String,
}

impl LlmClient {
    pub fn new(backend_url: String, timeout: Duration) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Fatal(e.to_string()))?;
        Ok(Self { http, backend_url })
    }

    /// Sends a single-turn completion request. Network/5xx failures are
    /// `Transient` (retryable by the caller's stage logic), malformed
    /// response bodies are `Permanent` (the backend answered but not
    /// usefully).
    pub async fn complete(&self, model: &str, prompt: &str, temperature: f32) -> ApiResult<String> {
        let url = format!("{}/api/generate", self.backend_url.trim_end_matches('/'));
        let body = ChatRequest { model, prompt, temperature, stream: false };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("llm backend request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ApiError::Transient(format!("llm backend returned {status}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Permanent(format!("llm backend response malformed: {e}")))?;
        Ok(parsed.response)
    }
}
