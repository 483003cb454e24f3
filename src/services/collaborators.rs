//! A3 — Collaborator clients: thin `reqwest`-backed trait objects for the
//! out-of-scope collaborator services (spec §1, SPEC_FULL A3). The
//! orchestrator depends on these traits, never on the collaborators'
//! internal algorithms — those remain external services. Grounded on the
//! `reqwest` client idiom already established in `llm_client.rs`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct SiteProfileResult {
    pub editorial_tone: Option<String>,
    pub language_level: Option<String>,
    pub target_audience: Option<Value>,
    pub activity_domains: Option<Value>,
    pub keywords: Option<Value>,
    pub style_features: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompetitorCandidate {
    pub domain: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub url: String,
    pub title: String,
    pub text: String,
    pub published_date: Option<String>,
}

#[async_trait]
pub trait EditorialAnalysisClient: Send + Sync {
    async fn analyze_site(&self, domain: &str) -> ApiResult<SiteProfileResult>;
}

#[async_trait]
pub trait CompetitorSearcher: Send + Sync {
    async fn search_competitors(&self, domain: &str, max_results: usize) -> ApiResult<Vec<CompetitorCandidate>>;
}

#[async_trait]
pub trait ArticleScraper: Send + Sync {
    async fn scrape(&self, domain: &str, max_pages: usize) -> ApiResult<Vec<ScrapedArticle>>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> ApiResult<Vec<u8>>;
}

/// Shared HTTP plumbing for the `reqwest`-backed collaborator implementations
/// below — one timeout-bounded client per collaborator per spec §5's
/// per-service timeout defaults.
struct HttpCollaborator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCollaborator {
    fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Fatal(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    async fn post_json<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("{path} request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(ApiError::Transient(format!("{path} returned {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| ApiError::Permanent(format!("{path} response malformed: {e}")))
    }
}

pub struct HttpEditorialAnalysisClient(HttpCollaborator);

impl HttpEditorialAnalysisClient {
    pub fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        Ok(Self(HttpCollaborator::new(base_url, timeout)?))
    }
}

#[async_trait]
impl EditorialAnalysisClient for HttpEditorialAnalysisClient {
    async fn analyze_site(&self, domain: &str) -> ApiResult<SiteProfileResult> {
        self.0.post_json("analyze", &serde_json::json!({ "domain": domain })).await
    }
}

pub struct HttpCompetitorSearcher(HttpCollaborator);

impl HttpCompetitorSearcher {
    pub fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        Ok(Self(HttpCollaborator::new(base_url, timeout)?))
    }
}

#[async_trait]
impl CompetitorSearcher for HttpCompetitorSearcher {
    async fn search_competitors(&self, domain: &str, max_results: usize) -> ApiResult<Vec<CompetitorCandidate>> {
        self.0
            .post_json("search", &serde_json::json!({ "domain": domain, "max_results": max_results }))
            .await
    }
}

pub struct HttpArticleScraper(HttpCollaborator);

impl HttpArticleScraper {
    pub fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        Ok(Self(HttpCollaborator::new(base_url, timeout)?))
    }
}

#[async_trait]
impl ArticleScraper for HttpArticleScraper {
    async fn scrape(&self, domain: &str, max_pages: usize) -> ApiResult<Vec<ScrapedArticle>> {
        self.0
            .post_json("scrape", &serde_json::json!({ "domain": domain, "max_pages": max_pages }))
            .await
    }
}

pub struct HttpImageGenerator(HttpCollaborator);

impl HttpImageGenerator {
    pub fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        Ok(Self(HttpCollaborator::new(base_url, timeout)?))
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, prompt: &str) -> ApiResult<Vec<u8>> {
        let url = format!("{}/generate", self.0.base_url.trim_end_matches('/'));
        let resp = self
            .0
            .http
            .post(&url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("image generation request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(ApiError::Transient(format!("image generator returned {}", resp.status())));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ApiError::Permanent(format!("image payload malformed: {e}")))
    }
}
