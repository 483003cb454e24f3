use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Editorial profile of a client or competitor domain, spec §3 `SiteProfile`.
/// One row is current per domain; prior analyses are retained (not replaced
/// in place) so `/sites/{domain}/history` can diff metrics across runs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SiteProfile {
    pub id: i64,
    pub domain: String,
    pub analysis_date: DateTime<Utc>,
    pub language_level: String,
    pub editorial_tone: Option<String>,
    #[schema(value_type = Object, nullable = true)]
    pub target_audience: Option<Json<Value>>,
    #[schema(value_type = Object, nullable = true)]
    pub activity_domains: Option<Json<Value>>,
    #[schema(value_type = Object, nullable = true)]
    pub content_structure: Option<Json<Value>>,
    #[schema(value_type = Object, nullable = true)]
    pub keywords: Option<Json<Value>>,
    #[schema(value_type = Object, nullable = true)]
    pub style_features: Option<Json<Value>>,
    pub pages_analyzed: i32,
    #[schema(value_type = Object, nullable = true)]
    pub llm_models_used: Option<Json<Value>>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const LANGUAGE_LEVELS: [&str; 4] = ["simple", "intermediate", "advanced", "expert"];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteProfileResponse {
    pub domain: String,
    pub analysis_date: DateTime<Utc>,
    pub language_level: String,
    pub editorial_tone: Option<String>,
    pub target_audience: Option<Value>,
    pub activity_domains: Option<Value>,
    pub content_structure: Option<Value>,
    pub keywords: Option<Value>,
    pub style_features: Option<Value>,
    pub pages_analyzed: i32,
}

impl From<SiteProfile> for SiteProfileResponse {
    fn from(p: SiteProfile) -> Self {
        Self {
            domain: p.domain,
            analysis_date: p.analysis_date,
            language_level: p.language_level,
            editorial_tone: p.editorial_tone,
            target_audience: p.target_audience.map(|j| j.0),
            activity_domains: p.activity_domains.map(|j| j.0),
            content_structure: p.content_structure.map(|j| j.0),
            keywords: p.keywords.map(|j| j.0),
            style_features: p.style_features.map(|j| j.0),
            pages_analyzed: p.pages_analyzed,
        }
    }
}

/// A single prior-vs-current metric comparison surfaced by `/history`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricComparison {
    pub metric: String,
    pub previous: Option<Value>,
    pub current: Option<Value>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteProfileHistoryResponse {
    pub domain: String,
    pub profiles: Vec<SiteProfileResponse>,
    pub metric_comparisons: Vec<MetricComparison>,
    pub total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeSiteRequest {
    pub domain: String,
    pub max_pages: Option<u32>,
}
