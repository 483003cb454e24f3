use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A validated/candidate competitor domain for a client, persisted by
/// `competitor_search` and consumed by `AuditOrchestrator` (spec §4.9 step 4)
/// and `GapAnalyzer`. Grounded on `original_source/.../agents/competitor/scorer.py`'s
/// output shape and SPEC_FULL §3's transient `CompetitorCandidate`, made
/// durable here since `/competitors/{domain}` lists and re-validates it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Competitor {
    pub id: i64,
    pub client_domain: String,
    pub competitor_domain: String,
    pub relevance_score: f64,
    pub confidence_score: f64,
    pub semantic_similarity: Option<f64>,
    pub cross_validated: bool,
    pub validated: bool,
    pub excluded: bool,
    pub manual: bool,
    pub validation_date: Option<DateTime<Utc>>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompetitorResponse {
    pub competitor_domain: String,
    pub relevance_score: f64,
    pub confidence_score: f64,
    pub cross_validated: bool,
    pub validated: bool,
    pub excluded: bool,
    pub manual: bool,
}

impl From<Competitor> for CompetitorResponse {
    fn from(c: Competitor) -> Self {
        Self {
            competitor_domain: c.competitor_domain,
            relevance_score: c.relevance_score,
            confidence_score: c.confidence_score,
            cross_validated: c.cross_validated,
            validated: c.validated,
            excluded: c.excluded,
            manual: c.manual,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchCompetitorsRequest {
    pub domain: String,
    pub max_competitors: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCompetitorsRequest {
    /// Manual override: explicit per-domain validation/exclusion flags.
    pub validated_domains: Vec<String>,
    pub excluded_domains: Vec<String>,
}
