use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Scored client-vs-competitor coverage view over one cluster, spec §3
/// `ClientCoverageAnalysis`. `EditorialGap` and `ClientStrength` (also
/// persisted below) are the same shape filtered by `coverage_score`
/// threshold (spec §4.7) — SPEC_FULL keeps them as one physical table,
/// queried through two different handlers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ClientCoverageAnalysis {
    pub id: i64,
    pub client_domain: String,
    pub topic_cluster_id: i64,
    pub client_count: i32,
    pub competitor_count: i32,
    pub avg_competitor: f64,
    pub coverage_score: f64,
    pub level: String,
    pub gap_priority_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

pub type EditorialGap = ClientCoverageAnalysis;
pub type ClientStrength = ClientCoverageAnalysis;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GapResponse {
    pub topic_cluster_id: i64,
    pub client_count: i32,
    pub competitor_count: i32,
    pub coverage_score: f64,
    pub level: String,
    pub gap_priority_score: Option<f64>,
}

impl From<ClientCoverageAnalysis> for GapResponse {
    fn from(g: ClientCoverageAnalysis) -> Self {
        Self {
            topic_cluster_id: g.topic_cluster_id,
            client_count: g.client_count,
            competitor_count: g.competitor_count,
            coverage_score: g.coverage_score,
            level: g.level,
            gap_priority_score: g.gap_priority_score,
        }
    }
}

/// One entry in a client's prioritized content plan, spec §3 `ContentRoadmap`.
/// Invariant (spec §8): `priority_order` values for a `client_domain` form
/// `{1, ..., n}` with no gaps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ContentRoadmap {
    pub id: i64,
    pub client_domain: String,
    pub gap_id: i64,
    pub recommendation_id: i64,
    pub priority_order: i32,
    pub priority_tier: String,
    pub estimated_effort: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoadmapResponse {
    pub client_domain: String,
    pub items: Vec<ContentRoadmap>,
}
