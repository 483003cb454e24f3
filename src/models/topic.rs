use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A density-coherent cluster of article embeddings, spec §3 `TopicCluster`.
/// `topic_id = -1` is the reserved outlier bucket. Invariant (spec §8):
/// `size == document_ids.indices.len()`, checked by `Clusterer::persist`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TopicCluster {
    pub id: i64,
    pub analysis_id: Uuid,
    pub topic_id: i32,
    pub label: String,
    #[schema(value_type = Object)]
    pub top_terms: Json<Value>,
    pub size: i32,
    #[schema(value_type = Object)]
    pub document_ids: Json<Value>,
    pub centroid_vector_id: Option<Uuid>,
    pub coherence_score: f64,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopicClusterResponse {
    pub topic_id: i32,
    pub label: String,
    pub top_terms: Value,
    pub size: i32,
    pub coherence_score: f64,
}

impl From<TopicCluster> for TopicClusterResponse {
    fn from(c: TopicCluster) -> Self {
        Self {
            topic_id: c.topic_id,
            label: c.label,
            top_terms: c.top_terms.0,
            size: c.size,
            coherence_score: c.coherence_score,
        }
    }
}

/// A point that density clustering assigned to the `-1` bucket, spec §3
/// `TopicOutlier`. Persisted rather than dropped (spec §4.4 "Outlier handling").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TopicOutlier {
    pub id: i64,
    pub analysis_id: Uuid,
    pub document_id: Uuid,
    pub article_id: Option<i64>,
    pub potential_category: String,
    pub embedding_distance: f64,
    pub created_at: DateTime<Utc>,
}

/// Windowed metrics for one cluster, spec §3 `TopicTemporalMetrics`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TopicTemporalMetrics {
    pub id: i64,
    pub topic_cluster_id: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub volume: i32,
    pub velocity: f64,
    pub freshness_ratio: f64,
    pub source_diversity: i32,
    pub cohesion_score: f64,
    pub potential_score: f64,
    pub drift_detected: bool,
    pub drift_distance: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// LLM-synthesized narrative for a cluster, spec §3 `TrendAnalysis`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TrendAnalysis {
    pub id: i64,
    pub topic_cluster_id: i64,
    pub synthesis: String,
    #[schema(value_type = Object)]
    pub saturated_angles: Json<Value>,
    #[schema(value_type = Object)]
    pub opportunities: Json<Value>,
    pub llm_model_used: Option<String>,
    pub processing_time_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A proposed article for a cluster, spec §3 `ArticleRecommendation`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ArticleRecommendation {
    pub id: i64,
    pub topic_cluster_id: i64,
    pub title: String,
    pub hook: Option<String>,
    #[schema(value_type = Object)]
    pub outline: Json<Value>,
    pub differentiation_score: f64,
    pub effort_level: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendsTopicsResponse {
    pub analysis_id: Uuid,
    pub client_domain: Option<String>,
    pub clusters: Vec<TopicClusterWithMetrics>,
    pub outliers: Vec<TopicOutlier>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopicClusterWithMetrics {
    #[serde(flatten)]
    pub cluster: TopicClusterResponse,
    pub temporal: Option<TopicTemporalMetrics>,
    pub analysis: Option<TrendAnalysis>,
    pub recommendations: Vec<ArticleRecommendation>,
}
