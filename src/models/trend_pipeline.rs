use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One run of the four-stage trend pipeline, spec §3 `TrendPipelineExecution`.
/// Stage status transitions are monotone (spec §8): `pending -> in_progress ->
/// {completed, failed, skipped}`, enforced by `TrendPipeline::transition_stage`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TrendPipelineExecution {
    pub id: i64,
    pub execution_id: Uuid,
    pub client_domain: Option<String>,
    #[schema(value_type = Object)]
    pub domains_analyzed: Json<Value>,
    pub time_window_days: i32,
    pub stage_1_status: String,
    pub stage_2_status: String,
    pub stage_3_status: String,
    pub stage_4_status: String,
    pub total_articles: i32,
    pub total_clusters: i32,
    pub total_outliers: i32,
    pub total_recommendations: i32,
    pub total_gaps: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineStage {
    EmbeddingAndClustering = 1,
    TemporalAnalysis = 2,
    LlmEnrichment = 3,
    GapAnalysis = 4,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeTrendsRequest {
    pub client_domain: Option<String>,
    pub domains: Option<Vec<String>>,
    pub time_window_days: Option<i32>,
    pub min_topic_size: Option<usize>,
    pub nr_topics: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendPipelineExecutionResponse {
    pub execution_id: Uuid,
    pub client_domain: Option<String>,
    pub stage_1_status: String,
    pub stage_2_status: String,
    pub stage_3_status: String,
    pub stage_4_status: String,
    pub total_clusters: i32,
    pub total_outliers: i32,
    pub total_recommendations: i32,
    pub total_gaps: i32,
}

impl From<TrendPipelineExecution> for TrendPipelineExecutionResponse {
    fn from(e: TrendPipelineExecution) -> Self {
        Self {
            execution_id: e.execution_id,
            client_domain: e.client_domain,
            stage_1_status: e.stage_1_status,
            stage_2_status: e.stage_2_status,
            stage_3_status: e.stage_3_status,
            stage_4_status: e.stage_4_status,
            total_clusters: e.total_clusters,
            total_outliers: e.total_outliers,
            total_recommendations: e.total_recommendations,
            total_gaps: e.total_gaps,
        }
    }
}
