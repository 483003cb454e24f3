use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A persisted record of one workflow invocation, spec §3 `WorkflowExecution`.
/// Created once by its runner, mutated only by the runner that owns it;
/// terminal states (`completed`, `failed`) are never reverted — see
/// `ExecutionStore::update_execution`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WorkflowExecution {
    pub id: i64,
    pub execution_id: Uuid,
    pub workflow_type: String,
    pub domain: Option<String>,
    pub status: String,
    pub was_success: Option<bool>,
    #[schema(value_type = Object)]
    pub input_data: Json<Value>,
    #[schema(value_type = Object, nullable = true)]
    pub output_data: Option<Json<Value>>,
    pub error_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub parent_execution_id: Option<Uuid>,
    /// Resolves the "best-matching analysis" open question (SPEC_FULL §9):
    /// direct FK when the orchestrator already knows which trend pipeline run
    /// it is built on, falling back to the domain-overlap heuristic when null.
    pub trend_pipeline_execution_id: Option<Uuid>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkflowExecutionResponse {
    pub execution_id: Uuid,
    pub workflow_type: String,
    pub status: String,
    pub was_success: Option<bool>,
    pub error_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub parent_execution_id: Option<Uuid>,
}

impl From<WorkflowExecution> for WorkflowExecutionResponse {
    fn from(e: WorkflowExecution) -> Self {
        Self {
            execution_id: e.execution_id,
            workflow_type: e.workflow_type,
            status: e.status,
            was_success: e.was_success,
            error_message: e.error_message,
            start_time: e.start_time,
            end_time: e.end_time,
            duration_seconds: e.duration_seconds,
            parent_execution_id: e.parent_execution_id,
        }
    }
}

/// Append-only log row, spec §3 `AuditLog`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub id: i64,
    pub execution_id: Option<Uuid>,
    pub action: String,
    pub agent_name: String,
    pub step_name: Option<String>,
    pub status: String,
    pub message: String,
    #[schema(value_type = Object, nullable = true)]
    pub details: Option<Json<Value>>,
    pub error_traceback: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only metric row, spec §3 `PerformanceMetric`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PerformanceMetric {
    pub id: i64,
    pub execution_id: Uuid,
    pub agent_name: String,
    pub metric_type: String,
    pub metric_value: f64,
    pub metric_unit: Option<String>,
    #[schema(value_type = Object, nullable = true)]
    pub additional_data: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

/// `GetMetricsSummary` result, grouped by `metric_type`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSummary {
    pub metric_type: String,
    pub total: f64,
    pub count: i64,
    pub average: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateExecutionRequest {
    pub workflow_type: String,
    pub domain: Option<String>,
    pub input_data: Value,
    pub parent_execution_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateExecutionRequest {
    pub status: Option<String>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub was_success: Option<bool>,
}
