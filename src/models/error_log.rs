use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Append-only operational error record, SPEC_FULL §3 supplement grounded on
/// `original_source/.../api/routers/errors.py`. Written by the orchestrator's
/// fatal-error path (spec §7 kind 7) in addition to `AuditLog`, and queried
/// by the ambient `/api/errors` admin surface.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ErrorLog {
    pub id: i64,
    pub component: String,
    pub severity: String,
    pub domain: Option<String>,
    pub agent_name: Option<String>,
    pub execution_id: Option<Uuid>,
    pub message: String,
    pub traceback: Option<String>,
    #[schema(value_type = Object, nullable = true)]
    pub context: Option<Json<Value>>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct ErrorLogFilter {
    pub component: Option<String>,
    pub severity: Option<String>,
    pub domain: Option<String>,
    pub agent_name: Option<String>,
    pub execution_id: Option<Uuid>,
    pub is_resolved: Option<bool>,
}
