//! Ambient admin surface (SPEC_FULL §6 additions): operational error log and
//! per-execution performance metrics, grounded on
//! `original_source/.../api/routers/errors.py`.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ErrorLog, ErrorLogFilter, MetricsSummary};
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/errors",
    params(
        ("component" = Option<String>, Query),
        ("severity" = Option<String>, Query),
        ("domain" = Option<String>, Query),
        ("agent_name" = Option<String>, Query),
        ("execution_id" = Option<Uuid>, Query),
        ("is_resolved" = Option<bool>, Query)
    ),
    responses((status = 200, body = [ErrorLog])),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_errors(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ErrorLogFilter>,
) -> ApiResult<Json<Vec<ErrorLog>>> {
    let mut sql = String::from("SELECT * FROM error_logs WHERE 1=1");
    if filter.component.is_some() {
        sql.push_str(" AND component = ?");
    }
    if filter.severity.is_some() {
        sql.push_str(" AND severity = ?");
    }
    if filter.domain.is_some() {
        sql.push_str(" AND domain = ?");
    }
    if filter.agent_name.is_some() {
        sql.push_str(" AND agent_name = ?");
    }
    if filter.execution_id.is_some() {
        sql.push_str(" AND execution_id = ?");
    }
    if filter.is_resolved.is_some() {
        sql.push_str(" AND is_resolved = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT 200");

    let mut query = sqlx::query_as::<_, ErrorLog>(&sql);
    if let Some(v) = &filter.component {
        query = query.bind(v);
    }
    if let Some(v) = &filter.severity {
        query = query.bind(v);
    }
    if let Some(v) = &filter.domain {
        query = query.bind(v);
    }
    if let Some(v) = &filter.agent_name {
        query = query.bind(v);
    }
    if let Some(v) = filter.execution_id {
        query = query.bind(v);
    }
    if let Some(v) = filter.is_resolved {
        query = query.bind(v);
    }

    let rows = query.fetch_all(&state.db).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    post,
    path = "/api/errors/{id}/resolve",
    params(("id" = i64, Path)),
    responses(
        (status = 200, body = ErrorLog),
        (status = 404, description = "No such error log row")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn resolve_error(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ErrorLog>> {
    let row = sqlx::query_as::<_, ErrorLog>(
        "UPDATE error_logs SET is_resolved = TRUE, resolved_at = ? WHERE id = ? RETURNING *",
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("error log {id} not found")))?;

    Ok(Json(row))
}

#[utoipa::path(
    get,
    path = "/api/executions/{execution_id}/metrics",
    params(("execution_id" = Uuid, Path)),
    responses((status = 200, body = [MetricsSummary])),
    tag = "Admin"
)]
pub async fn get_execution_metrics(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MetricsSummary>>> {
    let summary = state.execution_store.get_metrics_summary(execution_id).await?;
    Ok(Json(summary))
}
