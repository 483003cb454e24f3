//! HTTP handler for `GET /executions/{execution_id}` (spec §6): generic
//! read of any `WorkflowExecution` regardless of `workflow_type`.

use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::WorkflowExecutionResponse;
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/executions/{execution_id}",
    params(("execution_id" = Uuid, Path)),
    responses(
        (status = 200, body = WorkflowExecutionResponse),
        (status = 404, description = "No such execution")
    ),
    tag = "Executions"
)]
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowExecutionResponse>> {
    let execution = state
        .execution_store
        .get_execution(execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("execution {execution_id} not found")))?;

    Ok(Json(execution.into()))
}
