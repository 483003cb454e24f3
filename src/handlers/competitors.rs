//! HTTP handlers for the `/competitors` surface (spec §6): kicking off
//! competitor discovery, listing auto-validated candidates, and the manual
//! validation override.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::Accepted;
use crate::models::{
    Competitor, CompetitorResponse, SearchCompetitorsRequest, ValidateCompetitorsRequest,
    WorkflowStatus, WorkflowType,
};
use crate::services::{CompetitorCandidate, UpdateExecution};
use crate::utils::{is_valid_domain, ApiError, ApiResult};
use crate::AppState;

const MIN_MAX_COMPETITORS: u32 = 3;
const MAX_MAX_COMPETITORS: u32 = 100;

#[utoipa::path(
    post,
    path = "/competitors/search",
    request_body = SearchCompetitorsRequest,
    responses((status = 202, body = Accepted)),
    security(("bearer_auth" = [])),
    tag = "Competitors"
)]
pub async fn search_competitors(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchCompetitorsRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if !is_valid_domain(&req.domain) {
        return Err(ApiError::validation_error(format!("invalid domain: {}", req.domain)));
    }
    let max_competitors = req.max_competitors.unwrap_or(state.audit_config.max_competitors);
    if !(MIN_MAX_COMPETITORS..=MAX_MAX_COMPETITORS).contains(&max_competitors) {
        return Err(ApiError::validation_error(format!(
            "max_competitors must be in [{MIN_MAX_COMPETITORS}, {MAX_MAX_COMPETITORS}]"
        )));
    }

    let execution = state
        .execution_store
        .create_execution(
            &WorkflowType::CompetitorSearch.to_string(),
            Some(&req.domain),
            serde_json::json!({ "domain": req.domain, "max_competitors": max_competitors }),
            WorkflowStatus::Pending,
            None,
        )
        .await?;

    let execution_id = execution.execution_id;
    let domain = req.domain.clone();
    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_search(worker_state, execution_id, domain, max_competitors).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            execution_id,
            status: WorkflowStatus::Pending.to_string(),
            start_time: execution.created_at,
        }),
    ))
}

async fn run_search(state: Arc<AppState>, execution_id: Uuid, domain: String, max_competitors: u32) {
    if state
        .execution_store
        .update_execution(
            execution_id,
            UpdateExecution { status: Some(WorkflowStatus::Running), ..Default::default() },
        )
        .await
        .is_err()
    {
        tracing::error!(%execution_id, "failed to mark competitor search running");
        return;
    }

    let update = match state.competitor_searcher.search_competitors(&domain, max_competitors as usize).await {
        Ok(candidates) => match persist_competitors(&state, &domain, candidates).await {
            Ok(count) => UpdateExecution {
                status: Some(WorkflowStatus::Completed),
                was_success: Some(true),
                output_data: Some(serde_json::json!({ "competitors_found": count })),
                ..Default::default()
            },
            Err(e) => UpdateExecution {
                status: Some(WorkflowStatus::Failed),
                was_success: Some(false),
                error_message: Some(e.to_string()),
                ..Default::default()
            },
        },
        Err(e) => UpdateExecution {
            status: Some(WorkflowStatus::Failed),
            was_success: Some(false),
            error_message: Some(e.to_string()),
            ..Default::default()
        },
    };

    if let Err(e) = state.execution_store.update_execution(execution_id, update).await {
        tracing::error!(%execution_id, error = %e, "failed to finalize competitor search execution");
    }
}

/// Mirrors `AuditOrchestrator`'s own persistence: candidates from a search
/// are auto-validated (spec §9 "the source's auto-validate"), never excluded.
async fn persist_competitors(
    state: &AppState,
    client_domain: &str,
    candidates: Vec<CompetitorCandidate>,
) -> ApiResult<usize> {
    let now = Utc::now();
    for candidate in &candidates {
        sqlx::query(
            r#"
            INSERT INTO competitors
                (client_domain, competitor_domain, relevance_score, confidence_score,
                 semantic_similarity, cross_validated, validated, excluded, manual,
                 validation_date, is_valid, created_at)
            VALUES (?, ?, ?, ?, NULL, FALSE, TRUE, FALSE, FALSE, ?, TRUE, ?)
            ON CONFLICT (client_domain, competitor_domain) DO UPDATE SET
                relevance_score = excluded.relevance_score,
                confidence_score = excluded.confidence_score,
                validation_date = excluded.validation_date
            "#,
        )
        .bind(client_domain)
        .bind(&candidate.domain)
        .bind(candidate.confidence)
        .bind(candidate.confidence)
        .bind(now)
        .bind(now)
        .execute(&state.db)
        .await?;
    }
    Ok(candidates.len())
}

#[utoipa::path(
    get,
    path = "/competitors/{domain}",
    params(("domain" = String, Path)),
    responses((status = 200, body = [CompetitorResponse])),
    tag = "Competitors"
)]
pub async fn get_competitors(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> ApiResult<Json<Vec<CompetitorResponse>>> {
    let rows = sqlx::query_as::<_, Competitor>(
        "SELECT * FROM competitors WHERE client_domain = ? AND is_valid = TRUE \
         ORDER BY relevance_score DESC",
    )
    .bind(&domain)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(CompetitorResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/competitors/{domain}/validate",
    params(("domain" = String, Path)),
    request_body = ValidateCompetitorsRequest,
    responses((status = 200, body = [CompetitorResponse])),
    security(("bearer_auth" = [])),
    tag = "Competitors"
)]
pub async fn validate_competitors(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Json(req): Json<ValidateCompetitorsRequest>,
) -> ApiResult<Json<Vec<CompetitorResponse>>> {
    let now = Utc::now();
    for competitor_domain in &req.validated_domains {
        sqlx::query(
            "UPDATE competitors SET validated = TRUE, excluded = FALSE, manual = TRUE, \
             validation_date = ? WHERE client_domain = ? AND competitor_domain = ? AND is_valid = TRUE",
        )
        .bind(now)
        .bind(&domain)
        .bind(competitor_domain)
        .execute(&state.db)
        .await?;
    }
    for competitor_domain in &req.excluded_domains {
        sqlx::query(
            "UPDATE competitors SET validated = FALSE, excluded = TRUE, manual = TRUE, \
             validation_date = ? WHERE client_domain = ? AND competitor_domain = ? AND is_valid = TRUE",
        )
        .bind(now)
        .bind(&domain)
        .bind(competitor_domain)
        .execute(&state.db)
        .await?;
    }

    let rows = sqlx::query_as::<_, Competitor>(
        "SELECT * FROM competitors WHERE client_domain = ? AND is_valid = TRUE \
         ORDER BY relevance_score DESC",
    )
    .bind(&domain)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(CompetitorResponse::from).collect()))
}
