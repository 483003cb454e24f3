//! HTTP handlers for the `/sites` surface (spec §6): kicking off editorial
//! analysis, reading the current profile and its history, and the audit
//! orchestrator's read path (`/sites/{domain}/audit`, `.../audit/status/{id}`).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::Accepted;
use crate::models::{
    AnalyzeSiteRequest, MetricComparison, SiteProfile, SiteProfileHistoryResponse,
    SiteProfileResponse, WorkflowStatus, WorkflowType,
};
use crate::services::{
    AuditStatusResponse, PendingAuditResponse, SiteAuditResponse, SiteProfileResult,
    StartAuditOutcome, UpdateExecution,
};
use crate::utils::{is_valid_domain, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/sites/analyze",
    request_body = AnalyzeSiteRequest,
    responses((status = 202, description = "Editorial analysis started", body = Accepted)),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn analyze_site(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeSiteRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if !is_valid_domain(&req.domain) {
        return Err(ApiError::validation_error(format!("invalid domain: {}", req.domain)));
    }

    let execution = state
        .execution_store
        .create_execution(
            &WorkflowType::EditorialAnalysis.to_string(),
            Some(&req.domain),
            serde_json::json!({ "domain": req.domain, "max_pages": req.max_pages }),
            WorkflowStatus::Pending,
            None,
        )
        .await?;

    let execution_id = execution.execution_id;
    let domain = req.domain.clone();
    let max_pages = req.max_pages;
    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_analysis(worker_state, execution_id, domain, max_pages).await;
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

async fn run_analysis(state: Arc<AppState>, execution_id: Uuid, domain: String, max_pages: Option<u32>) {
    if state
        .execution_store
        .update_execution(
            execution_id,
            UpdateExecution { status: Some(WorkflowStatus::Running), ..Default::default() },
        )
        .await
        .is_err()
    {
        tracing::error!(%execution_id, "failed to mark editorial analysis running");
        return;
    }

    let update = match state.editorial_client.analyze_site(&domain).await {
        Ok(result) => match persist_profile(&state, &domain, max_pages, result).await {
            Ok(()) => UpdateExecution {
                status: Some(WorkflowStatus::Completed),
                was_success: Some(true),
                output_data: Some(serde_json::json!({ "domain": domain })),
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
        tracing::error!(%execution_id, error = %e, "failed to finalize editorial analysis execution");
    }
}

async fn persist_profile(
    state: &AppState,
    domain: &str,
    max_pages: Option<u32>,
    result: SiteProfileResult,
) -> ApiResult<()> {
    let now = Utc::now();
    let language_level = result.language_level.unwrap_or_else(|| "intermediate".to_string());
    sqlx::query(
        r#"
        INSERT INTO site_profiles
            (domain, analysis_date, language_level, editorial_tone, target_audience,
             activity_domains, content_structure, keywords, style_features, pages_analyzed,
             llm_models_used, is_valid, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, NULL, TRUE, ?, ?)
        "#,
    )
    .bind(domain)
    .bind(now)
    .bind(&language_level)
    .bind(&result.editorial_tone)
    .bind(result.target_audience.map(sqlx::types::Json))
    .bind(result.activity_domains.map(sqlx::types::Json))
    .bind(result.keywords.map(sqlx::types::Json))
    .bind(result.style_features.map(sqlx::types::Json))
    .bind(max_pages.unwrap_or(0) as i32)
    .bind(now)
    .bind(now)
    .execute(&state.db)
    .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/sites/{domain}",
    params(("domain" = String, Path, description = "Client or competitor domain")),
    responses(
        (status = 200, description = "Current editorial profile", body = SiteProfileResponse),
        (status = 404, description = "No profile on file for this domain")
    ),
    tag = "Sites"
)]
pub async fn get_site(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> ApiResult<Json<SiteProfileResponse>> {
    let profile = sqlx::query_as::<_, SiteProfile>(
        "SELECT * FROM site_profiles WHERE domain = ? AND is_valid = TRUE \
         ORDER BY analysis_date DESC LIMIT 1",
    )
    .bind(&domain)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("no profile for {domain}")))?;

    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/sites/{domain}/history",
    params(
        ("domain" = String, Path),
        ("limit" = Option<i64>, Query),
        ("offset" = Option<i64>, Query)
    ),
    responses((status = 200, body = SiteProfileHistoryResponse)),
    tag = "Sites"
)]
pub async fn get_site_history(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<SiteProfileHistoryResponse>> {
    let limit = q.limit.unwrap_or(20).clamp(1, 100);
    let offset = q.offset.unwrap_or(0).max(0);

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM site_profiles WHERE domain = ? AND is_valid = TRUE")
            .bind(&domain)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, SiteProfile>(
        "SELECT * FROM site_profiles WHERE domain = ? AND is_valid = TRUE \
         ORDER BY analysis_date DESC LIMIT ? OFFSET ?",
    )
    .bind(&domain)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    // Comparisons are taken between the two most recent rows in the page,
    // not across the whole history — consistent with `/history` surfacing
    // "what changed since last time" rather than a full diff matrix.
    let metric_comparisons =
        if rows.len() >= 2 { compare_profiles(&rows[1], &rows[0]) } else { Vec::new() };

    let profiles = rows.into_iter().map(SiteProfileResponse::from).collect();

    Ok(Json(SiteProfileHistoryResponse { domain, profiles, metric_comparisons, total: total.0 }))
}

fn compare_profiles(previous: &SiteProfile, current: &SiteProfile) -> Vec<MetricComparison> {
    let pairs: [(&str, Option<Value>, Option<Value>); 2] = [
        (
            "language_level",
            Some(Value::String(previous.language_level.clone())),
            Some(Value::String(current.language_level.clone())),
        ),
        (
            "editorial_tone",
            previous.editorial_tone.clone().map(Value::String),
            current.editorial_tone.clone().map(Value::String),
        ),
    ];
    pairs
        .into_iter()
        .map(|(metric, previous, current)| {
            let changed = previous != current;
            MetricComparison { metric: metric.to_string(), previous, current, changed }
        })
        .collect()
}

/// Either branch of `StartAuditOutcome`, rendered with a different status
/// code: `200` for a cached/ready audit, `202` while one is in flight.
pub enum AuditOutcomeResponse {
    Ready(Box<SiteAuditResponse>),
    Pending(Box<PendingAuditResponse>),
}

impl IntoResponse for AuditOutcomeResponse {
    fn into_response(self) -> Response {
        match self {
            AuditOutcomeResponse::Ready(r) => (StatusCode::OK, Json(r)).into_response(),
            AuditOutcomeResponse::Pending(p) => (StatusCode::ACCEPTED, Json(p)).into_response(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/sites/{domain}/audit",
    params(("domain" = String, Path)),
    responses(
        (status = 200, description = "Audit data is ready", body = SiteAuditResponse),
        (status = 202, description = "Audit is running")
    ),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn get_site_audit(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> ApiResult<AuditOutcomeResponse> {
    let outcome = state.audit_orchestrator.start_audit(&domain).await?;
    Ok(match outcome {
        StartAuditOutcome::Ready(r) => AuditOutcomeResponse::Ready(r),
        StartAuditOutcome::Pending(p) => AuditOutcomeResponse::Pending(p),
    })
}

#[utoipa::path(
    get,
    path = "/sites/{domain}/audit/status/{execution_id}",
    params(
        ("domain" = String, Path),
        ("execution_id" = String, Path, description = "Execution id, or \"already-completed\"")
    ),
    responses((status = 200, body = AuditStatusResponse)),
    security(("bearer_auth" = [])),
    tag = "Sites"
)]
pub async fn get_audit_status(
    State(state): State<Arc<AppState>>,
    Path((domain, execution_id)): Path<(String, String)>,
) -> ApiResult<Json<AuditStatusResponse>> {
    let status = state.audit_orchestrator.get_status(&domain, &execution_id).await?;
    Ok(Json(status))
}
