//! HTTP handlers for the `/trends` surface (spec §6): kicking off the
//! four-stage trend pipeline and reading back its clusters/outliers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::Accepted;
use crate::models::{
    AnalyzeTrendsRequest, ArticleRecommendation, TopicCluster, TopicClusterWithMetrics,
    TopicOutlier, TopicTemporalMetrics, TrendAnalysis, TrendPipelineExecution, TrendsTopicsResponse,
    WorkflowStatus, WorkflowType,
};
use crate::services::{TrendPipelineRequest, UpdateExecution};
use crate::utils::{is_valid_domain, ApiError, ApiResult};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/trends/analyze",
    request_body = AnalyzeTrendsRequest,
    responses((status = 202, body = Accepted)),
    security(("bearer_auth" = [])),
    tag = "Trends"
)]
pub async fn analyze_trends(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeTrendsRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    let mut domains = req.domains.clone().unwrap_or_default();
    if let Some(client_domain) = &req.client_domain {
        if !domains.iter().any(|d| d == client_domain) {
            domains.push(client_domain.clone());
        }
    }
    if domains.is_empty() {
        return Err(ApiError::validation_error("either client_domain or domains must be set"));
    }
    for d in &domains {
        if !is_valid_domain(d) {
            return Err(ApiError::validation_error(format!("invalid domain: {d}")));
        }
    }
    let time_window_days = req.time_window_days.unwrap_or(state.audit_config.trend_time_window_days);

    let execution = state
        .execution_store
        .create_execution(
            &WorkflowType::TrendPipeline.to_string(),
            req.client_domain.as_deref(),
            serde_json::json!({ "domains": domains, "time_window_days": time_window_days }),
            WorkflowStatus::Pending,
            None,
        )
        .await?;

    let execution_id = execution.execution_id;
    let client_domain = req.client_domain.clone();
    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_trend_pipeline(worker_state, execution_id, client_domain, domains, time_window_days).await;
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

async fn run_trend_pipeline(
    state: Arc<AppState>,
    execution_id: Uuid,
    client_domain: Option<String>,
    domains: Vec<String>,
    time_window_days: i32,
) {
    if state
        .execution_store
        .update_execution(
            execution_id,
            UpdateExecution { status: Some(WorkflowStatus::Running), ..Default::default() },
        )
        .await
        .is_err()
    {
        tracing::error!(%execution_id, "failed to mark trend pipeline running");
        return;
    }

    let request = TrendPipelineRequest {
        client_domain,
        domains,
        time_window_days: time_window_days as i64,
        skip_llm: false,
        skip_gap_analysis: false,
    };

    let update = match state.trend_pipeline.execute(request).await {
        Ok(pipeline_execution) => {
            // Resolves the "best-matching analysis" FK directly (SPEC_FULL
            // §9 open question) rather than leaving callers to the
            // domain-overlap heuristic, since this workflow knows exactly
            // which `TrendPipelineExecution` it drove.
            if let Err(e) = sqlx::query(
                "UPDATE workflow_executions SET trend_pipeline_execution_id = ? WHERE execution_id = ?",
            )
            .bind(pipeline_execution.execution_id)
            .bind(execution_id)
            .execute(&state.db)
            .await
            {
                tracing::warn!(%execution_id, error = %e, "failed to link trend_pipeline_execution_id");
            }
            UpdateExecution {
                status: Some(WorkflowStatus::Completed),
                was_success: Some(true),
                output_data: Some(serde_json::json!({ "analysis_id": pipeline_execution.execution_id })),
                ..Default::default()
            }
        }
        Err(e) => UpdateExecution {
            status: Some(WorkflowStatus::Failed),
            was_success: Some(false),
            error_message: Some(e.to_string()),
            ..Default::default()
        },
    };

    if let Err(e) = state.execution_store.update_execution(execution_id, update).await {
        tracing::error!(%execution_id, error = %e, "failed to finalize trend pipeline execution");
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub analysis_id: Option<Uuid>,
    pub client_domain: Option<String>,
    pub domain: Option<String>,
}

#[utoipa::path(
    get,
    path = "/trends/topics",
    params(
        ("analysis_id" = Option<Uuid>, Query),
        ("client_domain" = Option<String>, Query),
        ("domain" = Option<String>, Query)
    ),
    responses((status = 200, body = TrendsTopicsResponse)),
    tag = "Trends"
)]
pub async fn get_trends_topics(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TopicsQuery>,
) -> ApiResult<Json<TrendsTopicsResponse>> {
    let analysis_id = resolve_analysis_id(&state, &q).await?;

    let execution = sqlx::query_as::<_, TrendPipelineExecution>(
        "SELECT * FROM trend_pipeline_executions WHERE execution_id = ? AND is_valid = TRUE",
    )
    .bind(analysis_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("no trend analysis {analysis_id}")))?;

    let clusters = sqlx::query_as::<_, TopicCluster>(
        "SELECT * FROM topic_clusters WHERE analysis_id = ? AND is_valid = TRUE ORDER BY topic_id",
    )
    .bind(analysis_id)
    .fetch_all(&state.db)
    .await?;

    let outliers = sqlx::query_as::<_, TopicOutlier>(
        "SELECT * FROM topic_outliers WHERE analysis_id = ? ORDER BY created_at",
    )
    .bind(analysis_id)
    .fetch_all(&state.db)
    .await?;

    let mut cluster_responses = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let temporal = sqlx::query_as::<_, TopicTemporalMetrics>(
            "SELECT * FROM topic_temporal_metrics WHERE topic_cluster_id = ? \
             ORDER BY window_end DESC LIMIT 1",
        )
        .bind(cluster.id)
        .fetch_optional(&state.db)
        .await?;

        let analysis = sqlx::query_as::<_, TrendAnalysis>(
            "SELECT * FROM trend_analyses WHERE topic_cluster_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(cluster.id)
        .fetch_optional(&state.db)
        .await?;

        let recommendations = sqlx::query_as::<_, ArticleRecommendation>(
            "SELECT * FROM article_recommendations WHERE topic_cluster_id = ? \
             ORDER BY differentiation_score DESC",
        )
        .bind(cluster.id)
        .fetch_all(&state.db)
        .await?;

        cluster_responses.push(TopicClusterWithMetrics {
            cluster: cluster.into(),
            temporal,
            analysis,
            recommendations,
        });
    }

    Ok(Json(TrendsTopicsResponse {
        analysis_id,
        client_domain: execution.client_domain,
        clusters: cluster_responses,
        outliers,
    }))
}

async fn resolve_analysis_id(state: &AppState, q: &TopicsQuery) -> ApiResult<Uuid> {
    if let Some(id) = q.analysis_id {
        return Ok(id);
    }
    if let Some(client_domain) = &q.client_domain {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT execution_id FROM trend_pipeline_executions \
             WHERE client_domain = ? AND is_valid = TRUE ORDER BY created_at DESC LIMIT 1",
        )
        .bind(client_domain)
        .fetch_optional(&state.db)
        .await?;
        return row
            .map(|(id,)| id)
            .ok_or_else(|| ApiError::not_found(format!("no trend analysis for {client_domain}")));
    }
    if let Some(domain) = &q.domain {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT execution_id FROM trend_pipeline_executions \
             WHERE is_valid = TRUE AND EXISTS ( \
                 SELECT 1 FROM json_each(domains_analyzed) WHERE value = ? \
             ) ORDER BY created_at DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&state.db)
        .await?;
        return row
            .map(|(id,)| id)
            .ok_or_else(|| ApiError::not_found(format!("no trend analysis covering {domain}")));
    }
    Err(ApiError::validation_error("one of analysis_id, client_domain, domain is required"))
}
