//! HTTP handler for `POST /scraping/scrape` (spec §6): client-site or
//! competitor-set scraping, persisting into the shared `articles` table.

use axum::http::StatusCode;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::Accepted;
use crate::models::{ScrapeRequest, WorkflowStatus, WorkflowType};
use crate::services::{ScrapedArticle, UpdateExecution};
use crate::utils::{is_valid_domain, ApiError, ApiResult};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/scraping/scrape",
    request_body = ScrapeRequest,
    responses((status = 202, body = Accepted)),
    security(("bearer_auth" = [])),
    tag = "Scraping"
)]
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    let (workflow_type, is_client, domains) = match (&req.client_domain, &req.domains) {
        (Some(client_domain), _) => {
            if !is_valid_domain(client_domain) {
                return Err(ApiError::validation_error(format!("invalid domain: {client_domain}")));
            }
            (WorkflowType::ClientScraping, true, vec![client_domain.clone()])
        }
        (None, Some(domains)) if !domains.is_empty() => {
            for d in domains {
                if !is_valid_domain(d) {
                    return Err(ApiError::validation_error(format!("invalid domain: {d}")));
                }
            }
            (WorkflowType::Scraping, false, domains.clone())
        }
        _ => return Err(ApiError::validation_error("either client_domain or domains must be set")),
    };
    let max_articles_per_domain = req.max_articles_per_domain.unwrap_or(50);

    let single_domain = if domains.len() == 1 { Some(domains[0].as_str()) } else { None };
    let execution = state
        .execution_store
        .create_execution(
            &workflow_type.to_string(),
            single_domain,
            serde_json::json!({ "domains": domains, "max_articles_per_domain": max_articles_per_domain }),
            WorkflowStatus::Pending,
            None,
        )
        .await?;

    let execution_id = execution.execution_id;
    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_scrape(worker_state, execution_id, workflow_type, is_client, domains, max_articles_per_domain).await;
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

async fn run_scrape(
    state: Arc<AppState>,
    execution_id: Uuid,
    workflow_type: WorkflowType,
    is_client: bool,
    domains: Vec<String>,
    max_articles_per_domain: u32,
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
        tracing::error!(%execution_id, %workflow_type, "failed to mark scraping workflow running");
        return;
    }

    let mut total_inserted = 0usize;
    let mut failure: Option<ApiError> = None;
    for domain in &domains {
        match state.scraper.scrape(domain, max_articles_per_domain as usize).await {
            Ok(articles) => match persist_articles(&state, domain, is_client, articles).await {
                Ok(inserted) => total_inserted += inserted,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            },
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let update = match failure {
        None => UpdateExecution {
            status: Some(WorkflowStatus::Completed),
            was_success: Some(true),
            output_data: Some(serde_json::json!({ "articles_inserted": total_inserted })),
            ..Default::default()
        },
        Some(e) => UpdateExecution {
            status: Some(WorkflowStatus::Failed),
            was_success: Some(false),
            error_message: Some(e.to_string()),
            output_data: Some(serde_json::json!({ "articles_inserted": total_inserted })),
            ..Default::default()
        },
    };

    if let Err(e) = state.execution_store.update_execution(execution_id, update).await {
        tracing::error!(%execution_id, error = %e, "failed to finalize scraping execution");
    }
}

async fn persist_articles(
    state: &AppState,
    domain: &str,
    is_client: bool,
    articles: Vec<ScrapedArticle>,
) -> ApiResult<usize> {
    let now = Utc::now();
    let mut inserted = 0usize;
    for article in &articles {
        let published_date: Option<DateTime<Utc>> = article
            .published_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (is_client, site_profile_id, domain, url, url_hash, title, content_text,
                 author, published_date, keywords, topic_id, qdrant_point_id, is_valid, created_at)
            VALUES (?, NULL, ?, ?, ?, ?, ?, NULL, ?, NULL, NULL, NULL, TRUE, ?)
            ON CONFLICT (domain, url_hash) DO NOTHING
            "#,
        )
        .bind(is_client)
        .bind(domain)
        .bind(&article.url)
        .bind(url_hash(&article.url))
        .bind(&article.title)
        .bind(&article.text)
        .bind(published_date)
        .bind(now)
        .execute(&state.db)
        .await?;
        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Same stable per-URL hash as `AuditOrchestrator::persist_articles` — both
/// write into the shared `articles` table and must agree on `url_hash`.
fn url_hash(url: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
