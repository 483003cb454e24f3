//! HTTP handler for `POST /articles/training/analyze` (spec §6): surfaces
//! patterns over a domain's already-scraped articles. Purely a read over
//! `articles` — there is no collaborator call here, so this answers
//! synchronously rather than `202`.

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::models::{AnalyzeTrainingRequest, ArticlePatternsResponse, AuthorFrequency};
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/articles/training/analyze",
    request_body = AnalyzeTrainingRequest,
    responses((status = 200, body = ArticlePatternsResponse)),
    security(("bearer_auth" = [])),
    tag = "Articles"
)]
pub async fn analyze_training_patterns(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeTrainingRequest>,
) -> ApiResult<Json<ArticlePatternsResponse>> {
    let totals: (i64, f64, f64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(AVG(LENGTH(title)), 0.0),
            COALESCE(AVG(LENGTH(content_text)), 0.0)
        FROM articles
        WHERE domain = ? AND is_valid = TRUE
        "#,
    )
    .bind(&req.domain)
    .fetch_one(&state.db)
    .await?;

    if totals.0 == 0 {
        return Err(ApiError::not_found(format!("no articles on file for {}", req.domain)));
    }

    let top_authors: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT author, COUNT(*) as article_count
        FROM articles
        WHERE domain = ? AND is_valid = TRUE AND author IS NOT NULL
        GROUP BY author
        ORDER BY article_count DESC
        LIMIT 10
        "#,
    )
    .bind(&req.domain)
    .fetch_all(&state.db)
    .await?;

    let distinct_topics: (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT topic_id) FROM articles \
         WHERE domain = ? AND is_valid = TRUE AND topic_id IS NOT NULL",
    )
    .bind(&req.domain)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ArticlePatternsResponse {
        domain: req.domain,
        total_articles: totals.0,
        avg_title_length: totals.1,
        avg_content_length: totals.2,
        top_authors: top_authors
            .into_iter()
            .map(|(author, article_count)| AuthorFrequency { author, article_count })
            .collect(),
        distinct_topics: distinct_topics.0,
    }))
}
