use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Scraped article, spec §3 `ClientArticle / CompetitorArticle`. The two are
/// modeled as a single table discriminated by `is_client`, since every field
/// and invariant (unique `url_hash` per domain, optional `topic_id` FK once
/// clustered, optional `qdrant_point_id` once embedded) is identical — only
/// the scope of `site_profile_id` differs (set only for client rows).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Article {
    pub id: i64,
    pub is_client: bool,
    pub site_profile_id: Option<i64>,
    pub domain: String,
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub content_text: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    #[schema(value_type = Object, nullable = true)]
    pub keywords: Option<Json<Value>>,
    pub topic_id: Option<i32>,
    pub qdrant_point_id: Option<Uuid>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArticleResponse {
    pub id: i64,
    pub domain: String,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub topic_id: Option<i32>,
}

impl From<Article> for ArticleResponse {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            domain: a.domain,
            url: a.url,
            title: a.title,
            author: a.author,
            published_date: a.published_date,
            topic_id: a.topic_id,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScrapeRequest {
    pub domains: Option<Vec<String>>,
    pub client_domain: Option<String>,
    pub max_articles_per_domain: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeTrainingRequest {
    pub domain: String,
}

/// One author's share of a domain's historical articles, by count.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorFrequency {
    pub author: String,
    pub article_count: i64,
}

/// Patterns derived over a domain's already-scraped articles (spec §6
/// `/articles/training/analyze`), purely a read over `articles` — no
/// collaborator call, hence synchronous rather than `202`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArticlePatternsResponse {
    pub domain: String,
    pub total_articles: i64,
    pub avg_title_length: f64,
    pub avg_content_length: f64,
    pub top_authors: Vec<AuthorFrequency>,
    pub distinct_topics: i64,
}
