pub mod admin;
pub mod articles;
pub mod competitors;
pub mod executions;
pub mod health;
pub mod scraping;
pub mod sites;
pub mod trends;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Common `202 Accepted` body for every endpoint that kicks off a background
/// workflow rather than answering synchronously (spec §6).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Accepted {
    pub execution_id: Uuid,
    pub status: String,
    pub start_time: DateTime<Utc>,
}
