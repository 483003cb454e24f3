//! Editorial Engine Library
//!
//! This library contains all the core modules for the editorial
//! competitive-intelligence engine: the C1-C8 trend-discovery pipeline, the
//! C9 audit orchestrator, and the ambient HTTP/DB/config/auth stack around
//! them.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::{
    ArticleScraper, AuditOrchestrator, CompetitorSearcher, EditorialAnalysisClient, GpuModelOwner,
    TrendPipeline,
};
pub use utils::JwtUtil;

/// Application shared state.
///
/// Design Philosophy: Keep it simple - Rust's type system IS our DI
/// container. All services are wrapped in Arc for cheap cloning and thread
/// safety.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_util: Arc<JwtUtil>,
    pub audit_config: services::AuditOrchestratorConfig,

    pub trend_pipeline: Arc<TrendPipeline>,
    pub audit_orchestrator: Arc<AuditOrchestrator>,
    pub execution_store: Arc<services::ExecutionStore>,
    pub vector_store: Arc<services::VectorStore>,
    pub gpu_owner: Arc<GpuModelOwner>,

    /// Direct collaborator clients, used by the standalone `/sites/analyze`,
    /// `/competitors/search` and `/scraping/scrape` endpoints. The same
    /// collaborators are also held by `audit_orchestrator`, which drives them
    /// as part of a full audit rather than in response to a single request.
    pub editorial_client: Arc<dyn EditorialAnalysisClient>,
    pub competitor_searcher: Arc<dyn CompetitorSearcher>,
    pub scraper: Arc<dyn ArticleScraper>,
}
