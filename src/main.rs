use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use editorial_engine::config::{Command, CommandLineArgs, Config};
use editorial_engine::db;
use editorial_engine::models;
use editorial_engine::services::{
    self, AuditOrchestrator, AuditOrchestratorConfig, Clusterer, ClusteringConfig,
    CoverageThresholds, EffortDistribution, EmbeddingFetcher, ExecutionStore, GapAnalyzer,
    GpuModelOwner, HttpArticleScraper, HttpCompetitorSearcher, HttpEditorialAnalysisClient,
    LlmClient, LlmEnricher, PriorityDistribution, PriorityWeights, TemporalAnalyzer,
    TrendPipeline, TrendPipelineConfig, VectorStore,
};
use editorial_engine::utils::JwtUtil;
use editorial_engine::{handlers, middleware, AppState};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::sites::analyze_site,
        handlers::sites::get_site,
        handlers::sites::get_site_history,
        handlers::sites::get_site_audit,
        handlers::sites::get_audit_status,

        handlers::competitors::search_competitors,
        handlers::competitors::get_competitors,
        handlers::competitors::validate_competitors,

        handlers::scraping::scrape,

        handlers::trends::analyze_trends,
        handlers::trends::get_trends_topics,

        handlers::articles::analyze_training_patterns,

        handlers::executions::get_execution,

        handlers::admin::list_errors,
        handlers::admin::resolve_error,
        handlers::admin::get_execution_metrics,
    ),
    components(
        schemas(
            handlers::Accepted,
            models::AnalyzeSiteRequest,
            models::SiteProfile,
            models::SiteProfileResponse,
            models::SiteProfileHistoryResponse,
            models::MetricComparison,
            models::SearchCompetitorsRequest,
            models::ValidateCompetitorsRequest,
            models::Competitor,
            models::CompetitorResponse,
            models::ScrapeRequest,
            models::AnalyzeTrendsRequest,
            models::TrendsTopicsResponse,
            models::TopicClusterWithMetrics,
            models::TopicClusterResponse,
            models::TopicOutlier,
            models::TopicTemporalMetrics,
            models::TrendAnalysis,
            models::ArticleRecommendation,
            models::AnalyzeTrainingRequest,
            models::ArticlePatternsResponse,
            models::AuthorFrequency,
            models::WorkflowExecutionResponse,
            models::ErrorLog,
            models::MetricsSummary,
            services::DataStatus,
            services::WorkflowStepStatus,
            services::PendingAuditResponse,
            services::SiteAuditResponse,
            services::AuditStatusResponse,
        )
    ),
    tags(
        (name = "Sites", description = "Editorial site-profile analysis and audits"),
        (name = "Competitors", description = "Competitor discovery and validation"),
        (name = "Scraping", description = "Article scraping"),
        (name = "Trends", description = "Four-stage trend-discovery pipeline"),
        (name = "Articles", description = "Historical article pattern analysis"),
        (name = "Executions", description = "Workflow execution lookups"),
        (name = "Admin", description = "Operational error log and metrics"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args = CommandLineArgs::parse();
    let config = Config::load(&cli_args)?;

    init_logging(&config);

    match cli_args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            db::create_pool(&config.database.url).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
        Command::Audit { domain } => run_audit(config, domain).await,
        Command::Token { subject } => issue_token(&config, &subject),
    }
}

fn init_logging(config: &Config) {
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("editorial-engine.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard: logging must outlive this function, and the
        // process only ever exits by returning from `main`.
        Box::leak(Box::new(_guard));
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Builds every service in `AppState` from `config`. Shared by `serve` and
/// the `audit` CLI subcommand so both wire the same collaborator stack.
async fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("database pool created");

    let jwt_util = Arc::new(JwtUtil::new(&config.auth.jwt_secret));
    let execution_store = Arc::new(ExecutionStore::new(pool.clone()));

    let vector_store = Arc::new(VectorStore::connect(
        &config.vector_store.url,
        config.vector_store.api_key.as_deref(),
        Duration::from_secs(config.vector_store.timeout_secs),
    )?);
    tracing::info!("vector store client connected");

    let gpu_owner = GpuModelOwner::new(Duration::from_secs(config.gpu.settling_delay_secs));

    let embedding_fetcher = EmbeddingFetcher::new(Arc::clone(&vector_store), true);
    let clusterer = Clusterer::new(ClusteringConfig::default());
    let temporal_analyzer = TemporalAnalyzer::new(Default::default(), Default::default());

    let llm_client =
        LlmClient::new(config.llm.backend_url.clone(), Duration::from_secs(config.llm.timeout_secs))?;
    let llm_enricher = Some(Arc::new(LlmEnricher::new(
        Arc::new(llm_client),
        config.llm.model.clone(),
        Arc::clone(&gpu_owner),
    )));

    let gap_analyzer = GapAnalyzer::new(
        CoverageThresholds::default(),
        PriorityWeights::default(),
        PriorityDistribution { high: 5, medium: 10, low: usize::MAX },
        EffortDistribution::default(),
        20,
        0.5,
    );

    let trend_pipeline = Arc::new(TrendPipeline::new(
        pool.clone(),
        Arc::clone(&vector_store),
        embedding_fetcher,
        clusterer,
        temporal_analyzer,
        llm_enricher,
        gap_analyzer,
        TrendPipelineConfig::default(),
        Arc::clone(&execution_store),
    ));

    let collaborators_timeout = Duration::from_secs(config.collaborators.timeout_secs);
    let editorial_client: Arc<dyn services::EditorialAnalysisClient> = Arc::new(
        HttpEditorialAnalysisClient::new(config.collaborators.editorial_analysis_url.clone(), collaborators_timeout)?,
    );
    let competitor_searcher: Arc<dyn services::CompetitorSearcher> = Arc::new(
        HttpCompetitorSearcher::new(config.collaborators.competitor_search_url.clone(), collaborators_timeout)?,
    );
    let scraper: Arc<dyn services::ArticleScraper> =
        Arc::new(HttpArticleScraper::new(config.collaborators.scraper_url.clone(), collaborators_timeout)?);

    let audit_config = AuditOrchestratorConfig {
        min_client_articles: config.audit.min_client_articles_for_audit,
        min_competitor_articles: config.audit.min_competitor_articles_for_audit,
        max_competitors: config.audit.max_competitors,
        max_pages_per_domain: config.audit.max_pages_per_domain,
        trend_time_window_days: config.audit.trend_time_window_days,
    };

    let audit_orchestrator = AuditOrchestrator::new(
        pool.clone(),
        Arc::clone(&execution_store),
        Arc::clone(&editorial_client),
        Arc::clone(&competitor_searcher),
        Arc::clone(&scraper),
        Arc::clone(&trend_pipeline),
        audit_config.clone(),
    );

    Ok(AppState {
        db: pool,
        jwt_util,
        audit_config,
        trend_pipeline,
        audit_orchestrator,
        execution_store,
        vector_store,
        gpu_owner,
        editorial_client,
        competitor_searcher,
        scraper,
    })
}

async fn run_audit(config: Config, domain: String) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config).await?;
    match state.audit_orchestrator.start_audit(&domain).await {
        Ok(outcome) => {
            let json = match outcome {
                services::StartAuditOutcome::Ready(response) => serde_json::to_string_pretty(&response)?,
                services::StartAuditOutcome::Pending(response) => serde_json::to_string_pretty(&response)?,
            };
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("audit failed: {e}");
            std::process::exit(1);
        }
    }
}

fn issue_token(config: &Config, subject: &str) -> Result<(), Box<dyn std::error::Error>> {
    let jwt_util = JwtUtil::new(&config.auth.jwt_secret);
    let ttl = editorial_engine::config::parse_duration(&config.auth.jwt_expires_in)
        .map_err(|e| format!("invalid auth.jwt_expires_in: {e}"))?;
    let token = jwt_util.issue_token(subject, chrono::Duration::from_std(ttl)?)?;
    println!("{token}");
    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config).await?;
    let jwt_util = Arc::clone(&state.jwt_util);
    let state = Arc::new(state);

    let public_routes = Router::new()
        .route("/sites/:domain", get(handlers::sites::get_site))
        .route("/sites/:domain/history", get(handlers::sites::get_site_history))
        .route("/competitors/:domain", get(handlers::competitors::get_competitors))
        .route("/trends/topics", get(handlers::trends::get_trends_topics))
        .route("/executions/:execution_id", get(handlers::executions::get_execution))
        .route("/api/executions/:execution_id/metrics", get(handlers::admin::get_execution_metrics))
        .with_state(Arc::clone(&state));

    let protected_routes = Router::new()
        .route("/sites/analyze", post(handlers::sites::analyze_site))
        .route("/sites/:domain/audit", get(handlers::sites::get_site_audit))
        .route("/sites/:domain/audit/status/:execution_id", get(handlers::sites::get_audit_status))
        .route("/competitors/search", post(handlers::competitors::search_competitors))
        .route("/competitors/:domain/validate", post(handlers::competitors::validate_competitors))
        .route("/scraping/scrape", post(handlers::scraping::scrape))
        .route("/trends/analyze", post(handlers::trends::analyze_trends))
        .route("/articles/training/analyze", post(handlers::articles::analyze_training_patterns))
        .route("/api/errors", get(handlers::admin::list_errors))
        .route("/api/errors/:id/resolve", post(handlers::admin::resolve_error))
        .with_state(Arc::clone(&state))
        .layer(axum_middleware::from_fn_with_state(jwt_util, middleware::require_bearer_auth));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::ready_check))
        .with_state(Arc::clone(&state));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public_routes)
        .merge(protected_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("editorial-engine listening on http://{addr}");
    tracing::info!("API documentation available at http://{addr}/api-docs");

    axum::serve(listener, app).await?;

    Ok(())
}
