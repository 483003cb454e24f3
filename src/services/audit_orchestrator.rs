//! C9 — AuditOrchestrator: the top-level "audit a domain" workflow. Computes
//! which prerequisites (profile, competitors, articles, trend pipeline) are
//! missing and runs only those, in dependency order, behind a race-free
//! launch gate so concurrent requests for the same domain observe one
//! in-flight execution instead of launching duplicate work. Grounded on
//! `original_source/.../api/routers/sites_audit.py`'s prerequisite-check /
//! reuse / background-worker structure (spec §4.9) and
//! `services/trend_pipeline.rs`'s stage-abort-on-failure idiom, reused here
//! for child-workflow sequencing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Competitor, SiteProfile, TrendPipelineExecution, WorkflowStatus, WorkflowType};
use crate::services::collaborators::{
    ArticleScraper, CompetitorCandidate, CompetitorSearcher, EditorialAnalysisClient, ScrapedArticle,
    SiteProfileResult,
};
use crate::services::execution_store::{ExecutionStore, UpdateExecution};
use crate::services::trend_pipeline::{TrendPipeline, TrendPipelineRequest};
use crate::utils::{clean_optional_string, is_valid_domain, ApiError, ApiResult, StringExt};

/// Resolves `GetAuditStatus` to the most recent terminal orchestrator run
/// for a domain (spec §4.9 "Status endpoint").
pub const ALREADY_COMPLETED_SENTINEL: &str = "already-completed";

const STEP_ORDER: [WorkflowType; 5] = [
    WorkflowType::EditorialAnalysis,
    WorkflowType::CompetitorSearch,
    WorkflowType::ClientScraping,
    WorkflowType::Scraping,
    WorkflowType::TrendPipeline,
];

#[derive(Debug, Clone)]
pub struct AuditOrchestratorConfig {
    pub min_client_articles: i64,
    pub min_competitor_articles: i64,
    pub max_competitors: u32,
    pub max_pages_per_domain: u32,
    pub trend_time_window_days: i32,
}

impl Default for AuditOrchestratorConfig {
    fn default() -> Self {
        Self {
            min_client_articles: 5,
            min_competitor_articles: 10,
            max_competitors: 25,
            max_pages_per_domain: 50,
            trend_time_window_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataStatus {
    pub has_profile: bool,
    pub has_competitors: bool,
    pub has_sufficient_client_articles: bool,
    pub has_sufficient_competitor_articles: bool,
    pub has_trend_pipeline: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkflowStepStatus {
    pub step: String,
    pub status: String,
    pub execution_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingAuditResponse {
    pub execution_id: Uuid,
    pub status: String,
    pub steps: Vec<WorkflowStepStatus>,
    pub data_status: DataStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteAuditResponse {
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub profile: Option<SiteProfile>,
    pub competitors: Vec<Competitor>,
    pub trend_pipeline_execution_id: Option<Uuid>,
    pub data_status: DataStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditStatusResponse {
    pub execution_id: Uuid,
    pub overall_status: String,
    pub overall_progress: f64,
    pub steps: Vec<WorkflowStepStatus>,
    pub error_message: Option<String>,
}

pub enum StartAuditOutcome {
    Ready(Box<SiteAuditResponse>),
    Pending(Box<PendingAuditResponse>),
}

/// Snapshot of what already exists for a domain, taken once per request
/// (spec §4.9 steps 2-4). The background worker operates on a clone of this
/// snapshot rather than re-querying, since the launch gate already serializes
/// concurrent requests for the same domain.
#[derive(Debug, Clone)]
struct Prereqs {
    profile: Option<SiteProfile>,
    competitors: Vec<Competitor>,
    client_article_count: i64,
    competitor_article_count: i64,
    trend_pipeline: Option<TrendPipelineExecution>,
}

impl Prereqs {
    fn data_status(&self, config: &AuditOrchestratorConfig) -> DataStatus {
        DataStatus {
            has_profile: self.profile.is_some(),
            has_competitors: !self.competitors.is_empty(),
            has_sufficient_client_articles: self.client_article_count >= config.min_client_articles,
            has_sufficient_competitor_articles: self.competitor_article_count
                >= config.min_competitor_articles,
            has_trend_pipeline: self.trend_pipeline.is_some(),
        }
    }

    /// Essential prerequisites per spec §4.9 step 5: profile, competitors and
    /// a completed trend pipeline. Scraping counts are non-essential — the
    /// reuse rule tolerates them being short.
    fn essentials_present(&self) -> bool {
        self.profile.is_some() && !self.competitors.is_empty() && self.trend_pipeline.is_some()
    }
}

pub struct AuditOrchestrator {
    pool: SqlitePool,
    execution_store: Arc<ExecutionStore>,
    editorial_client: Arc<dyn EditorialAnalysisClient>,
    competitor_searcher: Arc<dyn CompetitorSearcher>,
    scraper: Arc<dyn ArticleScraper>,
    trend_pipeline: Arc<TrendPipeline>,
    config: AuditOrchestratorConfig,
    /// Cooperative-cancellation flags, one per in-flight orchestrator
    /// execution (spec §4.9 "State machine" / §5 "Cancellation"). Removed
    /// once the worker finishes.
    stop_flags: DashMap<Uuid, Arc<AtomicBool>>,
}

impl AuditOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        execution_store: Arc<ExecutionStore>,
        editorial_client: Arc<dyn EditorialAnalysisClient>,
        competitor_searcher: Arc<dyn CompetitorSearcher>,
        scraper: Arc<dyn ArticleScraper>,
        trend_pipeline: Arc<TrendPipeline>,
        config: AuditOrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            execution_store,
            editorial_client,
            competitor_searcher,
            scraper,
            trend_pipeline,
            config,
            stop_flags: DashMap::new(),
        })
    }

    /// Entry point for `GET /sites/{domain}/audit` (spec §4.9 algorithm).
    pub async fn start_audit(self: &Arc<Self>, domain: &str) -> ApiResult<StartAuditOutcome> {
        // Path params can carry incidental whitespace; normalize before validating.
        let domain = domain.trimmed();
        let domain = domain.as_str();
        if !is_valid_domain(domain) {
            return Err(ApiError::validation_error(format!("invalid domain: {domain}")));
        }

        let profile = self.fetch_latest_profile(domain).await?;

        let (competitor_search_exec, trend_pipeline_row, client_article_count) = tokio::join!(
            self.execution_store.find_latest(
                &WorkflowType::CompetitorSearch.to_string(),
                domain,
                &[WorkflowStatus::Completed],
            ),
            self.fetch_latest_trend_pipeline(domain),
            self.count_articles(domain, true),
        );
        // Each parallel check is isolated (spec §4.9 step 3): a failed check
        // is interpreted as "missing" rather than aborting the whole request.
        let competitor_search_exec = competitor_search_exec.unwrap_or(None);
        let trend_pipeline_row = trend_pipeline_row.unwrap_or(None);
        let client_article_count = client_article_count.unwrap_or(0);

        let competitors = self.fetch_validated_competitors(domain).await.unwrap_or_default();
        let has_competitors = competitor_search_exec.is_some() || !competitors.is_empty();

        let competitor_article_count = if competitors.is_empty() {
            0
        } else {
            let domains: Vec<&str> = competitors.iter().map(|c| c.competitor_domain.as_str()).collect();
            self.count_competitor_articles(&domains).await.unwrap_or(0)
        };

        let prereqs = Prereqs {
            profile,
            competitors: if has_competitors { competitors } else { Vec::new() },
            client_article_count,
            competitor_article_count,
            trend_pipeline: trend_pipeline_row,
        };
        let data_status = prereqs.data_status(&self.config);

        // Reuse check (step 5): a terminal successful orchestrator run with
        // essentials present short-circuits even if scraping counts are thin.
        if let Some(prior) = self
            .execution_store
            .find_latest(&WorkflowType::AuditOrchestrator.to_string(), domain, &[WorkflowStatus::Completed])
            .await?
        {
            if prior.was_success == Some(true) && prereqs.essentials_present() {
                return Ok(StartAuditOutcome::Ready(Box::new(self.build_site_audit_response(
                    domain,
                    &prereqs,
                    Some(prior.execution_id),
                ))));
            }
        }

        // Same-state short-circuit (step 6): no completed orchestrator row
        // yet, but the essentials already exist independently.
        if prereqs.essentials_present() {
            return Ok(StartAuditOutcome::Ready(Box::new(self.build_site_audit_response(
                domain, &prereqs, None,
            ))));
        }

        // Launch gate (step 7): race-free via the fast-path in-flight read,
        // closed for real by the partial unique index in migrations/.
        if let Some(in_flight) = self
            .execution_store
            .find_in_flight(&WorkflowType::AuditOrchestrator.to_string(), domain)
            .await?
        {
            return Ok(StartAuditOutcome::Pending(Box::new(
                self.pending_response(in_flight.execution_id, data_status).await?,
            )));
        }

        // The read above and this write are not atomic; a migration-level
        // partial unique index on (workflow_type, domain) WHERE status IN
        // ('pending','running') closes the race for real. A concurrent
        // winner surfaces here as a unique-constraint violation — re-read
        // the now-existing in-flight row instead of erroring.
        let execution = match self
            .execution_store
            .create_execution(
                &WorkflowType::AuditOrchestrator.to_string(),
                Some(domain),
                serde_json::json!({ "domain": domain }),
                WorkflowStatus::Pending,
                None,
            )
            .await
        {
            Ok(execution) => execution,
            Err(ApiError::Database(e)) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                let in_flight = self
                    .execution_store
                    .find_in_flight(&WorkflowType::AuditOrchestrator.to_string(), domain)
                    .await?
                    .ok_or_else(|| ApiError::Concurrency(format!("in-flight audit for {domain} vanished")))?;
                return Ok(StartAuditOutcome::Pending(Box::new(
                    self.pending_response(in_flight.execution_id, data_status).await?,
                )));
            }
            Err(e) => return Err(e),
        };
        let execution_id = execution.execution_id;
        self.stop_flags.insert(execution_id, Arc::new(AtomicBool::new(false)));

        let worker = Arc::clone(self);
        let domain_owned = domain.to_string();
        let worker_prereqs = prereqs;
        tokio::spawn(async move {
            worker.run_worker(execution_id, domain_owned, worker_prereqs).await;
        });

        Ok(StartAuditOutcome::Pending(Box::new(
            self.pending_response(execution_id, data_status).await?,
        )))
    }

    /// `GetAuditStatus(execution_id)` (spec §4.9 "Status endpoint"). Accepts
    /// either a real execution id or the `"already-completed"` sentinel.
    pub async fn get_status(&self, domain: &str, execution_id_or_sentinel: &str) -> ApiResult<AuditStatusResponse> {
        let execution = if execution_id_or_sentinel == ALREADY_COMPLETED_SENTINEL {
            self.execution_store
                .find_latest(&WorkflowType::AuditOrchestrator.to_string(), domain, &[WorkflowStatus::Completed])
                .await?
                .ok_or_else(|| ApiError::not_found(format!("no completed audit for {domain}")))?
        } else {
            let execution_id: Uuid = execution_id_or_sentinel
                .parse()
                .map_err(|_| ApiError::validation_error("execution_id must be a UUID or \"already-completed\""))?;
            self.execution_store
                .get_execution(execution_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("execution {execution_id} not found")))?
        };

        let steps = self.steps_for(execution.execution_id).await?;
        let total = steps.len() as f64;
        let done = steps
            .iter()
            .filter(|s| matches!(s.status.as_str(), "completed" | "skipped"))
            .count() as f64;
        let overall_progress = if execution.status == WorkflowStatus::Completed.as_str() {
            100.0
        } else if total == 0.0 {
            0.0
        } else {
            (done / total * 100.0).min(100.0)
        };

        Ok(AuditStatusResponse {
            execution_id: execution.execution_id,
            overall_status: execution.status,
            overall_progress,
            steps,
            error_message: execution.error_message,
        })
    }

    /// Sets the cooperative-cancellation flag for an in-flight orchestrator
    /// execution (spec §4.9 "State machine"). A no-op if the execution has
    /// already finished.
    pub fn cancel(&self, execution_id: Uuid) {
        if let Some(flag) = self.stop_flags.get(&execution_id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self, execution_id: Uuid) -> bool {
        self.stop_flags.get(&execution_id).map(|f| f.load(Ordering::SeqCst)).unwrap_or(false)
    }

    fn build_site_audit_response(
        &self,
        domain: &str,
        prereqs: &Prereqs,
        execution_id: Option<Uuid>,
    ) -> SiteAuditResponse {
        SiteAuditResponse {
            domain: domain.to_string(),
            execution_id,
            profile: prereqs.profile.clone(),
            competitors: prereqs.competitors.clone(),
            trend_pipeline_execution_id: prereqs.trend_pipeline.as_ref().map(|t| t.execution_id),
            data_status: prereqs.data_status(&self.config),
        }
    }

    async fn pending_response(&self, execution_id: Uuid, data_status: DataStatus) -> ApiResult<PendingAuditResponse> {
        let execution = self
            .execution_store
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("execution {execution_id} not found")))?;
        let steps = self.steps_for(execution_id).await?;
        Ok(PendingAuditResponse { execution_id, status: execution.status, steps, data_status })
    }

    /// Builds the per-step status list from child `WorkflowExecution` rows,
    /// defaulting to `"pending"` for steps that haven't launched a child yet.
    async fn steps_for(&self, orchestrator_execution_id: Uuid) -> ApiResult<Vec<WorkflowStepStatus>> {
        let rows: Vec<(String, String, Uuid)> = sqlx::query_as(
            "SELECT workflow_type, status, execution_id FROM workflow_executions \
             WHERE parent_execution_id = ? ORDER BY created_at ASC",
        )
        .bind(orchestrator_execution_id)
        .fetch_all(&self.pool)
        .await?;

        let mut latest: HashMap<String, (String, Uuid)> = HashMap::new();
        for (workflow_type, status, execution_id) in rows {
            latest.insert(workflow_type, (status, execution_id));
        }

        Ok(STEP_ORDER
            .iter()
            .map(|step| {
                let key = step.to_string();
                match latest.get(&key) {
                    Some((status, execution_id)) => {
                        WorkflowStepStatus { step: key, status: status.clone(), execution_id: Some(*execution_id) }
                    }
                    None => WorkflowStepStatus { step: key, status: "pending".to_string(), execution_id: None },
                }
            })
            .collect())
    }

    // -- background worker --------------------------------------------------

    async fn run_worker(self: Arc<Self>, execution_id: Uuid, domain: String, prereqs: Prereqs) {
        if let Err(e) = self
            .execution_store
            .update_execution(
                execution_id,
                UpdateExecution { status: Some(WorkflowStatus::Running), ..Default::default() },
            )
            .await
        {
            tracing::error!(%execution_id, error = %e, "failed to mark audit orchestrator running");
            self.stop_flags.remove(&execution_id);
            return;
        }
        self.log_audit(
            Some(execution_id),
            "start",
            "audit_orchestrator",
            None,
            "running",
            &format!("audit started for {domain}"),
            None,
        )
        .await;

        let started_at = Utc::now();
        let result = self.drive_children(execution_id, &domain, &prereqs).await;
        let elapsed_seconds = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;

        let update = match &result {
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
        };
        if let Err(e) = self.execution_store.update_execution(execution_id, update).await {
            tracing::error!(%execution_id, error = %e, "failed to finalize audit orchestrator execution");
        }

        if let Err(e) = self
            .execution_store
            .create_performance_metric(
                execution_id,
                "audit_orchestrator",
                "duration_seconds",
                elapsed_seconds,
                Some("seconds"),
                None,
            )
            .await
        {
            tracing::warn!(%execution_id, error = %e, "failed to record audit orchestrator duration metric");
        }

        match &result {
            Ok(()) => {
                self.log_audit(
                    Some(execution_id),
                    "finish",
                    "audit_orchestrator",
                    None,
                    "completed",
                    &format!("audit completed for {domain}"),
                    None,
                )
                .await;
            }
            Err(e) => {
                self.log_audit(
                    Some(execution_id),
                    "finish",
                    "audit_orchestrator",
                    None,
                    "failed",
                    &format!("audit failed for {domain}"),
                    Some(e.to_string()),
                )
                .await;
                if let Err(log_err) = self
                    .execution_store
                    .create_error_log(
                        "audit_orchestrator",
                        "error",
                        Some(&domain),
                        Some("audit_orchestrator"),
                        Some(execution_id),
                        &e.to_string(),
                        None,
                        None,
                    )
                    .await
                {
                    tracing::warn!(%execution_id, error = %log_err, "failed to record error log");
                }
            }
        }

        self.stop_flags.remove(&execution_id);
    }

    /// Best-effort audit-log append. Never propagates a failure to the
    /// caller (spec §4.1 "Failure semantics") — logs and moves on.
    async fn log_audit(
        &self,
        execution_id: Option<Uuid>,
        action: &str,
        agent_name: &str,
        step_name: Option<&str>,
        status: &str,
        message: &str,
        error_traceback: Option<String>,
    ) {
        if let Err(e) = self
            .execution_store
            .append_audit_log(
                execution_id,
                action,
                agent_name,
                step_name,
                status,
                message,
                None,
                error_traceback.as_deref(),
            )
            .await
        {
            tracing::warn!(%agent_name, error = %e, "failed to append audit log");
        }
    }

    /// Runs the missing child workflows in dependency order (spec §4.9 step
    /// 8): `editorial_analysis -> competitor_search -> (client_scraping ∥
    /// competitor_scraping) -> trend_pipeline`. A required step's failure
    /// aborts the steps after it, mirroring `TrendPipeline`'s stage-abort
    /// behavior; each child's own failure is still recorded on its own
    /// execution row before the error propagates.
    async fn drive_children(&self, execution_id: Uuid, domain: &str, prereqs: &Prereqs) -> ApiResult<()> {
        if self.is_cancelled(execution_id) {
            return Err(ApiError::Transient("cancelled".to_string()));
        }
        if prereqs.profile.is_none() {
            self.run_child(execution_id, WorkflowType::EditorialAnalysis, domain, async {
                let profile = self.editorial_client.analyze_site(domain).await?;
                self.persist_profile(domain, profile).await
            })
            .await?;
        }

        if self.is_cancelled(execution_id) {
            return Err(ApiError::Transient("cancelled".to_string()));
        }
        if prereqs.competitors.is_empty() {
            self.run_child(execution_id, WorkflowType::CompetitorSearch, domain, async {
                let candidates = self
                    .competitor_searcher
                    .search_competitors(domain, self.config.max_competitors as usize)
                    .await?;
                self.persist_competitors(domain, candidates).await
            })
            .await?;
        }

        if self.is_cancelled(execution_id) {
            return Err(ApiError::Transient("cancelled".to_string()));
        }
        let need_client_scrape = prereqs.client_article_count < self.config.min_client_articles;
        let need_competitor_scrape = prereqs.competitor_article_count < self.config.min_competitor_articles;
        if need_client_scrape || need_competitor_scrape {
            let client_fut = async {
                if need_client_scrape {
                    self.run_child(execution_id, WorkflowType::ClientScraping, domain, async {
                        let articles =
                            self.scraper.scrape(domain, self.config.max_pages_per_domain as usize).await?;
                        let inserted = self.persist_articles(domain, true, articles).await?;
                        Ok(serde_json::json!({ "articles_inserted": inserted }))
                    })
                    .await
                } else {
                    Ok(())
                }
            };
            let competitor_fut = async {
                if need_competitor_scrape {
                    self.run_child(execution_id, WorkflowType::Scraping, domain, async {
                        let mut total = 0usize;
                        for competitor in &prereqs.competitors {
                            let articles = self
                                .scraper
                                .scrape(&competitor.competitor_domain, self.config.max_pages_per_domain as usize)
                                .await?;
                            total += self.persist_articles(&competitor.competitor_domain, false, articles).await?;
                        }
                        Ok(serde_json::json!({ "articles_inserted": total }))
                    })
                    .await
                } else {
                    Ok(())
                }
            };
            let (client_result, competitor_result) = tokio::join!(client_fut, competitor_fut);
            client_result?;
            competitor_result?;
        }

        if self.is_cancelled(execution_id) {
            return Err(ApiError::Transient("cancelled".to_string()));
        }
        if prereqs.trend_pipeline.is_none() {
            self.run_child(execution_id, WorkflowType::TrendPipeline, domain, async {
                let mut domains: Vec<String> =
                    prereqs.competitors.iter().map(|c| c.competitor_domain.clone()).collect();
                domains.push(domain.to_string());
                let request = TrendPipelineRequest {
                    client_domain: Some(domain.to_string()),
                    domains,
                    time_window_days: self.config.trend_time_window_days as i64,
                    skip_llm: false,
                    skip_gap_analysis: false,
                };
                let pipeline_execution = self.trend_pipeline.execute(request).await?;
                Ok(serde_json::json!({ "trend_pipeline_execution_id": pipeline_execution.execution_id }))
            })
            .await?;
        }

        Ok(())
    }

    /// Wraps `fut` in its own child `WorkflowExecution`, recording success or
    /// failure on that row before propagating the result to the caller.
    async fn run_child<F>(&self, parent: Uuid, workflow_type: WorkflowType, domain: &str, fut: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ApiResult<Value>>,
    {
        let child = self
            .execution_store
            .create_execution(
                &workflow_type.to_string(),
                Some(domain),
                serde_json::json!({}),
                WorkflowStatus::Running,
                Some(parent),
            )
            .await?;

        let step_name = workflow_type.to_string();
        match fut.await {
            Ok(output) => {
                self.execution_store
                    .update_execution(
                        child.execution_id,
                        UpdateExecution {
                            status: Some(WorkflowStatus::Completed),
                            was_success: Some(true),
                            output_data: Some(output),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.log_audit(
                    Some(parent),
                    "child_completed",
                    &step_name,
                    Some(&step_name),
                    "completed",
                    &format!("{step_name} completed for {domain}"),
                    None,
                )
                .await;
                Ok(())
            }
            Err(e) => {
                self.execution_store
                    .update_execution(
                        child.execution_id,
                        UpdateExecution {
                            status: Some(WorkflowStatus::Failed),
                            was_success: Some(false),
                            error_message: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.log_audit(
                    Some(parent),
                    "child_failed",
                    &step_name,
                    Some(&step_name),
                    "failed",
                    &format!("{step_name} failed for {domain}"),
                    Some(e.to_string()),
                )
                .await;
                if let Err(log_err) = self
                    .execution_store
                    .create_error_log(
                        &step_name,
                        "error",
                        Some(domain),
                        Some(&step_name),
                        Some(child.execution_id),
                        &e.to_string(),
                        None,
                        None,
                    )
                    .await
                {
                    tracing::warn!(%parent, error = %log_err, "failed to record error log for child workflow");
                }
                Err(e)
            }
        }
    }

    // -- persistence ---------------------------------------------------------

    async fn fetch_latest_profile(&self, domain: &str) -> ApiResult<Option<SiteProfile>> {
        let row = sqlx::query_as::<_, SiteProfile>(
            "SELECT * FROM site_profiles WHERE domain = ? AND is_valid = TRUE \
             ORDER BY analysis_date DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_latest_trend_pipeline(&self, domain: &str) -> ApiResult<Option<TrendPipelineExecution>> {
        let row = sqlx::query_as::<_, TrendPipelineExecution>(
            "SELECT * FROM trend_pipeline_executions WHERE client_domain = ? AND is_valid = TRUE \
             AND stage_1_status = 'completed' AND stage_2_status = 'completed' AND stage_3_status = 'completed' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_validated_competitors(&self, domain: &str) -> ApiResult<Vec<Competitor>> {
        let rows = sqlx::query_as::<_, Competitor>(
            "SELECT * FROM competitors WHERE client_domain = ? AND is_valid = TRUE \
             AND validated = TRUE AND excluded = FALSE",
        )
        .bind(domain)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_articles(&self, domain: &str, is_client: bool) -> ApiResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM articles WHERE domain = ? AND is_client = ? AND is_valid = TRUE",
        )
        .bind(domain)
        .bind(is_client)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn count_competitor_articles(&self, domains: &[&str]) -> ApiResult<i64> {
        if domains.is_empty() {
            return Ok(0);
        }
        let placeholders = domains.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT COUNT(*) FROM articles WHERE is_client = FALSE AND is_valid = TRUE AND domain IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for d in domains {
            query = query.bind(*d);
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count.0)
    }

    async fn persist_profile(&self, domain: &str, result: SiteProfileResult) -> ApiResult<Value> {
        let now = Utc::now();
        // Collaborator-supplied text is untrusted HTTP JSON; normalize blank/
        // whitespace-only strings to the same "absent" shape as `None`.
        let language_level = clean_optional_string(result.language_level.as_ref())
            .unwrap_or_else(|| "intermediate".to_string());
        let editorial_tone = clean_optional_string(result.editorial_tone.as_ref());
        sqlx::query(
            r#"
            INSERT INTO site_profiles
                (domain, analysis_date, language_level, editorial_tone, target_audience,
                 activity_domains, content_structure, keywords, style_features, pages_analyzed,
                 llm_models_used, is_valid, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, 0, NULL, TRUE, ?, ?)
            "#,
        )
        .bind(domain)
        .bind(now)
        .bind(&language_level)
        .bind(&editorial_tone)
        .bind(result.target_audience.map(sqlx::types::Json))
        .bind(result.activity_domains.map(sqlx::types::Json))
        .bind(result.keywords.map(sqlx::types::Json))
        .bind(result.style_features.map(sqlx::types::Json))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(serde_json::json!({ "domain": domain, "language_level": language_level }))
    }

    async fn persist_competitors(&self, client_domain: &str, candidates: Vec<CompetitorCandidate>) -> ApiResult<Value> {
        let now = Utc::now();
        let mut count = 0i64;
        for candidate in &candidates {
            sqlx::query(
                r#"
                INSERT INTO competitors
                    (client_domain, competitor_domain, relevance_score, confidence_score,
                     semantic_similarity, cross_validated, validated, excluded, manual,
                     validation_date, is_valid, created_at)
                VALUES (?, ?, ?, ?, NULL, FALSE, TRUE, FALSE, FALSE, ?, TRUE, ?)
                "#,
            )
            .bind(client_domain)
            .bind(&candidate.domain)
            .bind(candidate.confidence)
            .bind(candidate.confidence)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
            count += 1;
        }
        Ok(serde_json::json!({ "competitors_found": count }))
    }

    async fn persist_articles(&self, domain: &str, is_client: bool, articles: Vec<ScrapedArticle>) -> ApiResult<usize> {
        let now = Utc::now();
        let mut inserted = 0usize;
        for article in &articles {
            let published_date = article
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
            .execute(&self.pool)
            .await?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// Stable per-URL hash for the `articles.url_hash` uniqueness constraint. No
/// cryptographic hash crate is in the dependency tree for this purpose, so
/// `DefaultHasher` is used directly — its keys are fixed (unlike
/// `RandomState`), so the same URL always hashes the same way across runs.
fn url_hash(url: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_hash_is_deterministic_and_distinguishes_urls() {
        let a = url_hash("https://acme.test/article-1");
        let b = url_hash("https://acme.test/article-1");
        let c = url_hash("https://acme.test/article-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn essentials_require_profile_competitors_and_trend_pipeline() {
        let empty = Prereqs {
            profile: None,
            competitors: Vec::new(),
            client_article_count: 0,
            competitor_article_count: 0,
            trend_pipeline: None,
        };
        assert!(!empty.essentials_present());
    }

    #[test]
    fn step_order_lists_every_dependency_stage() {
        let steps: Vec<String> = STEP_ORDER.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            steps,
            vec!["editorial_analysis", "competitor_search", "client_scraping", "scraping", "trend_pipeline"]
        );
    }
}
