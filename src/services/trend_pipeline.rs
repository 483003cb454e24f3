//! C8 — TrendPipeline: stateful four-stage orchestrator (spec §4.8). Chains
//! `EmbeddingFetcher -> Clusterer -> TemporalAnalyzer -> LLMEnricher ->
//! GapAnalyzer`, persisting after each stage. Grounded on
//! `original_source/.../agents/trend_pipeline/pipeline.py`'s stage sequencing
//! (stage failure aborts subsequent stages; per-topic LLM failures are
//! isolated and don't fail stage 3; centroid upsert is best-effort).

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::TrendPipelineExecution;
use crate::services::clusterer::{Clusterer, OUTLIER_TOPIC_ID};
use crate::services::embedding_fetcher::EmbeddingFetcher;
use crate::services::execution_store::ExecutionStore;
use crate::services::gap_analyzer::{
    ClusterDocument, GapAnalyzer, RecommendationInput, TemporalInput,
};
use crate::services::llm_enricher::LlmEnricher;
use crate::services::temporal_analyzer::{ClusterMember, TemporalAnalyzer, TemporalMetrics, TrendBucket};
use crate::services::vector_store::{VectorPoint, VectorStore};
use crate::utils::{articles_collection_name, ApiError, ApiResult, CENTROIDS_COLLECTION};

pub struct TrendPipelineRequest {
    pub client_domain: Option<String>,
    pub domains: Vec<String>,
    pub time_window_days: i64,
    pub skip_llm: bool,
    pub skip_gap_analysis: bool,
}

pub struct TrendPipelineConfig {
    pub min_articles: usize,
    pub top_n_for_llm: usize,
    pub recommendations_per_topic: usize,
}

impl Default for TrendPipelineConfig {
    fn default() -> Self {
        Self { min_articles: 30, top_n_for_llm: 10, recommendations_per_topic: 3 }
    }
}

pub struct TrendPipeline {
    pool: SqlitePool,
    vector_store: Arc<VectorStore>,
    embedding_fetcher: EmbeddingFetcher,
    clusterer: Clusterer,
    temporal_analyzer: TemporalAnalyzer,
    llm_enricher: Option<Arc<LlmEnricher>>,
    gap_analyzer: GapAnalyzer,
    config: TrendPipelineConfig,
    execution_store: Arc<ExecutionStore>,
}

impl TrendPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        vector_store: Arc<VectorStore>,
        embedding_fetcher: EmbeddingFetcher,
        clusterer: Clusterer,
        temporal_analyzer: TemporalAnalyzer,
        llm_enricher: Option<Arc<LlmEnricher>>,
        gap_analyzer: GapAnalyzer,
        config: TrendPipelineConfig,
        execution_store: Arc<ExecutionStore>,
    ) -> Self {
        Self {
            pool,
            vector_store,
            embedding_fetcher,
            clusterer,
            temporal_analyzer,
            llm_enricher,
            gap_analyzer,
            config,
            execution_store,
        }
    }

    pub async fn execute(&self, request: TrendPipelineRequest) -> ApiResult<TrendPipelineExecution> {
        let analysis_id = Uuid::new_v4();
        let now = Utc::now();
        let mut execution = sqlx::query_as::<_, TrendPipelineExecution>(
            r#"
            INSERT INTO trend_pipeline_executions
                (execution_id, client_domain, domains_analyzed, time_window_days,
                 stage_1_status, stage_2_status, stage_3_status, stage_4_status,
                 total_articles, total_clusters, total_outliers, total_recommendations,
                 total_gaps, start_time, is_valid, created_at)
            VALUES (?, ?, ?, ?, 'pending', 'pending', 'pending', 'pending', 0, 0, 0, 0, 0, ?, TRUE, ?)
            RETURNING *
            "#,
        )
        .bind(analysis_id)
        .bind(&request.client_domain)
        .bind(sqlx::types::Json(json!(request.domains)))
        .bind(request.time_window_days as i32)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.log_audit(analysis_id, "stage_1", "embedding_fetcher", "in_progress", "fetching embeddings and clustering").await;
        let stage1 = match self.run_stage_1(&request, analysis_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail_pipeline(analysis_id, 1, &e.to_string()).await?;
                self.log_audit(analysis_id, "stage_1", "embedding_fetcher", "failed", &e.to_string()).await;
                self.log_error(analysis_id, "embedding_fetcher", &e.to_string()).await;
                return self.reload(analysis_id).await;
            }
        };
        self.set_stage_status(analysis_id, 1, "completed").await?;
        self.log_audit(analysis_id, "stage_1", "embedding_fetcher", "completed", "clustering complete").await;

        let stage2_started = Utc::now();
        let temporal_by_topic = self.run_stage_2(analysis_id, &stage1).await?;
        self.set_stage_status(analysis_id, 2, "completed").await?;
        self.record_duration(analysis_id, "temporal_analyzer", stage2_started).await;
        self.log_audit(analysis_id, "stage_2", "temporal_analyzer", "completed", "temporal metrics computed").await;

        if !request.skip_llm {
            if let Some(llm) = self.llm_enricher.clone() {
                let stage3_started = Utc::now();
                self.run_stage_3(analysis_id, &stage1, &temporal_by_topic, llm).await;
                self.record_duration(analysis_id, "llm_enricher", stage3_started).await;
            }
            self.set_stage_status(analysis_id, 3, "completed").await?;
            self.log_audit(analysis_id, "stage_3", "llm_enricher", "completed", "trend synthesis complete").await;
        } else {
            self.set_stage_status(analysis_id, 3, "skipped").await?;
        }

        if !request.skip_gap_analysis {
            if let Some(client_domain) = request.client_domain.as_deref() {
                let stage4_started = Utc::now();
                if let Err(e) = self.run_stage_4(analysis_id, client_domain, &stage1, &temporal_by_topic).await {
                    self.log_audit(analysis_id, "stage_4", "gap_analyzer", "failed", &e.to_string()).await;
                    self.log_error(analysis_id, "gap_analyzer", &e.to_string()).await;
                    return Err(e);
                }
                self.set_stage_status(analysis_id, 4, "completed").await?;
                self.record_duration(analysis_id, "gap_analyzer", stage4_started).await;
                self.log_audit(analysis_id, "stage_4", "gap_analyzer", "completed", "gap analysis complete").await;
            } else {
                self.set_stage_status(analysis_id, 4, "skipped").await?;
            }
        } else {
            self.set_stage_status(analysis_id, 4, "skipped").await?;
        }

        let end = Utc::now();
        let duration = (end - now).num_milliseconds() as f64 / 1000.0;
        sqlx::query(
            "UPDATE trend_pipeline_executions SET end_time = ?, duration_seconds = ? WHERE execution_id = ?",
        )
        .bind(end)
        .bind(duration)
        .bind(analysis_id)
        .execute(&self.pool)
        .await?;

        execution = self.reload(analysis_id).await?;
        Ok(execution)
    }

    /// Best-effort audit-log append (spec §4.1 "Failure semantics") — never
    /// aborts the pipeline run on failure.
    async fn log_audit(&self, analysis_id: Uuid, action: &str, agent_name: &str, status: &str, message: &str) {
        if let Err(e) = self
            .execution_store
            .append_audit_log(Some(analysis_id), action, agent_name, Some(action), status, message, None, None)
            .await
        {
            tracing::warn!(%analysis_id, error = %e, "failed to append audit log");
        }
    }

    /// Writes an `ErrorLog` row for a fatal stage failure (spec §7 kind 7).
    async fn log_error(&self, analysis_id: Uuid, agent_name: &str, message: &str) {
        if let Err(e) = self
            .execution_store
            .create_error_log(
                "trend_pipeline",
                "error",
                None,
                Some(agent_name),
                Some(analysis_id),
                message,
                None,
                None,
            )
            .await
        {
            tracing::warn!(%analysis_id, error = %e, "failed to record error log");
        }
    }

    /// Records a stage's wall-clock duration as a `PerformanceMetric`.
    async fn record_duration(&self, analysis_id: Uuid, agent_name: &str, started_at: chrono::DateTime<Utc>) {
        let elapsed = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;
        if let Err(e) = self
            .execution_store
            .create_performance_metric(analysis_id, agent_name, "duration_seconds", elapsed, Some("seconds"), None)
            .await
        {
            tracing::warn!(%analysis_id, error = %e, "failed to record performance metric");
        }
    }

    async fn reload(&self, analysis_id: Uuid) -> ApiResult<TrendPipelineExecution> {
        sqlx::query_as::<_, TrendPipelineExecution>(
            "SELECT * FROM trend_pipeline_executions WHERE execution_id = ?",
        )
        .bind(analysis_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    async fn set_stage_status(&self, analysis_id: Uuid, stage: u8, status: &str) -> ApiResult<()> {
        let column = match stage {
            1 => "stage_1_status",
            2 => "stage_2_status",
            3 => "stage_3_status",
            4 => "stage_4_status",
            _ => unreachable!(),
        };
        let sql = format!("UPDATE trend_pipeline_executions SET {column} = ? WHERE execution_id = ?");
        sqlx::query(&sql).bind(status).bind(analysis_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn fail_pipeline(&self, analysis_id: Uuid, stage: u8, error: &str) -> ApiResult<()> {
        self.set_stage_status(analysis_id, stage, "failed").await?;
        sqlx::query(
            "UPDATE trend_pipeline_executions SET error_message = ?, end_time = ? WHERE execution_id = ?",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(analysis_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stage 1: fetch -> cluster -> persist clusters/outliers/centroids.
    /// Returns per-topic member data needed by later stages.
    async fn run_stage_1(
        &self,
        request: &TrendPipelineRequest,
        analysis_id: Uuid,
    ) -> ApiResult<Stage1Outcome> {
        self.set_stage_status(analysis_id, 1, "in_progress").await?;

        let fetched = self
            .embedding_fetcher
            .fetch(&request.domains, request.time_window_days, None)
            .await?;
        if !fetched.diagnostics.is_empty() {
            tracing::warn!(?fetched.diagnostics, "embedding fetch diagnostics");
        }

        let embeddings = fetched.embeddings.clone();
        let texts: Vec<String> = fetched
            .payloads
            .iter()
            .map(|p| p.get("text").and_then(Value::as_str).unwrap_or_default().to_string())
            .collect();
        let min_articles = self.config.min_articles;
        let clusterer_embeddings = embeddings.clone();
        let clusterer_texts = texts.clone();

        let clusterer = self.clusterer.clone();
        let output = tokio::task::spawn_blocking(move || {
            clusterer.cluster(&clusterer_embeddings, &clusterer_texts, min_articles)
        })
        .await
        .map_err(|e| ApiError::Fatal(format!("clustering task panicked: {e}")))??;

        sqlx::query(
            "UPDATE trend_pipeline_executions SET total_articles = ? WHERE execution_id = ?",
        )
        .bind(embeddings.len() as i32)
        .bind(analysis_id)
        .execute(&self.pool)
        .await?;

        let mut topic_db_ids = HashMap::new();
        for cluster in &output.clusters {
            let document_ids: Vec<Uuid> =
                cluster.member_indices.iter().map(|&i| fetched.ids[i]).collect();
            let row: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO topic_clusters
                    (analysis_id, topic_id, label, top_terms, size, document_ids,
                     coherence_score, is_valid, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?)
                RETURNING id
                "#,
            )
            .bind(analysis_id)
            .bind(cluster.topic_id)
            .bind(&cluster.label)
            .bind(sqlx::types::Json(json!(cluster.top_terms)))
            .bind(cluster.member_indices.len() as i32)
            .bind(sqlx::types::Json(json!(document_ids)))
            .bind(cluster.coherence_score)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
            topic_db_ids.insert(cluster.topic_id, row.0);

            if let Some(client_domain) = request.client_domain.as_deref() {
                let collection = articles_collection_name(client_domain);
                let point = VectorPoint {
                    id: Uuid::new_v4(),
                    vector: cluster.centroid.clone(),
                    payload: json!({ "topic_id": cluster.topic_id, "analysis_id": analysis_id.to_string() }),
                };
                if let Err(e) = self
                    .vector_store
                    .upsert(CENTROIDS_COLLECTION, vec![point])
                    .await
                {
                    tracing::warn!(error = %e, collection, "centroid upsert failed, continuing");
                }
            }
        }

        for outlier in &output.outliers {
            let document_id = fetched.ids[outlier.document_index];
            sqlx::query(
                r#"
                INSERT INTO topic_outliers
                    (analysis_id, document_id, potential_category, embedding_distance, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(analysis_id)
            .bind(document_id)
            .bind(&outlier.potential_category)
            .bind(outlier.embedding_distance)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            "UPDATE trend_pipeline_executions SET total_clusters = ?, total_outliers = ? WHERE execution_id = ?",
        )
        .bind(output.clusters.len() as i32)
        .bind(output.outliers.len() as i32)
        .bind(analysis_id)
        .execute(&self.pool)
        .await?;

        Ok(Stage1Outcome {
            embeddings,
            payloads: fetched.payloads,
            total_documents: fetched.ids.len() as i64,
            clusters: output.clusters.into_iter().map(|c| (c.topic_id, c)).collect(),
            topic_db_ids,
        })
    }

    /// Stage 2: per-cluster windowed metrics, persisted to `TopicTemporalMetrics`.
    /// Returns the full per-topic `TemporalMetrics`, not just `potential_score`,
    /// so stage 3 (LLM synthesis) and stage 4 (gap priority) see the real
    /// velocity/trend/diversity rather than placeholder constants.
    async fn run_stage_2(
        &self,
        analysis_id: Uuid,
        stage1: &Stage1Outcome,
    ) -> ApiResult<HashMap<i32, TemporalMetrics>> {
        self.set_stage_status(analysis_id, 2, "in_progress").await?;
        let now = Utc::now();
        let mut metrics_by_topic = HashMap::new();

        for (topic_id, cluster) in &stage1.clusters {
            let members: Vec<ClusterMember> = cluster
                .member_indices
                .iter()
                .map(|&i| ClusterMember {
                    domain: stage1.payloads[i]
                        .get("domain")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    published_date: stage1.payloads[i]
                        .get("published_date")
                        .and_then(Value::as_str)
                        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or(now),
                    embedding: stage1.embeddings[i].clone(),
                })
                .collect();

            let metrics =
                self.temporal_analyzer.analyze(&members, &cluster.centroid, now, stage1.total_documents);

            let Some(&topic_cluster_id) = stage1.topic_db_ids.get(topic_id) else { continue };
            sqlx::query(
                r#"
                INSERT INTO topic_temporal_metrics
                    (topic_cluster_id, window_start, window_end, volume, velocity,
                     freshness_ratio, source_diversity, cohesion_score, potential_score,
                     drift_detected, drift_distance, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(topic_cluster_id)
            .bind(now - chrono::Duration::days(30))
            .bind(now)
            .bind(metrics.volume as i32)
            .bind(metrics.velocity)
            .bind(metrics.freshness_ratio)
            .bind(metrics.source_diversity as i32)
            .bind(metrics.cohesion_score)
            .bind(metrics.potential_score)
            .bind(metrics.drift_detected)
            .bind(metrics.drift_distance)
            .bind(now)
            .execute(&self.pool)
            .await?;

            metrics_by_topic.insert(*topic_id, metrics);
        }

        Ok(metrics_by_topic)
    }

    /// Stage 3: LLM synthesis + article angles for the top-N clusters by
    /// potential score. Each topic's failure is isolated (spec §4.8 step 5).
    async fn run_stage_3(
        &self,
        analysis_id: Uuid,
        stage1: &Stage1Outcome,
        metrics_by_topic: &HashMap<i32, TemporalMetrics>,
        llm: Arc<LlmEnricher>,
    ) {
        self.set_stage_status(analysis_id, 3, "in_progress").await.ok();

        let mut ranked: Vec<(&i32, &TemporalMetrics)> = metrics_by_topic.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.potential_score.partial_cmp(&a.1.potential_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        let top_n: Vec<i32> = ranked.into_iter().take(self.config.top_n_for_llm).map(|(t, _)| *t).collect();

        let mut total_recos = 0i32;
        for topic_id in top_n {
            let Some(cluster) = stage1.clusters.get(&topic_id) else { continue };
            let Some(&topic_cluster_id) = stage1.topic_db_ids.get(&topic_id) else { continue };
            let Some(metrics) = metrics_by_topic.get(&topic_id) else { continue };

            let keywords: Vec<String> = cluster.top_terms.iter().map(|(t, _)| t.clone()).collect();
            let sample_docs: Vec<String> = cluster
                .member_indices
                .iter()
                .take(5)
                .map(|&i| {
                    stage1.payloads[i].get("text").and_then(Value::as_str).unwrap_or_default().to_string()
                })
                .collect();

            let synthesis_result = llm
                .synthesize_trend(
                    &cluster.label,
                    &keywords,
                    cluster.member_indices.len() as i64,
                    metrics.velocity,
                    trend_bucket_str(metrics.trend_bucket),
                    metrics.source_diversity,
                    &sample_docs,
                )
                .await;
            let synthesis = match synthesis_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, topic_id, "trend synthesis failed, skipping topic");
                    continue;
                }
            };

            if let Err(e) = sqlx::query(
                r#"
                INSERT INTO trend_analyses
                    (topic_cluster_id, synthesis, saturated_angles, opportunities, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(topic_cluster_id)
            .bind(&synthesis.synthesis)
            .bind(sqlx::types::Json(json!(synthesis.saturated_angles)))
            .bind(sqlx::types::Json(json!(synthesis.opportunities)))
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            {
                tracing::warn!(error = %e, topic_id, "trend_analyses insert failed");
                continue;
            }

            let angles = match llm
                .generate_article_angles(
                    &cluster.label,
                    &keywords,
                    &synthesis.saturated_angles,
                    &synthesis.opportunities,
                    self.config.recommendations_per_topic,
                )
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(error = %e, topic_id, "article angle generation failed");
                    continue;
                }
            };

            for angle in angles {
                if sqlx::query(
                    r#"
                    INSERT INTO article_recommendations
                        (topic_cluster_id, title, hook, outline, differentiation_score,
                         effort_level, status, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, 'suggested', ?)
                    "#,
                )
                .bind(topic_cluster_id)
                .bind(&angle.title)
                .bind(&angle.hook)
                .bind(sqlx::types::Json(json!(angle.outline)))
                .bind(angle.differentiation_score)
                .bind(&angle.effort_level)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .is_ok()
                {
                    total_recos += 1;
                }
            }
        }

        sqlx::query(
            "UPDATE trend_pipeline_executions SET total_recommendations = ? WHERE execution_id = ?",
        )
        .bind(total_recos)
        .bind(analysis_id)
        .execute(&self.pool)
        .await
        .ok();
    }

    /// Stage 4: coverage -> gaps/strengths -> roadmap, persisted to
    /// `ClientCoverageAnalysis`/`ContentRoadmap`.
    async fn run_stage_4(
        &self,
        analysis_id: Uuid,
        client_domain: &str,
        stage1: &Stage1Outcome,
        metrics_by_topic: &HashMap<i32, TemporalMetrics>,
    ) -> ApiResult<()> {
        self.set_stage_status(analysis_id, 4, "in_progress").await?;

        let topics: Vec<(i32, String)> =
            stage1.clusters.iter().map(|(id, c)| (*id, c.label.clone())).collect();
        let mut documents_by_topic: HashMap<i32, Vec<ClusterDocument>> = HashMap::new();
        for (topic_id, cluster) in &stage1.clusters {
            let docs = cluster
                .member_indices
                .iter()
                .map(|&i| ClusterDocument {
                    domain: stage1.payloads[i]
                        .get("domain")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect();
            documents_by_topic.insert(*topic_id, docs);
        }

        let coverage = self.gap_analyzer.analyze_coverage(client_domain, &topics, &documents_by_topic);

        let temporal_inputs: Vec<TemporalInput> = metrics_by_topic
            .iter()
            .map(|(&topic_id, metrics)| TemporalInput {
                topic_id,
                potential_score: metrics.potential_score,
                velocity: metrics.velocity,
            })
            .collect();

        let gaps = self.gap_analyzer.identify_gaps(&coverage, &temporal_inputs);
        let strengths = self.gap_analyzer.identify_strengths(&coverage);

        let mut gap_db_ids = HashMap::new();
        for cov in coverage.iter().filter(|c| {
            gaps.iter().any(|g| g.topic_id == c.topic_id)
                || strengths.iter().any(|s| s.topic_id == c.topic_id)
        }) {
            let Some(&topic_cluster_id) = stage1.topic_db_ids.get(&cov.topic_id) else { continue };
            let gap_priority = gaps
                .iter()
                .find(|g| g.topic_id == cov.topic_id)
                .map(|g| g.priority_score);
            let row: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO client_coverage_analyses
                    (client_domain, topic_cluster_id, client_count, competitor_count,
                     avg_competitor, coverage_score, level, gap_priority_score, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(client_domain)
            .bind(topic_cluster_id)
            .bind(cov.client_count as i32)
            .bind(cov.competitor_count as i32)
            .bind(if cov.competitor_count > 0 {
                cov.competitor_count as f64 / cov.num_sources.max(1) as f64
            } else {
                0.0
            })
            .bind(cov.coverage_score)
            .bind(coverage_level_str(cov.coverage_level))
            .bind(gap_priority)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
            gap_db_ids.insert(cov.topic_id, row.0);
        }

        sqlx::query("UPDATE trend_pipeline_executions SET total_gaps = ? WHERE execution_id = ?")
            .bind(gaps.len() as i32)
            .bind(analysis_id)
            .execute(&self.pool)
            .await?;

        let recommendations: Vec<(i32, RecommendationInput)> = {
            let mut out = Vec::new();
            for (&topic_id, &topic_cluster_id) in &stage1.topic_db_ids {
                let rows: Vec<(i64, String, String)> = sqlx::query_as(
                    "SELECT id, title, effort_level FROM article_recommendations WHERE topic_cluster_id = ?",
                )
                .bind(topic_cluster_id)
                .fetch_all(&self.pool)
                .await?;
                for (id, title, effort_level) in rows {
                    out.push((
                        topic_id,
                        RecommendationInput { id, topic_cluster_id: topic_id, title, effort_level },
                    ));
                }
            }
            out
        };
        let recommendation_inputs: Vec<RecommendationInput> =
            recommendations.into_iter().map(|(_, r)| r).collect();

        let roadmap = self.gap_analyzer.build_roadmap(&gaps, &recommendation_inputs);
        for item in roadmap {
            let Some(&gap_db_id) = gap_db_ids.get(&item.gap_topic_id) else { continue };
            let recommendation_db_id = item.recommendation_id;
            sqlx::query(
                r#"
                INSERT INTO content_roadmaps
                    (client_domain, gap_id, recommendation_id, priority_order, priority_tier,
                     estimated_effort, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(client_domain)
            .bind(gap_db_id)
            .bind(recommendation_db_id)
            .bind(item.priority_order)
            .bind(item.priority_tier)
            .bind(&item.estimated_effort)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

fn trend_bucket_str(bucket: TrendBucket) -> &'static str {
    match bucket {
        TrendBucket::Accelerating => "accelerating",
        TrendBucket::Decelerating => "decelerating",
        TrendBucket::Stable => "stable",
    }
}

fn coverage_level_str(level: crate::services::gap_analyzer::CoverageLevel) -> &'static str {
    use crate::services::gap_analyzer::CoverageLevel::*;
    match level {
        Excellent => "excellent",
        Good => "good",
        Weak => "weak",
        Gap => "gap",
    }
}

struct Stage1Outcome {
    embeddings: Vec<Vec<f32>>,
    payloads: Vec<Value>,
    total_documents: i64,
    clusters: HashMap<i32, crate::services::clusterer::ClusterResult>,
    topic_db_ids: HashMap<i32, i64>,
}

#[allow(dead_code)]
fn is_outlier(topic_id: i32) -> bool {
    topic_id == OUTLIER_TOPIC_ID
}
