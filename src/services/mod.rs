pub mod audit_orchestrator;
pub mod clusterer;
pub mod collaborators;
pub mod embedding_fetcher;
pub mod execution_store;
pub mod gap_analyzer;
pub mod gpu_owner;
pub mod llm_client;
pub mod llm_enricher;
pub mod temporal_analyzer;
pub mod trend_pipeline;
pub mod vector_store;

pub use audit_orchestrator::{
    AuditOrchestrator, AuditOrchestratorConfig, AuditStatusResponse, DataStatus,
    PendingAuditResponse, SiteAuditResponse, StartAuditOutcome, WorkflowStepStatus,
};
pub use clusterer::{ClusterResult, Clusterer, ClusteringConfig, ClusteringOutput, OutlierResult};
pub use collaborators::{
    ArticleScraper, CompetitorCandidate, CompetitorSearcher, EditorialAnalysisClient,
    HttpArticleScraper, HttpCompetitorSearcher, HttpEditorialAnalysisClient, HttpImageGenerator,
    ImageGenerator, ScrapedArticle, SiteProfileResult,
};
pub use embedding_fetcher::{EmbeddingFetcher, FetchedEmbeddings};
pub use execution_store::{ExecutionStore, UpdateExecution};
pub use gpu_owner::{GpuModelOwner, GpuOwner};
pub use gap_analyzer::{
    ClusterDocument, CoverageLevel, CoverageResult, CoverageThresholds, EffortDistribution, Gap,
    GapAnalyzer, PriorityDistribution, PriorityWeights, RecommendationInput, RoadmapItem, Strength,
    TemporalInput,
};
pub use llm_client::LlmClient;
pub use llm_enricher::{ArticleAngle, LlmEnricher, OutlierAnalysis, TrendSynthesis};
pub use temporal_analyzer::{
    ClusterMember, DiversityBucket, DriftConfig, FreshnessBucket, HistogramBin,
    PotentialWeights, TemporalAnalyzer, TemporalMetrics, TrendBucket,
};
pub use trend_pipeline::{TrendPipeline, TrendPipelineConfig, TrendPipelineRequest};
pub use vector_store::{ScoredPoint, VectorPoint, VectorStore};
