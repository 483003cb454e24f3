//! Shared enums used across the execution, trend and gap-analysis models.
//! Kept as plain `String`-backed enums (rather than sqlx `Type` derives) so a
//! row with a value outside the known set deserializes instead of failing
//! the whole query — matching the original's permissive string columns.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    EditorialAnalysis,
    CompetitorSearch,
    Scraping,
    ClientScraping,
    TrendsAnalysis,
    TrendPipeline,
    ArticleGeneration,
    AuditOrchestrator,
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowType::EditorialAnalysis => "editorial_analysis",
            WorkflowType::CompetitorSearch => "competitor_search",
            WorkflowType::Scraping => "scraping",
            WorkflowType::ClientScraping => "client_scraping",
            WorkflowType::TrendsAnalysis => "trends_analysis",
            WorkflowType::TrendPipeline => "trend_pipeline",
            WorkflowType::ArticleGeneration => "article_generation",
            WorkflowType::AuditOrchestrator => "audit_orchestrator",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkflowType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "editorial_analysis" => WorkflowType::EditorialAnalysis,
            "competitor_search" => WorkflowType::CompetitorSearch,
            "scraping" => WorkflowType::Scraping,
            "client_scraping" => WorkflowType::ClientScraping,
            "trends_analysis" => WorkflowType::TrendsAnalysis,
            "trend_pipeline" => WorkflowType::TrendPipeline,
            "article_generation" => WorkflowType::ArticleGeneration,
            "audit_orchestrator" => WorkflowType::AuditOrchestrator,
            other => return Err(format!("unknown workflow_type: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => WorkflowStatus::Pending,
            "running" => WorkflowStatus::Running,
            "completed" => WorkflowStatus::Completed,
            "failed" => WorkflowStatus::Failed,
            other => return Err(format!("unknown status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => StageStatus::Pending,
            "in_progress" => StageStatus::InProgress,
            "completed" => StageStatus::Completed,
            "failed" => StageStatus::Failed,
            "skipped" => StageStatus::Skipped,
            other => return Err(format!("unknown stage status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EffortLevel {
    Easy,
    Medium,
    Complex,
}

impl EffortLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EffortLevel::Easy => "easy",
            EffortLevel::Medium => "medium",
            EffortLevel::Complex => "complex",
        }
    }
}

impl std::str::FromStr for EffortLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "easy" => EffortLevel::Easy,
            "medium" => EffortLevel::Medium,
            "complex" => EffortLevel::Complex,
            other => return Err(format!("unknown effort level: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Suggested,
    Accepted,
    Rejected,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}
