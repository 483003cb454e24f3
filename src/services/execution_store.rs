//! C1 — ExecutionStore: persists workflow executions, audit logs and
//! performance metrics. Grounded on
//! `original_source/.../database/crud_executions.py`: `create_workflow_execution`,
//! `update_workflow_execution` (start/end-time stamping, terminal-state
//! idempotence, JSON-safety normalization of `output_data`), and the
//! connection-error detection used to decide whether a write is retryable.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{
    AuditLog, ErrorLog, MetricsSummary, PerformanceMetric, WorkflowExecution, WorkflowStatus,
};
use crate::utils::{is_connection_error, make_json_serializable, ApiError, ApiResult};

#[derive(Debug, Default)]
pub struct UpdateExecution {
    pub status: Option<WorkflowStatus>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub was_success: Option<bool>,
}

pub struct ExecutionStore {
    pool: SqlitePool,
}

impl ExecutionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_execution(
        &self,
        workflow_type: &str,
        domain: Option<&str>,
        input_data: Value,
        status: WorkflowStatus,
        parent_execution_id: Option<Uuid>,
    ) -> ApiResult<WorkflowExecution> {
        let execution_id = Uuid::new_v4();
        let now = Utc::now();
        let start_time = matches!(status, WorkflowStatus::Running).then_some(now);

        let row = sqlx::query_as::<_, WorkflowExecution>(
            r#"
            INSERT INTO workflow_executions
                (execution_id, workflow_type, domain, status, input_data, parent_execution_id,
                 start_time, is_valid, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            RETURNING *
            "#,
        )
        .bind(execution_id)
        .bind(workflow_type)
        .bind(domain)
        .bind(status.as_str())
        .bind(sqlx::types::Json(input_data))
        .bind(parent_execution_id)
        .bind(start_time)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_execution(&self, execution_id: Uuid) -> ApiResult<Option<WorkflowExecution>> {
        let row = sqlx::query_as::<_, WorkflowExecution>(
            "SELECT * FROM workflow_executions WHERE execution_id = ? AND is_valid = TRUE",
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Finds the latest terminal execution of `workflow_type` for `domain`,
    /// optionally restricted to `statuses`.
    pub async fn find_latest(
        &self,
        workflow_type: &str,
        domain: &str,
        statuses: &[WorkflowStatus],
    ) -> ApiResult<Option<WorkflowExecution>> {
        let status_list: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let placeholders = status_list.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT * FROM workflow_executions \
             WHERE workflow_type = ? AND domain = ? AND is_valid = TRUE \
             AND status IN ({placeholders}) \
             ORDER BY created_at DESC LIMIT 1"
        );
        let mut query = sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(workflow_type)
            .bind(domain);
        for s in status_list {
            query = query.bind(s);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Looks for an in-flight (`pending`/`running`) execution of
    /// `workflow_type` for `domain`. Used by the audit orchestrator's
    /// race-free launch gate (spec §4.9 step 7): the real race-closer is the
    /// partial unique index in `migrations/`, this is the fast-path read.
    pub async fn find_in_flight(
        &self,
        workflow_type: &str,
        domain: &str,
    ) -> ApiResult<Option<WorkflowExecution>> {
        self.find_latest(workflow_type, domain, &[WorkflowStatus::Pending, WorkflowStatus::Running])
            .await
    }

    /// Updates an execution, stamping `start_time`/`end_time`/`duration_seconds`
    /// per spec §4.1 and normalizing `output_data` via the JSON-safety pass.
    /// Never reverts a terminal state (spec §3, §8 idempotence property).
    pub async fn update_execution(
        &self,
        execution_id: Uuid,
        update: UpdateExecution,
    ) -> ApiResult<WorkflowExecution> {
        let current = self
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("execution {execution_id} not found")))?;

        let current_status: WorkflowStatus = current.status.parse().map_err(ApiError::Fatal)?;
        if current_status.is_terminal() {
            // Idempotent: terminal states are absorbing. A caller re-applying the
            // same terminal status is a no-op; a caller asking to move away from
            // terminal is a programming error we surface rather than silently drop.
            if let Some(new_status) = update.status {
                if new_status != current_status {
                    return Ok(current);
                }
            } else {
                return Ok(current);
            }
        }

        let now = Utc::now();
        let next_status = update.status.unwrap_or(current_status);

        let start_time = current.start_time.or_else(|| {
            matches!(next_status, WorkflowStatus::Running).then_some(now)
        });

        let (end_time, duration_seconds) = if next_status.is_terminal() {
            let end = now;
            let start = start_time.unwrap_or(end);
            let duration = (end - start).num_milliseconds() as f64 / 1000.0;
            (Some(end), Some(duration.max(0.0)))
        } else {
            (current.end_time, current.duration_seconds)
        };

        let output_data = update
            .output_data
            .map(make_json_serializable)
            .map(sqlx::types::Json)
            .or(current.output_data);

        let error_message = update.error_message.or(current.error_message);
        let was_success = update.was_success.or(current.was_success);

        let row = sqlx::query_as::<_, WorkflowExecution>(
            r#"
            UPDATE workflow_executions SET
                status = ?, output_data = ?, error_message = ?, was_success = ?,
                start_time = ?, end_time = ?, duration_seconds = ?, updated_at = ?
            WHERE execution_id = ?
            RETURNING *
            "#,
        )
        .bind(next_status.as_str())
        .bind(output_data)
        .bind(error_message)
        .bind(was_success)
        .bind(start_time)
        .bind(end_time)
        .bind(duration_seconds)
        .bind(now)
        .bind(execution_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Appends an audit log row. Failures here must never abort the caller's
    /// primary operation (spec §4.1 "Failure semantics") — callers should
    /// `tracing::warn!` and continue on `Err`, never propagate.
    pub async fn append_audit_log(
        &self,
        execution_id: Option<Uuid>,
        action: &str,
        agent_name: &str,
        step_name: Option<&str>,
        status: &str,
        message: &str,
        details: Option<Value>,
        error_traceback: Option<&str>,
    ) -> ApiResult<AuditLog> {
        let row = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs
                (execution_id, action, agent_name, step_name, status, message, details,
                 error_traceback, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(execution_id)
        .bind(action)
        .bind(agent_name)
        .bind(step_name)
        .bind(status)
        .bind(message)
        .bind(details.map(sqlx::types::Json))
        .bind(error_traceback)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_connection_error(&e) {
                ApiError::Transient(e.to_string())
            } else {
                ApiError::from(e)
            }
        })?;
        Ok(row)
    }

    /// Writes an append-only `ErrorLog` row (spec §7 kind 7 "fatal errors").
    /// Same never-abort-the-caller contract as `append_audit_log`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_error_log(
        &self,
        component: &str,
        severity: &str,
        domain: Option<&str>,
        agent_name: Option<&str>,
        execution_id: Option<Uuid>,
        message: &str,
        traceback: Option<&str>,
        context: Option<Value>,
    ) -> ApiResult<ErrorLog> {
        let row = sqlx::query_as::<_, ErrorLog>(
            r#"
            INSERT INTO error_logs
                (component, severity, domain, agent_name, execution_id, message, traceback,
                 context, is_resolved, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?)
            RETURNING *
            "#,
        )
        .bind(component)
        .bind(severity)
        .bind(domain)
        .bind(agent_name)
        .bind(execution_id)
        .bind(message)
        .bind(traceback)
        .bind(context.map(sqlx::types::Json))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_connection_error(&e) {
                ApiError::Transient(e.to_string())
            } else {
                ApiError::from(e)
            }
        })?;
        Ok(row)
    }

    pub async fn create_performance_metric(
        &self,
        execution_id: Uuid,
        agent_name: &str,
        metric_type: &str,
        metric_value: f64,
        metric_unit: Option<&str>,
        additional_data: Option<Value>,
    ) -> ApiResult<PerformanceMetric> {
        let row = sqlx::query_as::<_, PerformanceMetric>(
            r#"
            INSERT INTO performance_metrics
                (execution_id, agent_name, metric_type, metric_value, metric_unit,
                 additional_data, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(execution_id)
        .bind(agent_name)
        .bind(metric_type)
        .bind(metric_value)
        .bind(metric_unit)
        .bind(additional_data.map(sqlx::types::Json))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_performance_metrics_batch(
        &self,
        execution_id: Uuid,
        agent_name: &str,
        metrics: Vec<(String, f64, Option<String>)>,
    ) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for (metric_type, metric_value, metric_unit) in metrics {
            sqlx::query(
                r#"
                INSERT INTO performance_metrics
                    (execution_id, agent_name, metric_type, metric_value, metric_unit, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(execution_id)
            .bind(agent_name)
            .bind(metric_type)
            .bind(metric_value)
            .bind(metric_unit)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Groups metrics by `metric_type`, returning `{total, count, average, unit}`.
    pub async fn get_metrics_summary(&self, execution_id: Uuid) -> ApiResult<Vec<MetricsSummary>> {
        let rows: Vec<(String, f64, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT metric_type, SUM(metric_value) as total, COUNT(*) as count,
                   MAX(metric_unit) as unit
            FROM performance_metrics
            WHERE execution_id = ?
            GROUP BY metric_type
            "#,
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(metric_type, total, count, unit)| MetricsSummary {
                metric_type,
                total,
                count,
                average: if count > 0 { total / count as f64 } else { 0.0 },
                unit,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn update_is_idempotent_once_terminal() {
        let pool = test_pool().await;
        let store = ExecutionStore::new(pool);
        let exec = store
            .create_execution("trend_pipeline", Some("acme.test"), serde_json::json!({}), WorkflowStatus::Running, None)
            .await
            .unwrap();

        let completed = store
            .update_execution(
                exec.execution_id,
                UpdateExecution {
                    status: Some(WorkflowStatus::Completed),
                    was_success: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(completed.end_time.is_some());
        let first_end = completed.end_time;

        let reapplied = store
            .update_execution(
                exec.execution_id,
                UpdateExecution { status: Some(WorkflowStatus::Completed), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(reapplied.end_time, first_end);

        let flip_attempt = store
            .update_execution(
                exec.execution_id,
                UpdateExecution { status: Some(WorkflowStatus::Running), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(flip_attempt.status, "completed");
    }

    #[tokio::test]
    async fn error_log_defaults_unresolved() {
        let pool = test_pool().await;
        let store = ExecutionStore::new(pool);
        let row = store
            .create_error_log(
                "trend_pipeline",
                "error",
                Some("acme.test"),
                Some("trend_pipeline"),
                None,
                "stage 1 failed",
                Some("traceback here"),
                None,
            )
            .await
            .unwrap();
        assert!(!row.is_resolved);
        assert_eq!(row.component, "trend_pipeline");
    }
}
