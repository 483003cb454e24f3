//! C2 — VectorStore adapter: a thin wrapper around Qdrant exposing exactly
//! the operations the trend pipeline needs (spec §4.2). Grounded on
//! `examples/dropbox-dTOOL/dashflow/crates/dashflow-qdrant/src/qdrant.rs`'s
//! `qdrant-client` usage (`Qdrant::from_url(...).build()`, the
//! `UpsertPointsBuilder`/`Filter`/`Condition` builder idiom).

use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config::Config as VectorsConfigOneOf, CreateCollectionBuilder,
    Distance, FieldCondition, Filter, GetPointsBuilder, Match, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: Value,
}

pub struct VectorStore {
    client: Qdrant,
}

impl VectorStore {
    pub fn connect(url: &str, api_key: Option<&str>, timeout: Duration) -> ApiResult<Self> {
        let mut builder = Qdrant::from_url(url).timeout(timeout);
        if let Some(key) = api_key {
            builder = builder.api_key(Some(key.to_string()));
        }
        let client = builder.build().map_err(|e| ApiError::Transient(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn collection_exists(&self, name: &str) -> ApiResult<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))
    }

    pub async fn create_collection(&self, name: &str, dim: u64) -> ApiResult<()> {
        let vectors_config = VectorsConfig {
            config: Some(VectorsConfigOneOf::Params(VectorParams {
                size: dim,
                distance: Distance::Cosine.into(),
                ..Default::default()
            })),
        };
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(vectors_config),
            )
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        Ok(())
    }

    pub async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> ApiResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let structs: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload: Payload = payload_from_json(p.payload);
                PointStruct::new(p.id.to_string(), p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs))
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        Ok(())
    }

    /// Scrolls the whole collection (optionally filtered by domain), paging
    /// until exhausted or `limit` is reached. A missing collection is not
    /// fatal upstream (spec §4.2) — returns an empty vec instead of erroring.
    pub async fn scroll(
        &self,
        collection: &str,
        domain_filter: Option<&[String]>,
        limit: usize,
    ) -> ApiResult<Vec<VectorPoint>> {
        if !self.collection_exists(collection).await? {
            tracing::warn!(collection, "vector collection absent, returning empty scroll");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut offset = None;
        let page_size = 256usize.min(limit.max(1));

        loop {
            let mut builder = ScrollPointsBuilder::new(collection)
                .limit(page_size as u32)
                .with_payload(true)
                .with_vectors(true);
            if let Some(domains) = domain_filter {
                builder = builder.filter(domain_in_filter(domains));
            }
            if let Some(off) = offset.take() {
                builder = builder.offset(off);
            }

            let resp = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| ApiError::Transient(e.to_string()))?;

            for point in &resp.result {
                out.push(point_to_vector_point(point));
                if out.len() >= limit {
                    return Ok(out);
                }
            }

            match resp.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
            if resp.result.is_empty() {
                break;
            }
        }
        Ok(out)
    }

    pub async fn retrieve(&self, collection: &str, ids: &[Uuid]) -> ApiResult<Vec<VectorPoint>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    collection,
                    ids.iter().map(|id| id.to_string().into()).collect(),
                )
                .with_payload(true)
                .with_vectors(true),
            )
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        Ok(resp.result.iter().map(point_to_vector_point).collect())
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        k: u64,
        score_threshold: Option<f32>,
    ) -> ApiResult<Vec<ScoredPoint>> {
        let mut builder = SearchPointsBuilder::new(collection, vector, k).with_payload(true);
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }
        let resp = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;

        Ok(resp
            .result
            .into_iter()
            .map(|p| ScoredPoint {
                id: point_id_to_uuid(p.id.as_ref()),
                score: p.score,
                payload: payload_to_json(&p.payload),
            })
            .collect())
    }
}

fn domain_in_filter(domains: &[String]) -> Filter {
    Filter::must([FieldCondition {
        key: "domain".to_string(),
        r#match: Some(Match {
            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keywords(
                qdrant_client::qdrant::RepeatedStrings { strings: domains.to_vec() },
            )),
        }),
        ..Default::default()
    }
    .into()])
}

fn payload_from_json(value: Value) -> Payload {
    match value {
        Value::Object(_) => Payload::try_from(value).unwrap_or_default(),
        _ => Payload::default(),
    }
}

fn payload_to_json(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in payload {
        if let Ok(json) = serde_json::to_value(v) {
            map.insert(k.clone(), json);
        }
    }
    Value::Object(map)
}

fn point_to_vector_point(point: &qdrant_client::qdrant::RetrievedPoint) -> VectorPoint {
    VectorPoint {
        id: point_id_to_uuid(point.id.as_ref()),
        vector: point
            .vectors
            .as_ref()
            .and_then(|v| v.vectors_options.as_ref())
            .map(|opt| match opt {
                qdrant_client::qdrant::vectors::VectorsOptions::Vector(v) => v.data.clone(),
                _ => Vec::new(),
            })
            .unwrap_or_default(),
        payload: payload_to_json(&point.payload),
    }
}

fn point_id_to_uuid(id: Option<&qdrant_client::qdrant::PointId>) -> Uuid {
    id.and_then(|id| id.point_id_options.as_ref())
        .and_then(|opt| match opt {
            PointIdOptions::Uuid(s) => Uuid::parse_str(s).ok(),
            PointIdOptions::Num(n) => Some(Uuid::from_u128(*n as u128)),
        })
        .unwrap_or_else(Uuid::nil)
}
