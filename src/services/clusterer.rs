//! C4 — Clusterer: density-based topic clustering with labeling, coherence
//! scoring and outlier extraction (spec §4.4). This is the CPU-bound compute
//! block the orchestrator offloads to `spawn_blocking` (spec §5) — it is not
//! suspendable internally. Algorithm grounded at design level on
//! `original_source/.../agents/trend_pipeline/clustering/` (UMAP-style
//! reduction -> HDBSCAN-style density clustering -> c-TF-IDF labeling), using
//! `ndarray` for the matrix work (the corpus's linear-algebra crate, per
//! `sibyllinesoft-valknut`'s `Cargo.toml`).

use ndarray::{Array1, Array2, Axis};
use std::collections::{HashMap, HashSet};

use crate::utils::ApiError;

pub const DEFAULT_MIN_ARTICLES: usize = 30;
pub const MAX_ARTICLES: usize = 50_000;
pub const OUTLIER_TOPIC_ID: i32 = -1;

#[derive(Clone)]
pub struct ClusteringConfig {
    pub min_cluster_size: usize,
    pub reduced_dim: usize,
    pub top_k_terms: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { min_cluster_size: 5, reduced_dim: 8, top_k_terms: 5 }
    }
}

pub struct ClusterResult {
    pub topic_id: i32,
    pub label: String,
    pub top_terms: Vec<(String, f64)>,
    pub member_indices: Vec<usize>,
    pub coherence_score: f64,
    pub centroid: Vec<f32>,
}

pub struct OutlierResult {
    pub document_index: usize,
    pub nearest_cluster_topic_id: i32,
    pub embedding_distance: f64,
    pub potential_category: String,
}

pub struct ClusteringOutput {
    pub clusters: Vec<ClusterResult>,
    pub outliers: Vec<OutlierResult>,
    pub dropped_nan: usize,
}

#[derive(Clone)]
pub struct Clusterer {
    config: ClusteringConfig,
}

impl Clusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Runs the whole pipeline synchronously; callers run this inside
    /// `tokio::task::spawn_blocking`. `texts[i]` must correspond to
    /// `embeddings[i]`.
    pub fn cluster(
        &self,
        embeddings: &[Vec<f32>],
        texts: &[String],
        min_articles: usize,
    ) -> Result<ClusteringOutput, ApiError> {
        if embeddings.len() < min_articles {
            return Err(ApiError::DataShape(format!(
                "Not enough articles ({}). Minimum: {}",
                embeddings.len(),
                min_articles
            )));
        }
        if embeddings.len() > MAX_ARTICLES {
            return Err(ApiError::DataShape(format!(
                "Too many articles ({}). Maximum: {}",
                embeddings.len(),
                MAX_ARTICLES
            )));
        }

        // Drop rows with a non-finite (NaN/inf) embedding before any of the
        // linear algebra below runs (spec §4.4 "Edge cases"); `valid_indices`
        // maps the filtered, contiguous working set back to the caller's
        // original row numbers so `member_indices`/outlier indices still line
        // up with `fetched.ids` downstream.
        let valid_indices: Vec<usize> = (0..embeddings.len())
            .filter(|&i| embeddings[i].iter().all(|v| v.is_finite()))
            .collect();
        let dropped_nan = embeddings.len() - valid_indices.len();
        let embeddings: Vec<Vec<f32>> = valid_indices.iter().map(|&i| embeddings[i].clone()).collect();
        let texts: Vec<String> = valid_indices.iter().map(|&i| texts[i].clone()).collect();

        let matrix = to_matrix(&embeddings);
        let reduced = reduce_dimensions(&matrix, self.config.reduced_dim);
        let labels = density_cluster(&reduced, self.config.min_cluster_size);

        let mut by_topic: HashMap<i32, Vec<usize>> = HashMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_topic.entry(label).or_default().push(idx);
        }

        let corpus_doc_freq = document_frequencies(&texts);
        let mut clusters = Vec::new();
        for (&topic_id, local_indices) in by_topic.iter().filter(|(id, _)| **id != OUTLIER_TOPIC_ID) {
            let member_embeddings: Vec<&Vec<f32>> =
                local_indices.iter().map(|&i| &embeddings[i]).collect();
            let member_texts: Vec<&str> = local_indices.iter().map(|&i| texts[i].as_str()).collect();

            let top_terms = class_based_tfidf(
                &member_texts,
                &corpus_doc_freq,
                texts.len(),
                self.config.top_k_terms,
            );
            let label = top_terms
                .iter()
                .take(3)
                .map(|(term, _)| term.as_str())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_lowercase();
            let coherence = mean_pairwise_cosine(&member_embeddings);
            let centroid = centroid_of(&member_embeddings);

            clusters.push(ClusterResult {
                topic_id,
                label: if label.is_empty() { format!("topic-{topic_id}") } else { label },
                top_terms,
                member_indices: local_indices.iter().map(|&i| valid_indices[i]).collect(),
                coherence_score: coherence,
                centroid,
            });
        }

        // Tie-break equal top-term sets: higher coherence first, then lower topic_id.
        clusters.sort_by(|a, b| {
            b.coherence_score
                .partial_cmp(&a.coherence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.topic_id.cmp(&b.topic_id))
        });

        let outlier_local_indices = by_topic.get(&OUTLIER_TOPIC_ID).cloned().unwrap_or_default();
        let outliers = outlier_local_indices
            .into_iter()
            .map(|local_idx| {
                build_outlier(valid_indices[local_idx], &embeddings[local_idx], &texts[local_idx], &clusters)
            })
            .collect();

        Ok(ClusteringOutput { clusters, outliers, dropped_nan })
    }
}

fn to_matrix(embeddings: &[Vec<f32>]) -> Array2<f32> {
    let n = embeddings.len();
    let d = embeddings.first().map(|e| e.len()).unwrap_or(0);
    let mut matrix = Array2::<f32>::zeros((n, d));
    for (i, row) in embeddings.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }
    matrix
}

/// Neighborhood-preserving projection to `target_dim`, approximated here by
/// a mean-centered PCA via power iteration (UMAP-style at design level per
/// spec §4.4 step 1 — not a literal UMAP implementation).
fn reduce_dimensions(matrix: &Array2<f32>, target_dim: usize) -> Array2<f32> {
    let (n, d) = matrix.dim();
    let target_dim = target_dim.min(d).max(1);
    if d <= target_dim {
        return matrix.clone();
    }

    let mean = matrix.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    let centered = matrix - &mean;

    let mut components = Vec::with_capacity(target_dim);
    let mut residual = centered.clone();
    for _ in 0..target_dim {
        let mut v = Array1::<f32>::ones(d);
        for _ in 0..20 {
            let projected = residual.dot(&v);
            let mut next = residual.t().dot(&projected);
            let norm = next.dot(&next).sqrt();
            if norm > 1e-9 {
                next /= norm;
            }
            v = next;
        }
        let scores = residual.dot(&v);
        for i in 0..n {
            for j in 0..d {
                residual[[i, j]] -= scores[i] * v[j];
            }
        }
        components.push((scores, v));
    }

    let mut reduced = Array2::<f32>::zeros((n, target_dim));
    for (col, (scores, _)) in components.into_iter().enumerate() {
        for row in 0..n {
            reduced[[row, col]] = scores[row];
        }
    }
    reduced
}

/// HDBSCAN-style density clustering (spec §4.4 step 2), approximated with a
/// mutual-k-nearest-neighbor density threshold: a point is core if at least
/// `min_cluster_size` neighbors lie within the median pairwise distance,
/// clusters are connected components of core points' neighbor graphs, and
/// a non-core point adopts its nearest core cluster if within range, else `-1`.
fn density_cluster(reduced: &Array2<f32>, min_cluster_size: usize) -> Vec<i32> {
    let n = reduced.nrows();
    let mut dist = vec![vec![0.0f32; n]; n];
    let mut all_dists = Vec::with_capacity(n * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&reduced.row(i).to_vec(), &reduced.row(j).to_vec());
            dist[i][j] = d;
            dist[j][i] = d;
            all_dists.push(d);
        }
    }
    all_dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let eps = all_dists.get(all_dists.len() / 10).copied().unwrap_or(1.0).max(1e-6);

    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| j != i && dist[i][j] <= eps).collect())
        .collect();
    let is_core: Vec<bool> = neighbors.iter().map(|ns| ns.len() >= min_cluster_size).collect();

    let mut labels = vec![OUTLIER_TOPIC_ID; n];
    let mut next_topic = 0i32;
    let mut visited = vec![false; n];

    for seed in 0..n {
        if visited[seed] || !is_core[seed] {
            continue;
        }
        let topic_id = next_topic;
        next_topic += 1;
        let mut stack = vec![seed];
        visited[seed] = true;
        labels[seed] = topic_id;
        while let Some(cur) = stack.pop() {
            if !is_core[cur] {
                continue;
            }
            for &nb in &neighbors[cur] {
                if !visited[nb] {
                    visited[nb] = true;
                    labels[nb] = topic_id;
                    stack.push(nb);
                }
            }
        }
    }

    // Non-core points join the nearest core cluster within eps, else stay outliers.
    for i in 0..n {
        if labels[i] != OUTLIER_TOPIC_ID {
            continue;
        }
        let mut best: Option<(f32, i32)> = None;
        for &nb in &neighbors[i] {
            if labels[nb] != OUTLIER_TOPIC_ID {
                let d = dist[i][nb];
                if best.map(|(bd, _)| d < bd).unwrap_or(true) {
                    best = Some((d, labels[nb]));
                }
            }
        }
        if let Some((_, topic)) = best {
            labels[i] = topic;
        }
    }

    labels
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { (dot / (na * nb)) as f64 }
}

/// Mean pairwise cosine similarity, corrected to exclude self-pairs, mapped
/// to `[0,1]` (spec §4.4 step 5 / §4.5 cohesion formula).
fn mean_pairwise_cosine(members: &[&Vec<f32>]) -> f64 {
    let n = members.len();
    if n < 2 {
        return 1.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sum += cosine(members[i], members[j]);
            }
        }
    }
    let raw = sum / (n * (n - 1)) as f64;
    ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn centroid_of(members: &[&Vec<f32>]) -> Vec<f32> {
    let d = members.first().map(|m| m.len()).unwrap_or(0);
    let mut sum = vec![0.0f32; d];
    for m in members {
        for (i, v) in m.iter().enumerate() {
            sum[i] += v;
        }
    }
    let n = members.len().max(1) as f32;
    sum.iter().map(|v| v / n).collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .collect()
}

fn document_frequencies(texts: &[String]) -> HashMap<String, usize> {
    let mut df = HashMap::new();
    for text in texts {
        let unique: HashSet<String> = tokenize(text).into_iter().collect();
        for term in unique {
            *df.entry(term).or_insert(0) += 1;
        }
    }
    df
}

/// Class-based TF-IDF (spec §4.4 step 3): term importance across the joined
/// text of a cluster's members, scored against the whole corpus' document
/// frequency so terms common to every cluster are downweighted.
fn class_based_tfidf(
    cluster_texts: &[&str],
    corpus_doc_freq: &HashMap<String, usize>,
    corpus_size: usize,
    top_k: usize,
) -> Vec<(String, f64)> {
    let mut term_counts: HashMap<String, usize> = HashMap::new();
    let mut total_terms = 0usize;
    for text in cluster_texts {
        for term in tokenize(text) {
            *term_counts.entry(term).or_insert(0) += 1;
            total_terms += 1;
        }
    }
    let total_terms = total_terms.max(1) as f64;

    let mut scored: Vec<(String, f64)> = term_counts
        .into_iter()
        .map(|(term, count)| {
            let tf = count as f64 / total_terms;
            let df = *corpus_doc_freq.get(&term).unwrap_or(&1) as f64;
            let idf = ((corpus_size as f64 + 1.0) / (df + 1.0)).ln() + 1.0;
            (term, tf * idf)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Rule-based category for an outlier's text (spec §4.4 "Outlier handling").
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("product_launch", &["launch", "release", "unveil", "announce"]),
    ("regulatory", &["regulation", "compliance", "law", "policy"]),
    ("financial", &["revenue", "funding", "investment", "earnings"]),
    ("partnership", &["partnership", "acquisition", "merger", "deal"]),
];

fn categorize(text: &str) -> String {
    let lower = text.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category.to_string();
        }
    }
    "uncategorized".to_string()
}

fn build_outlier(
    idx: usize,
    embedding: &[f32],
    text: &str,
    clusters: &[ClusterResult],
) -> OutlierResult {
    let mut best: Option<(i32, f64)> = None;
    for cluster in clusters {
        let d = euclidean(embedding, &cluster.centroid) as f64;
        if best.map(|(_, bd)| d < bd).unwrap_or(true) {
            best = Some((cluster.topic_id, d));
        }
    }
    let (nearest_cluster_topic_id, embedding_distance) = best.unwrap_or((OUTLIER_TOPIC_ID, 0.0));

    OutlierResult {
        document_index: idx,
        nearest_cluster_topic_id,
        embedding_distance,
        potential_category: categorize(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_below_min_articles() {
        let clusterer = Clusterer::new(ClusteringConfig::default());
        let embeddings = vec![vec![0.0, 1.0]; 10];
        let texts = vec!["x".to_string(); 10];
        let err = clusterer.cluster(&embeddings, &texts, 30).unwrap_err();
        match err {
            ApiError::DataShape(msg) => assert!(msg.contains("Minimum: 30")),
            _ => panic!("expected data shape error"),
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn drops_nan_rows_and_counts_them() {
        let clusterer = Clusterer::new(ClusteringConfig::default());
        let mut embeddings = vec![vec![0.0, 1.0]; 30];
        embeddings[5] = vec![f32::NAN, 1.0];
        embeddings[12] = vec![0.0, f32::NAN];
        let texts = vec!["x".to_string(); 30];
        let output = clusterer.cluster(&embeddings, &texts, 28).unwrap();
        assert_eq!(output.dropped_nan, 2);
        for cluster in &output.clusters {
            assert!(!cluster.member_indices.contains(&5));
            assert!(!cluster.member_indices.contains(&12));
        }
    }
}
