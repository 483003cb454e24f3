//! C5 — TemporalAnalyzer: per-cluster windowed metrics (spec §4.5). Grounded
//! on `original_source/.../agents/trend_pipeline/analysis/temporal_analyzer.py`
//! for the exact bucket thresholds and the weighted `potential_score` formula.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub const DEFAULT_WINDOWS_DAYS: [i64; 4] = [7, 30, 90, 365];
pub const HISTOGRAM_BINS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendBucket {
    Accelerating,
    Decelerating,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessBucket {
    Hot,
    Cold,
    Warm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiversityBucket {
    Niche,
    Mainstream,
    Moderate,
}

pub struct PotentialWeights {
    pub velocity: f64,
    pub freshness: f64,
    pub diversity: f64,
    pub cohesion: f64,
    pub size: f64,
}

impl Default for PotentialWeights {
    fn default() -> Self {
        Self { velocity: 0.25, freshness: 0.25, diversity: 0.2, cohesion: 0.2, size: 0.1 }
    }
}

pub struct DriftConfig {
    pub distance_threshold: f64,
    pub min_recent_members: usize,
    pub min_older_members: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { distance_threshold: 0.3, min_recent_members: 3, min_older_members: 3 }
    }
}

pub struct ClusterMember {
    pub domain: String,
    pub published_date: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

pub struct TemporalMetrics {
    pub volume: i64,
    pub ratio: f64,
    pub velocity: f64,
    pub trend_bucket: TrendBucket,
    pub freshness_ratio: f64,
    pub freshness_bucket: FreshnessBucket,
    pub source_diversity: usize,
    pub diversity_bucket: DiversityBucket,
    pub cohesion_score: f64,
    pub potential_score: f64,
    pub drift_detected: bool,
    pub drift_distance: Option<f64>,
}

pub struct HistogramBin {
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
    pub count: i64,
}

pub struct TemporalAnalyzer {
    weights: PotentialWeights,
    drift: DriftConfig,
}

impl TemporalAnalyzer {
    pub fn new(weights: PotentialWeights, drift: DriftConfig) -> Self {
        Self { weights, drift }
    }

    /// `total_documents` is the corpus size used for `ratio`/`freshness_ratio`
    /// denominators (spec §4.5) — distinct from `members.len()`, which is
    /// this cluster's size.
    pub fn analyze(
        &self,
        members: &[ClusterMember],
        persisted_centroid: &[f32],
        now: DateTime<Utc>,
        total_documents: i64,
    ) -> TemporalMetrics {
        let volume = members.len() as i64;
        let ratio = if total_documents > 0 { volume as f64 / total_documents as f64 } else { 0.0 };

        let volume_7d = count_within(members, now, 7);
        let volume_30d = count_within(members, now, 30);
        let rate_7d = volume_7d as f64 / 7.0;
        let rate_30d = volume_30d as f64 / 30.0;
        let velocity = if rate_7d > 0.0 && rate_30d > 0.0 { rate_7d / rate_30d } else { 1.0 };
        let trend_bucket = if velocity >= 1.5 {
            TrendBucket::Accelerating
        } else if velocity <= 0.67 {
            TrendBucket::Decelerating
        } else {
            TrendBucket::Stable
        };

        let freshness_ratio =
            if total_documents > 0 { volume_7d as f64 / total_documents as f64 } else { 0.0 };
        let freshness_bucket = if freshness_ratio >= 0.4 {
            FreshnessBucket::Hot
        } else if freshness_ratio <= 0.05 {
            FreshnessBucket::Cold
        } else {
            FreshnessBucket::Warm
        };

        let source_diversity: HashSet<&str> =
            members.iter().map(|m| m.domain.as_str()).collect::<HashSet<_>>();
        let source_diversity = source_diversity.len();
        let diversity_bucket = if source_diversity <= 1 {
            DiversityBucket::Niche
        } else if source_diversity >= 5 {
            DiversityBucket::Mainstream
        } else {
            DiversityBucket::Moderate
        };

        let cohesion_score = mean_pairwise_cosine(members);

        let (drift_detected, drift_distance) =
            self.detect_drift(members, persisted_centroid, now);

        let potential_score = self.potential_score(
            velocity,
            freshness_ratio,
            source_diversity,
            cohesion_score,
            volume,
        );

        TemporalMetrics {
            volume,
            ratio,
            velocity,
            trend_bucket,
            freshness_ratio,
            freshness_bucket,
            source_diversity,
            diversity_bucket,
            cohesion_score,
            potential_score,
            drift_detected,
            drift_distance,
        }
    }

    fn potential_score(
        &self,
        velocity: f64,
        freshness_ratio: f64,
        source_diversity: usize,
        cohesion_score: f64,
        volume: i64,
    ) -> f64 {
        let norm_velocity = (velocity / 2.0).min(1.0);
        let norm_freshness = (freshness_ratio / 0.5).min(1.0);
        let norm_diversity = (source_diversity as f64 / 10.0).min(1.0);
        let norm_cohesion = cohesion_score.min(1.0);
        let norm_size = (volume as f64 / 100.0).min(1.0);

        let raw = self.weights.velocity * norm_velocity
            + self.weights.freshness * norm_freshness
            + self.weights.diversity * norm_diversity
            + self.weights.cohesion * norm_cohesion
            + self.weights.size * norm_size;

        (raw * 10_000.0).round() / 10_000.0
    }

    /// Compares the centroid of last-7d members against the persisted
    /// centroid. Requires at least `min_recent_members` recent and
    /// `min_older_members` older members, else drift is not evaluated.
    fn detect_drift(
        &self,
        members: &[ClusterMember],
        persisted_centroid: &[f32],
        now: DateTime<Utc>,
    ) -> (bool, Option<f64>) {
        let cutoff = now - chrono::Duration::days(7);
        let recent: Vec<&ClusterMember> =
            members.iter().filter(|m| m.published_date >= cutoff).collect();
        let older: Vec<&ClusterMember> =
            members.iter().filter(|m| m.published_date < cutoff).collect();

        if recent.len() < self.drift.min_recent_members || older.len() < self.drift.min_older_members
        {
            return (false, None);
        }
        if persisted_centroid.is_empty() {
            return (false, None);
        }

        let recent_centroid = centroid_of(&recent.iter().map(|m| &m.embedding).collect::<Vec<_>>());
        let distance = euclidean(&recent_centroid, persisted_centroid) as f64;
        (distance > self.drift.distance_threshold, Some(distance))
    }

    /// Fixed-N-bin histogram of document counts over the corpus' full
    /// timestamp range (spec §4.5 "topics over time").
    pub fn histogram(members: &[ClusterMember], range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> Vec<HistogramBin> {
        if range_end <= range_start {
            return Vec::new();
        }
        let total_span = (range_end - range_start).num_milliseconds().max(1);
        let bin_span = total_span / HISTOGRAM_BINS as i64;
        let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
            .map(|i| {
                let start = range_start + chrono::Duration::milliseconds(bin_span * i as i64);
                let end = if i == HISTOGRAM_BINS - 1 {
                    range_end
                } else {
                    range_start + chrono::Duration::milliseconds(bin_span * (i as i64 + 1))
                };
                HistogramBin { bucket_start: start, bucket_end: end, count: 0 }
            })
            .collect();

        for member in members {
            if member.published_date < range_start || member.published_date > range_end {
                continue;
            }
            let offset = (member.published_date - range_start).num_milliseconds();
            let idx = ((offset / bin_span.max(1)) as usize).min(HISTOGRAM_BINS - 1);
            bins[idx].count += 1;
        }
        bins
    }
}

fn count_within(members: &[ClusterMember], now: DateTime<Utc>, days: i64) -> i64 {
    let cutoff = now - chrono::Duration::days(days);
    members.iter().filter(|m| m.published_date >= cutoff).count() as i64
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { (dot / (na * nb)) as f64 }
}

fn mean_pairwise_cosine(members: &[ClusterMember]) -> f64 {
    let n = members.len();
    if n < 2 {
        return 1.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sum += cosine(&members[i].embedding, &members[j].embedding);
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

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(domain: &str, days_ago: i64, now: DateTime<Utc>) -> ClusterMember {
        ClusterMember {
            domain: domain.to_string(),
            published_date: now - chrono::Duration::days(days_ago),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn velocity_one_is_stable() {
        let analyzer = TemporalAnalyzer::new(PotentialWeights::default(), DriftConfig::default());
        let now = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&Utc);
        // rate_7d == rate_30d requires volume_7d/7 == volume_30d/30, e.g. 7 and 30.
        let mut members = Vec::new();
        for d in 0..7 {
            members.push(member("a.test", d, now));
        }
        for d in 7..30 {
            members.push(member("a.test", d, now));
        }
        let metrics = analyzer.analyze(&members, &[], now, 100);
        assert!((metrics.velocity - 1.0).abs() < 1e-6);
        assert_eq!(metrics.trend_bucket, TrendBucket::Stable);
    }

    #[test]
    fn freshness_boundary_is_hot() {
        let analyzer = TemporalAnalyzer::new(PotentialWeights::default(), DriftConfig::default());
        let now = Utc::now();
        let members: Vec<ClusterMember> = (0..4).map(|d| member("a.test", d, now)).collect();
        let metrics = analyzer.analyze(&members, &[], now, 10);
        assert!((metrics.freshness_ratio - 0.4).abs() < 1e-6);
        assert_eq!(metrics.freshness_bucket, FreshnessBucket::Hot);
    }

    #[test]
    fn drift_not_evaluated_below_minimum_members() {
        let analyzer = TemporalAnalyzer::new(PotentialWeights::default(), DriftConfig::default());
        let now = Utc::now();
        let members = vec![member("a.test", 1, now), member("a.test", 40, now)];
        let metrics = analyzer.analyze(&members, &[1.0, 0.0], now, 10);
        assert!(!metrics.drift_detected);
        assert!(metrics.drift_distance.is_none());
    }
}
