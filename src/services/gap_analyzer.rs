//! C7 — GapAnalyzer: client-vs-competitor coverage, gap prioritization,
//! strength detection and roadmap construction (spec §4.7). Grounded on
//! `original_source/.../gap_analysis/gap_analyzer.py` — `analyze_coverage`,
//! `identify_gaps`/`_calculate_priority_score`, `identify_strengths`,
//! `build_roadmap`/`_select_reco_with_effort_balance`.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageLevel {
    Excellent,
    Good,
    Weak,
    Gap,
}

pub struct CoverageThresholds {
    pub excellent: f64,
    pub good: f64,
    pub weak: f64,
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self { excellent: 1.5, good: 0.8, weak: 0.3 }
    }
}

pub struct PriorityWeights {
    pub coverage_gap: f64,
    pub topic_potential: f64,
    pub velocity: f64,
    pub competitor_presence: f64,
    pub effort_estimate: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            coverage_gap: 0.35,
            topic_potential: 0.25,
            velocity: 0.2,
            competitor_presence: 0.15,
            effort_estimate: 0.05,
        }
    }
}

pub struct PriorityDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

pub struct EffortDistribution {
    pub easy: f64,
    pub medium: f64,
    pub complex: f64,
}

impl Default for EffortDistribution {
    fn default() -> Self {
        Self { easy: 0.30, medium: 0.45, complex: 0.25 }
    }
}

pub struct ClusterDocument {
    pub domain: String,
}

pub struct CoverageResult {
    pub topic_id: i32,
    pub topic_label: String,
    pub client_count: i64,
    pub competitor_count: i64,
    pub total_count: i64,
    pub coverage_score: f64,
    pub coverage_level: CoverageLevel,
    pub num_sources: usize,
}

pub struct TemporalInput {
    pub topic_id: i32,
    pub potential_score: f64,
    pub velocity: f64,
}

pub struct Gap {
    pub topic_id: i32,
    pub topic_label: String,
    pub coverage_score: f64,
    pub priority_score: f64,
}

pub struct Strength {
    pub topic_id: i32,
    pub topic_label: String,
    pub advantage_score: f64,
    pub client_count: i64,
}

#[derive(Debug, Clone)]
pub struct RecommendationInput {
    pub id: i64,
    pub topic_cluster_id: i32,
    pub title: String,
    pub effort_level: String,
}

pub struct RoadmapItem {
    pub priority_order: i32,
    pub priority_tier: &'static str,
    pub gap_topic_id: i32,
    pub gap_label: String,
    pub recommendation_id: i64,
    pub recommendation_title: String,
    pub estimated_effort: String,
    pub gap_priority_score: f64,
}

pub struct GapAnalyzer {
    thresholds: CoverageThresholds,
    priority_weights: PriorityWeights,
    priority_distribution: PriorityDistribution,
    effort_distribution: EffortDistribution,
    max_roadmap_items: usize,
    strength_significant_threshold: f64,
}

impl GapAnalyzer {
    pub fn new(
        thresholds: CoverageThresholds,
        priority_weights: PriorityWeights,
        priority_distribution: PriorityDistribution,
        effort_distribution: EffortDistribution,
        max_roadmap_items: usize,
        strength_significant_threshold: f64,
    ) -> Self {
        Self {
            thresholds,
            priority_weights,
            priority_distribution,
            effort_distribution,
            max_roadmap_items,
            strength_significant_threshold,
        }
    }

    /// `documents_by_topic[topic_id]` holds every article assigned to that
    /// cluster. Clusters with no documents are skipped. Results are sorted
    /// ascending by `coverage_score` (gaps surface first).
    pub fn analyze_coverage(
        &self,
        client_domain: &str,
        topics: &[(i32, String)],
        documents_by_topic: &HashMap<i32, Vec<ClusterDocument>>,
    ) -> Vec<CoverageResult> {
        let mut results = Vec::new();
        for (topic_id, label) in topics {
            let Some(documents) = documents_by_topic.get(topic_id) else { continue };
            if documents.is_empty() {
                continue;
            }

            let mut client_count = 0i64;
            let mut competitor_count = 0i64;
            let mut domains: HashSet<&str> = HashSet::new();
            for doc in documents {
                domains.insert(doc.domain.as_str());
                if doc.domain == client_domain {
                    client_count += 1;
                } else {
                    competitor_count += 1;
                }
            }

            let coverage_score = if competitor_count > 0 {
                let num_competitors =
                    domains.len() as i64 - if domains.contains(client_domain) { 1 } else { 0 };
                let avg_competitor = if num_competitors > 0 {
                    competitor_count as f64 / num_competitors as f64
                } else {
                    competitor_count as f64
                };
                if avg_competitor > 0.0 { client_count as f64 / avg_competitor } else { 0.0 }
            } else if client_count > 0 {
                1.0
            } else {
                0.0
            };
            let coverage_score = (coverage_score * 10_000.0).round() / 10_000.0;

            let coverage_level = if coverage_score >= self.thresholds.excellent {
                CoverageLevel::Excellent
            } else if coverage_score >= self.thresholds.good {
                CoverageLevel::Good
            } else if coverage_score >= self.thresholds.weak {
                CoverageLevel::Weak
            } else {
                CoverageLevel::Gap
            };

            results.push(CoverageResult {
                topic_id: *topic_id,
                topic_label: label.clone(),
                client_count,
                competitor_count,
                total_count: documents.len() as i64,
                coverage_score,
                coverage_level,
                num_sources: domains.len(),
            });
        }

        results.sort_by(|a, b| a.coverage_score.partial_cmp(&b.coverage_score).unwrap());
        results
    }

    /// Considers only `weak`/`gap` coverage levels, prioritized by a weighted
    /// score. Sorted descending by `priority_score`.
    pub fn identify_gaps(
        &self,
        coverage_results: &[CoverageResult],
        temporal: &[TemporalInput],
    ) -> Vec<Gap> {
        let temporal_lookup: HashMap<i32, &TemporalInput> =
            temporal.iter().map(|t| (t.topic_id, t)).collect();

        let mut gaps: Vec<Gap> = coverage_results
            .iter()
            .filter(|c| matches!(c.coverage_level, CoverageLevel::Gap | CoverageLevel::Weak))
            .map(|coverage| {
                let temporal = temporal_lookup.get(&coverage.topic_id);
                let priority_score = self.priority_score(coverage, temporal.copied());
                Gap {
                    topic_id: coverage.topic_id,
                    topic_label: coverage.topic_label.clone(),
                    coverage_score: coverage.coverage_score,
                    priority_score,
                }
            })
            .collect();

        gaps.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap());
        gaps
    }

    fn priority_score(&self, coverage: &CoverageResult, temporal: Option<&TemporalInput>) -> f64 {
        let coverage_gap_score = 1.0 - coverage.coverage_score.min(1.0);
        let topic_potential = temporal.map(|t| t.potential_score).unwrap_or(0.5);
        let velocity = temporal.map(|t| t.velocity).unwrap_or(1.0);
        let velocity_score = (velocity / 2.0).min(1.0);
        let competitor_score = (coverage.num_sources as f64 / 10.0).min(1.0);
        let effort_score = 0.5;

        let w = &self.priority_weights;
        let score = w.coverage_gap * coverage_gap_score
            + w.topic_potential * topic_potential
            + w.velocity * velocity_score
            + w.competitor_presence * competitor_score
            + w.effort_estimate * effort_score;
        (score * 10_000.0).round() / 10_000.0
    }

    /// Emits `ClientStrength` rows for topics at or above
    /// `strength_significant_threshold`, sorted descending by advantage.
    pub fn identify_strengths(&self, coverage_results: &[CoverageResult]) -> Vec<Strength> {
        let mut strengths: Vec<Strength> = coverage_results
            .iter()
            .filter(|c| c.coverage_score >= self.strength_significant_threshold)
            .map(|c| Strength {
                topic_id: c.topic_id,
                topic_label: c.topic_label.clone(),
                advantage_score: ((c.coverage_score - 1.0) * 10_000.0).round() / 10_000.0,
                client_count: c.client_count,
            })
            .collect();
        strengths.sort_by(|a, b| b.advantage_score.partial_cmp(&a.advantage_score).unwrap());
        strengths
    }

    /// Fills `{high, medium, low}` tiers in priority order subject to the
    /// configured per-tier quota, selecting each gap's recommendation by the
    /// effort-balance rule, capped at `max_roadmap_items`.
    pub fn build_roadmap(
        &self,
        gaps: &[Gap],
        recommendations: &[RecommendationInput],
    ) -> Vec<RoadmapItem> {
        let mut reco_by_topic: HashMap<i32, Vec<&RecommendationInput>> = HashMap::new();
        for reco in recommendations {
            reco_by_topic.entry(reco.topic_cluster_id).or_default().push(reco);
        }

        let effort_targets: HashMap<&'static str, i64> = [
            ("easy", (self.max_roadmap_items as f64 * self.effort_distribution.easy) as i64),
            ("medium", (self.max_roadmap_items as f64 * self.effort_distribution.medium) as i64),
            ("complex", (self.max_roadmap_items as f64 * self.effort_distribution.complex) as i64),
        ]
        .into_iter()
        .collect();
        let mut effort_counts: HashMap<&'static str, i64> =
            [("easy", 0), ("medium", 0), ("complex", 0)].into_iter().collect();

        let mut roadmap = Vec::new();
        let mut priority_order = 1i32;
        let (mut high_count, mut medium_count, mut low_count) = (0usize, 0usize, 0usize);

        for gap in gaps {
            let Some(topic_recos) = reco_by_topic.get(&gap.topic_id) else { continue };
            if topic_recos.is_empty() {
                continue;
            }

            let priority_tier = if gap.priority_score >= 0.7
                && high_count < self.priority_distribution.high
            {
                high_count += 1;
                "high"
            } else if gap.priority_score >= 0.4 && medium_count < self.priority_distribution.medium
            {
                medium_count += 1;
                "medium"
            } else if low_count < self.priority_distribution.low {
                low_count += 1;
                "low"
            } else {
                continue;
            };

            let best = select_with_effort_balance(topic_recos, &effort_counts, &effort_targets);
            let effort = normalize_effort(&best.effort_level);
            *effort_counts.get_mut(effort).unwrap() += 1;

            roadmap.push(RoadmapItem {
                priority_order,
                priority_tier,
                gap_topic_id: gap.topic_id,
                gap_label: gap.topic_label.clone(),
                recommendation_id: best.id,
                recommendation_title: best.title.clone(),
                estimated_effort: effort.to_string(),
                gap_priority_score: gap.priority_score,
            });
            priority_order += 1;

            if roadmap.len() >= self.max_roadmap_items {
                break;
            }
        }

        roadmap
    }
}

fn normalize_effort(effort: &str) -> &'static str {
    match effort {
        "easy" => "easy",
        "complex" => "complex",
        _ => "medium",
    }
}

/// Picks the recommendation whose effort level is furthest below its
/// proportional target, falling back to the first recommendation if no
/// effort bucket has any.
fn select_with_effort_balance<'a>(
    recommendations: &[&'a RecommendationInput],
    current_counts: &HashMap<&'static str, i64>,
    targets: &HashMap<&'static str, i64>,
) -> &'a RecommendationInput {
    let mut by_effort: HashMap<&'static str, Vec<&'a RecommendationInput>> =
        [("easy", Vec::new()), ("medium", Vec::new()), ("complex", Vec::new())].into_iter().collect();
    for reco in recommendations {
        by_effort.get_mut(normalize_effort(&reco.effort_level)).unwrap().push(reco);
    }

    let mut effort_gaps: Vec<(&'static str, i64)> = targets
        .iter()
        .map(|(&effort, &target)| (effort, target - current_counts.get(effort).copied().unwrap_or(0)))
        .collect();
    effort_gaps.sort_by(|a, b| b.1.cmp(&a.1));

    for (effort, _) in effort_gaps {
        if let Some(first) = by_effort.get(effort).and_then(|v| v.first()) {
            return first;
        }
    }
    recommendations[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(max_items: usize, dist: PriorityDistribution) -> GapAnalyzer {
        GapAnalyzer::new(
            CoverageThresholds::default(),
            PriorityWeights::default(),
            dist,
            EffortDistribution::default(),
            max_items,
            1.5,
        )
    }

    #[test]
    fn coverage_score_one_when_no_competitors() {
        let a = analyzer(10, PriorityDistribution { high: 3, medium: 4, low: 3 });
        let mut docs = HashMap::new();
        docs.insert(
            0,
            vec![ClusterDocument { domain: "client.test".to_string() }],
        );
        let results = a.analyze_coverage("client.test", &[(0, "topic".to_string())], &docs);
        assert_eq!(results[0].coverage_score, 1.0);
        assert_eq!(results[0].coverage_level, CoverageLevel::Excellent);
    }

    #[test]
    fn roadmap_respects_priority_order_and_tier_quota() {
        let a = analyzer(10, PriorityDistribution { high: 3, medium: 4, low: 3 });
        let gaps: Vec<Gap> = [0.9, 0.85, 0.7, 0.6, 0.55, 0.5, 0.4, 0.3, 0.2, 0.1]
            .into_iter()
            .enumerate()
            .map(|(i, score)| Gap {
                topic_id: i as i32,
                topic_label: format!("topic-{i}"),
                coverage_score: 0.1,
                priority_score: score,
            })
            .collect();
        let recos: Vec<RecommendationInput> = (0..10)
            .map(|i| RecommendationInput {
                id: i as i64,
                topic_cluster_id: i,
                title: format!("reco-{i}"),
                effort_level: "medium".to_string(),
            })
            .collect();
        let roadmap = a.build_roadmap(&gaps, &recos);

        let order: Vec<i32> = roadmap.iter().map(|r| r.priority_order).collect();
        assert_eq!(order, (1..=10).collect::<Vec<_>>());
        let high = roadmap.iter().filter(|r| r.priority_tier == "high").count();
        assert_eq!(high, 3);
    }
}
