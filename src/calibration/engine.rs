//! The batch pipeline that re-derives `influence_score` and
//! `influence_weight` from historical trends.
//!
//! Per-parent failures never abort the run: the parent is logged, recorded
//! in [`CalibrationOutcome::skipped_parents`] and left out of write-back.
use super::regression::ordinary_least_squares;
use super::series::{self, Series};
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::store::{
    coefficient_to_weight, Confidence, HistoricalTrend, Indicator, IndicatorId, Relationship, RelationshipUpdate,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(Self { min: v, max: v }),
            Some(r) => Some(Self { min: r.min.min(v), max: r.max.max(v) }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSummary {
    pub total_indicators: usize,
    pub valid_indicators: usize,
    pub total_relationships: usize,
    pub updated_relationships: usize,
    pub skipped_relationships: usize,
    /// `None` when no score was written this run.
    pub influence_score_range: Option<ValueRange>,
    /// `None` when no weight was written this run.
    pub influence_weight_range: Option<ValueRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Score,
    Weight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentSkip {
    pub parent_id: IndicatorId,
    pub stage: Stage,
    pub reason: CalibrationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub summary: CalibrationSummary,
    /// One entry per relationship that received at least one new field, in
    /// relationship order.
    pub updates: Vec<RelationshipUpdate>,
    /// The input relationships with updates applied.
    pub relationships: Vec<Relationship>,
    pub skipped_parents: Vec<ParentSkip>,
}

impl CalibrationOutcome {
    /// True when nothing could be written, which points at insufficient
    /// upstream history rather than a fault.
    pub fn is_empty(&self) -> bool { self.summary.updated_relationships == 0 }
}

/// Computed fields for one parent's relationships.
#[derive(Debug, Default)]
struct ParentResult {
    scores: Vec<(IndicatorId, f64)>,
    /// `(child, weight)`; the self-relationship carries the intercept.
    weights: Vec<(IndicatorId, f64)>,
    skips: Vec<ParentSkip>,
}

/// Runs the full pipeline. Never fails; see the summary and skips.
pub fn calibrate(
    indicators: &[Indicator],
    trends: &[HistoricalTrend],
    relationships: &[Relationship],
    config: &CalibrationConfig,
) -> CalibrationOutcome {
    info!(
        indicators = indicators.len(),
        trends = trends.len(),
        relationships = relationships.len(),
        "calibration started"
    );

    let known: HashSet<&IndicatorId> = indicators.iter().map(|i| &i.id).collect();
    let normalized: HashMap<IndicatorId, Series> = series::collect_observations(trends, &known)
        .into_iter()
        .filter(|(_, s)| s.len() >= config.min_observations)
        .map(|(id, s)| {
            let z = series::z_score(&s);
            (id, z)
        })
        .collect();

    let families = group_by_parent(relationships);
    let results: Vec<ParentResult> = families
        .par_iter()
        .map(|(parent, children)| calibrate_parent(parent, children, &normalized, config))
        .collect();

    let mut scores: HashMap<(&IndicatorId, &IndicatorId), f64> = HashMap::new();
    let mut weights: HashMap<(&IndicatorId, &IndicatorId), f64> = HashMap::new();
    let mut skipped_parents = Vec::new();
    for ((parent, _), result) in families.iter().zip(&results) {
        for (child, s) in &result.scores {
            scores.insert((*parent, child), *s);
        }
        for (child, w) in &result.weights {
            weights.insert((*parent, child), *w);
        }
        for skip in &result.skips {
            warn!(parent = %skip.parent_id, stage = ?skip.stage, reason = %skip.reason, "parent skipped");
        }
        skipped_parents.extend(result.skips.iter().cloned());
    }

    let mut updates = Vec::new();
    let mut written_scores = Vec::new();
    let mut written_weights = Vec::new();
    let mut updated_relationships = relationships.to_vec();
    for rel in updated_relationships.iter_mut() {
        let key = (&rel.parent_id, &rel.child_id);
        let score = scores.get(&key).copied();
        let weight = weights.get(&key).copied();
        if score.is_none() && weight.is_none() {
            continue;
        }
        written_scores.extend(score);
        written_weights.extend(weight);
        let update = RelationshipUpdate {
            parent_id: rel.parent_id.clone(),
            child_id: rel.child_id.clone(),
            influence_score: score.map(Confidence::new),
            influence_weight: weight,
        };
        update.apply_to(rel);
        updates.push(update);
    }

    let summary = CalibrationSummary {
        total_indicators: indicators.len(),
        valid_indicators: normalized.len(),
        total_relationships: relationships.len(),
        updated_relationships: updates.len(),
        skipped_relationships: relationships.len() - updates.len(),
        influence_score_range: ValueRange::of(written_scores),
        influence_weight_range: ValueRange::of(written_weights),
    };
    info!(
        valid_indicators = summary.valid_indicators,
        updated = summary.updated_relationships,
        skipped = summary.skipped_relationships,
        skipped_parents = skipped_parents.len(),
        "calibration finished"
    );

    CalibrationOutcome { summary, updates, relationships: updated_relationships, skipped_parents }
}

/// Parents in first-appearance order with their distinct non-self children.
fn group_by_parent(relationships: &[Relationship]) -> Vec<(&IndicatorId, Vec<&IndicatorId>)> {
    let mut slot: HashMap<&IndicatorId, usize> = HashMap::new();
    let mut families: Vec<(&IndicatorId, Vec<&IndicatorId>)> = Vec::new();
    for rel in relationships {
        let idx = *slot.entry(&rel.parent_id).or_insert_with(|| {
            families.push((&rel.parent_id, Vec::new()));
            families.len() - 1
        });
        let children = &mut families[idx].1;
        if !rel.is_self() && !children.contains(&&rel.child_id) {
            children.push(&rel.child_id);
        }
    }
    families
}

fn calibrate_parent(
    parent: &IndicatorId,
    children: &[&IndicatorId],
    normalized: &HashMap<IndicatorId, Series>,
    config: &CalibrationConfig,
) -> ParentResult {
    // Children without enough history are left out; their edges stay as stored.
    let usable: Vec<(&IndicatorId, &Series)> = children.iter()
        .filter_map(|&c| normalized.get(c).map(|s| (c, s)))
        .collect();

    let mut result = ParentResult::default();
    let skip = |stage, reason| ParentSkip { parent_id: parent.clone(), stage, reason };

    match sibling_scores(&usable, config) {
        Ok(scores) => result.scores = scores,
        Err(reason) => result.skips.push(skip(Stage::Score, reason)),
    }
    match lagged_weights(parent, &usable, normalized, config) {
        Ok(weights) => result.weights = weights,
        Err(reason) => result.skips.push(skip(Stage::Weight, reason)),
    }
    result
}

/// Mean absolute correlation of each child with its siblings over the years
/// all children share, clamped to the configured score bounds.
fn sibling_scores(
    usable: &[(&IndicatorId, &Series)],
    config: &CalibrationConfig,
) -> Result<Vec<(IndicatorId, f64)>, CalibrationError> {
    if usable.len() < 2 {
        return Err(CalibrationError::NoSiblings);
    }
    let years = series::overlapping_years(usable.iter().map(|(_, s)| *s));
    if years.len() < config.min_score_overlap {
        return Err(CalibrationError::InsufficientOverlap { years: years.len(), required: config.min_score_overlap });
    }

    let samples: Vec<Vec<f64>> = usable.iter().map(|(_, s)| series::values_at(s, &years)).collect();
    let siblings = (samples.len() - 1) as f64;

    Ok(usable.iter().enumerate()
        .map(|(i, (child, _))| {
            let total: f64 = samples.iter().enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| series::pearson(&samples[i], other).abs())
                .sum();
            let score = (total / siblings).clamp(config.score_floor, config.score_ceiling);
            ((*child).clone(), score)
        })
        .collect())
}

/// Regresses the parent at `t + 1` on its children at `t`. The intercept
/// becomes the self weight, each slope the weight of its edge; both are
/// scaled to the percentage convention.
fn lagged_weights(
    parent: &IndicatorId,
    usable: &[(&IndicatorId, &Series)],
    normalized: &HashMap<IndicatorId, Series>,
    config: &CalibrationConfig,
) -> Result<Vec<(IndicatorId, f64)>, CalibrationError> {
    let parent_series = normalized.get(parent).ok_or(CalibrationError::MissingParentSeries)?;
    if usable.is_empty() {
        return Err(CalibrationError::NoSiblings);
    }

    let years: BTreeSet<i32> = series::overlapping_years(
        std::iter::once(parent_series).chain(usable.iter().map(|(_, s)| *s)),
    );
    if years.len() < config.min_weight_overlap {
        return Err(CalibrationError::InsufficientOverlap { years: years.len(), required: config.min_weight_overlap });
    }

    let mut x = Vec::new();
    let mut y = Vec::new();
    for &t in &years {
        if !years.contains(&(t + 1)) {
            continue;
        }
        x.push(usable.iter().map(|(_, s)| s[&t]).collect::<Vec<f64>>());
        y.push(parent_series[&(t + 1)]);
    }
    if x.len() < config.min_regression_rows {
        return Err(CalibrationError::InsufficientRows { rows: x.len(), required: config.min_regression_rows });
    }

    let fit = ordinary_least_squares(&x, &y, config.pivot_epsilon)?;

    let mut weights = Vec::with_capacity(usable.len() + 1);
    weights.push((parent.clone(), coefficient_to_weight(fit.intercept)));
    for ((child, _), coef) in usable.iter().zip(&fit.coefficients) {
        weights.push(((*child).clone(), coefficient_to_weight(*coef)));
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trends(id: &str, start: i32, values: &[f64]) -> Vec<HistoricalTrend> {
        values.iter().enumerate().map(|(i, v)| HistoricalTrend::new(id, start + i as i32, *v)).collect()
    }

    /// P driven by A (positively) and B (negatively) with a one-year lag.
    fn lagged_fixture() -> (Vec<Indicator>, Vec<HistoricalTrend>, Vec<Relationship>) {
        let a = [3.0, 7.0, 1.0, 8.0, 4.0, 6.0, 2.0, 9.0, 5.0, 4.0];
        let b = [5.0, 2.0, 8.0, 6.0, 1.0, 9.0, 4.0, 3.0, 7.0, 5.0];
        let mut p = vec![50.0];
        for t in 0..a.len() - 1 {
            p.push(10.0 + 4.0 * a[t] - 2.0 * b[t]);
        }
        let indicators = vec![
            Indicator::new("P", "Parent", 50.0),
            Indicator::new("A", "A", 50.0),
            Indicator::new("B", "B", 50.0),
        ];
        let mut history = trends("P", 2010, &p);
        history.extend(trends("A", 2010, &a));
        history.extend(trends("B", 2010, &b));
        let relationships = vec![
            Relationship::new("P", "P", 0.0, 0.5),
            Relationship::new("P", "A", 0.0, 0.5),
            Relationship::new("P", "B", 0.0, 0.5),
        ];
        (indicators, history, relationships)
    }

    #[test]
    fn test_lagged_regression_recovers_direction() {
        let (ind, hist, rels) = lagged_fixture();
        let out = calibrate(&ind, &hist, &rels, &CalibrationConfig::default());

        assert!(out.skipped_parents.is_empty(), "{:?}", out.skipped_parents);
        assert_eq!(out.summary.updated_relationships, 3);
        assert_eq!(out.summary.skipped_relationships, 0);
        assert_eq!(out.summary.valid_indicators, 3);

        let find = |child: &str| out.relationships.iter().find(|r| r.child_id.as_str() == child).unwrap();
        assert!(find("A").influence_weight > 0.0);
        assert!(find("B").influence_weight < 0.0);
        // |4| on A against |2| on B, in standardized units A still dominates
        assert!(find("A").influence_weight.abs() > find("B").influence_weight.abs());

        // the self edge gets only the intercept, never a correlation score
        let own = out.updates.iter().find(|u| u.child_id.as_str() == "P").unwrap();
        assert!(own.influence_weight.is_some());
        assert!(own.influence_score.is_none());
        assert_eq!(find("P").influence_score.get(), 0.5);
    }

    #[test]
    fn test_sibling_scores_use_absolute_correlation() {
        let indicators = vec![
            Indicator::new("P", "", 50.0),
            Indicator::new("A", "", 50.0),
            Indicator::new("B", "", 50.0),
            Indicator::new("C", "", 50.0),
        ];
        let mut hist = trends("A", 2000, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        hist.extend(trends("B", 2000, &[2.0, 4.0, 6.0, 8.0, 10.0]));
        hist.extend(trends("C", 2000, &[5.0, 4.0, 3.0, 2.0, 1.0]));
        let rels = vec![
            Relationship::new("P", "A", 10.0, 0.2),
            Relationship::new("P", "B", 10.0, 0.2),
            Relationship::new("P", "C", 10.0, 0.2),
        ];
        let out = calibrate(&indicators, &hist, &rels, &CalibrationConfig::default());

        for rel in &out.relationships {
            assert!((rel.influence_score.get() - 1.0).abs() < 1e-12);
            // P has no history, so weights are untouched
            assert_eq!(rel.influence_weight, 10.0);
        }
        let range = out.summary.influence_score_range.unwrap();
        assert!((range.min - 1.0).abs() < 1e-12);
        assert!(out.summary.influence_weight_range.is_none());
        assert_eq!(out.skipped_parents, vec![ParentSkip {
            parent_id: "P".into(),
            stage: Stage::Weight,
            reason: CalibrationError::MissingParentSeries,
        }]);
    }

    #[test]
    fn test_uncorrelated_siblings_hit_the_floor() {
        let indicators = vec![Indicator::new("P", "", 50.0), Indicator::new("A", "", 50.0), Indicator::new("B", "", 50.0)];
        let mut hist = trends("A", 2000, &[1.0, -1.0, 1.0, -1.0, 0.0]);
        hist.extend(trends("B", 2000, &[1.0, 1.0, -1.0, -1.0, 0.0]));
        let rels = vec![Relationship::new("P", "A", 0.0, 0.5), Relationship::new("P", "B", 0.0, 0.5)];
        let out = calibrate(&indicators, &hist, &rels, &CalibrationConfig::default());
        assert!(out.relationships.iter().all(|r| r.influence_score.get() == 0.01));
    }

    #[test]
    fn test_insufficient_history_updates_nothing() {
        let indicators = vec![Indicator::new("P", "", 50.0), Indicator::new("A", "", 50.0), Indicator::new("B", "", 50.0)];
        let mut hist = trends("P", 2000, &[1.0, 2.0, 3.0, 4.0]);
        hist.extend(trends("A", 2000, &[1.0, 2.0, 3.0, 4.0, 5.0]));
        // B is observed in other years only: no shared window
        hist.extend(trends("B", 1990, &[1.0, 3.0, 2.0, 5.0, 4.0]));
        let rels = vec![
            Relationship::new("P", "A", 7.0, 0.3),
            Relationship::new("P", "B", 7.0, 0.3),
            Relationship::new("P", "ghost", 7.0, 0.3),
        ];
        let out = calibrate(&indicators, &hist, &rels, &CalibrationConfig::default());

        assert!(out.is_empty());
        assert_eq!(out.summary.total_indicators, 3);
        assert_eq!(out.summary.valid_indicators, 2);
        assert_eq!(out.summary.total_relationships, 3);
        assert_eq!(out.summary.skipped_relationships, 3);
        assert_eq!(out.relationships, rels);

        let reasons: Vec<_> = out.skipped_parents.iter().map(|s| (s.stage, s.reason.clone())).collect();
        assert_eq!(reasons, vec![
            (Stage::Score, CalibrationError::InsufficientOverlap { years: 0, required: 3 }),
            (Stage::Weight, CalibrationError::MissingParentSeries),
        ]);
    }

    #[test]
    fn test_singular_regression_skips_parent_only() {
        // B duplicates A exactly, so the normal matrix is singular.
        let (mut ind, mut hist, mut rels) = lagged_fixture();
        let a_values: Vec<f64> = hist.iter().filter(|t| t.indicator_id.as_str() == "A").filter_map(|t| t.value).collect();
        hist.retain(|t| t.indicator_id.as_str() != "B");
        hist.extend(trends("B", 2010, &a_values));
        ind.push(Indicator::new("Q", "", 50.0));
        rels.push(Relationship::new("Q", "Q", 1.0, 0.1));

        let out = calibrate(&ind, &hist, &rels, &CalibrationConfig::default());
        assert!(out.skipped_parents.iter().any(|s| s.stage == Stage::Weight
            && matches!(s.reason, CalibrationError::Matrix(crate::error::MatrixError::Singular { .. }))));
        // scores still computed: A and B are perfectly correlated
        let a = out.relationships.iter().find(|r| r.child_id.as_str() == "A").unwrap();
        assert!((a.influence_score.get() - 1.0).abs() < 1e-12);
        assert_eq!(a.influence_weight, 0.0);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let (ind, hist, rels) = lagged_fixture();
        let cfg = CalibrationConfig::default();
        let first = calibrate(&ind, &hist, &rels, &cfg);
        let second = calibrate(&ind, &hist, &first.relationships, &cfg);
        assert_eq!(first.updates, second.updates);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_summary_serializes_with_camel_case() {
        let (ind, hist, rels) = lagged_fixture();
        let out = calibrate(&ind, &hist, &rels, &CalibrationConfig::default());
        let json = serde_json::to_value(&out.summary).unwrap();
        for key in [
            "totalIndicators",
            "validIndicators",
            "totalRelationships",
            "updatedRelationships",
            "skippedRelationships",
            "influenceScoreRange",
            "influenceWeightRange",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["influenceWeightRange"]["min"].is_number());
    }
}
