use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an indicator. Compared by value only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(pub String);

impl IndicatorId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndicatorId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

/// A value on the 0..=100 indicator scale.
///
/// Construction always clamps, so a `Percent` held anywhere in the crate
/// satisfies the bound. NaN collapses to 0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Percent(f64);

impl Percent {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    pub fn new(value: f64) -> Self {
        if value.is_nan() { return Self(Self::MIN); }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[inline(always)]
    pub fn get(self) -> f64 { self.0 }

    /// Value expressed as a fraction of the full scale (0..=1).
    #[inline(always)]
    pub fn fraction(self) -> f64 { self.0 / Self::MAX }
}

impl From<f64> for Percent {
    fn from(v: f64) -> Self { Self::new(v) }
}

impl From<Percent> for f64 {
    fn from(p: Percent) -> f64 { p.0 }
}

/// Unsigned confidence in a relationship, bounded to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        if value.is_nan() { return Self(0.0); }
        Self(value.clamp(0.0, 1.0))
    }

    #[inline(always)]
    pub fn get(self) -> f64 { self.0 }
}

impl From<f64> for Confidence {
    fn from(v: f64) -> Self { Self::new(v) }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> f64 { c.0 }
}

/// Maps an influence weight on the -100..=100 scale to a -1..=1 multiplier.
#[inline(always)]
pub fn normalize_weight(influence_weight: f64) -> f64 {
    influence_weight / 100.0
}

/// Inverse of [`normalize_weight`]: scales a regression coefficient back to
/// the percentage convention used for stored weights.
#[inline(always)]
pub fn coefficient_to_weight(coefficient: f64) -> f64 {
    coefficient * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: IndicatorId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub current_value: Percent,
}

impl Indicator {
    pub fn new(id: impl Into<String>, name: impl Into<String>, current_value: f64) -> Self {
        Self {
            id: IndicatorId::new(id),
            name: name.into(),
            category: String::new(),
            current_value: Percent::new(current_value),
        }
    }
}

/// A directed influence link. `parent_id == child_id` is a self-relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub parent_id: IndicatorId,
    pub child_id: IndicatorId,
    pub influence_weight: f64,
    pub influence_score: Confidence,
}

impl Relationship {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, weight: f64, score: f64) -> Self {
        Self {
            parent_id: IndicatorId::new(parent),
            child_id: IndicatorId::new(child),
            influence_weight: weight,
            influence_score: Confidence::new(score),
        }
    }

    pub fn is_self(&self) -> bool { self.parent_id == self.child_id }

    pub fn key(&self) -> (&IndicatorId, &IndicatorId) { (&self.parent_id, &self.child_id) }
}

/// One yearly observation of an indicator. `value` may be missing or NaN in
/// raw data; such points do not count as valid observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTrend {
    pub indicator_id: IndicatorId,
    pub year: i32,
    pub value: Option<f64>,
}

impl HistoricalTrend {
    pub fn new(id: impl Into<String>, year: i32, value: f64) -> Self {
        Self { indicator_id: IndicatorId::new(id), year, value: Some(value) }
    }

    pub fn valid_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// A significant value change produced by one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationChange {
    pub indicator_id: IndicatorId,
    pub previous_value: Percent,
    pub new_value: Percent,
    pub created_at: DateTime<Utc>,
}

impl SimulationChange {
    pub fn delta(&self) -> f64 { self.new_value.get() - self.previous_value.get() }
}

/// Calibrated fields for one `(parent_id, child_id)` pair. `None` means the
/// field was not computed this run and must be left as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    pub parent_id: IndicatorId,
    pub child_id: IndicatorId,
    pub influence_score: Option<Confidence>,
    pub influence_weight: Option<f64>,
}

impl RelationshipUpdate {
    /// Writes the computed fields onto `rel`, leaving the rest untouched.
    pub fn apply_to(&self, rel: &mut Relationship) {
        if let Some(score) = self.influence_score { rel.influence_score = score; }
        if let Some(weight) = self.influence_weight { rel.influence_weight = weight; }
    }
}
