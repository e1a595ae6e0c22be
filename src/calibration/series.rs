//! Per-indicator yearly series: collection, z-score normalization and
//! correlation.
use crate::store::{HistoricalTrend, IndicatorId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// `year -> value`, ordered by year.
pub type Series = BTreeMap<i32, f64>;

/// Groups valid observations per indicator. Points for indicators outside
/// `known`, missing or non-finite values, and repeated `(indicator, year)`
/// pairs after the first are dropped.
pub fn collect_observations(
    trends: &[HistoricalTrend],
    known: &HashSet<&IndicatorId>,
) -> HashMap<IndicatorId, Series> {
    let mut out: HashMap<IndicatorId, Series> = HashMap::new();
    for point in trends {
        if !known.contains(&point.indicator_id) {
            continue;
        }
        let Some(value) = point.valid_value() else { continue };
        let series = out.entry(point.indicator_id.clone()).or_default();
        if series.contains_key(&point.year) {
            debug!(indicator = %point.indicator_id, year = point.year, "repeated observation ignored");
            continue;
        }
        series.insert(point.year, value);
    }
    out
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { return 0.0; }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() { return 0.0; }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Z-scores every value of `series`. A constant series maps to all zeros.
pub fn z_score(series: &Series) -> Series {
    let values: Vec<f64> = series.values().copied().collect();
    let m = mean(&values);
    let sd = std_dev(&values);
    series.iter()
        .map(|(&year, &v)| (year, if sd == 0.0 { 0.0 } else { (v - m) / sd }))
        .collect()
}

/// Pearson correlation of two equally long samples. Zero when either side
/// has no variance or fewer than two points.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 { return 0.0; }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (mx, my) = (mean(xs), mean(ys));

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 { return 0.0; }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Years present in every series, ascending. Empty input yields no years.
pub fn overlapping_years<'a>(series: impl IntoIterator<Item = &'a Series>) -> BTreeSet<i32> {
    let mut iter = series.into_iter();
    let Some(first) = iter.next() else { return BTreeSet::new() };
    let mut years: BTreeSet<i32> = first.keys().copied().collect();
    for s in iter {
        years.retain(|y| s.contains_key(y));
    }
    years
}

/// Values of `series` at `years`, in the order given. Years must be present.
pub fn values_at(series: &Series, years: &BTreeSet<i32>) -> Vec<f64> {
    years.iter().filter_map(|y| series.get(y).copied()).collect()
}
