//! Descriptive statistics over numeric result columns.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::query::{RowSet, Value};

/// Summary of one column's numeric cells.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    /// Column name.
    pub column: String,
    /// Number of numeric cells.
    pub count: usize,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (same as `p50`).
    pub median: f64,
    /// First value to reach the highest frequency.
    pub mode: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// 25th percentile.
    pub p25: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// Numeric view of a cell. Text, blobs, NULL and non-finite floats are absent.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        _ => None,
    }
}

/// Percentile `p` (0..=100) of an ascending slice, interpolating linearly
/// between the neighbouring order statistics.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let index = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let weight = index - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Summarizes `values`; `None` when there is nothing numeric to summarize.
pub fn summarize(column: &str, values: &[f64]) -> Option<ColumnStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    let mode = mode(&sorted);
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let pct = |p: f64| percentile(&sorted, p).unwrap_or(mean);
    Some(ColumnStats {
        column: column.to_owned(),
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        median: pct(50.0),
        mode,
        std_dev: variance.sqrt(),
        p25: pct(25.0),
        p50: pct(50.0),
        p75: pct(75.0),
        p90: pct(90.0),
        p95: pct(95.0),
        p99: pct(99.0),
    })
}

// Running count; the mode changes only when a value strictly exceeds the best.
fn mode(values: &[f64]) -> f64 {
    let mut counts: FxHashMap<u64, usize> = FxHashMap::default();
    let mut best = (values[0], 0usize);
    for &value in values {
        let key = if value == 0.0 { 0.0f64 } else { value }.to_bits();
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        if *count > best.1 {
            best = (value, *count);
        }
    }
    best.0
}

/// Statistics for the named columns, in the order given. Columns without a
/// numeric cell, or missing from the result, are omitted.
pub fn describe(rows: &RowSet, columns: &[&str]) -> Vec<ColumnStats> {
    columns
        .iter()
        .filter_map(|column| {
            let idx = rows.column_index(column)?;
            let values: Vec<f64> = rows
                .rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(numeric))
                .collect();
            summarize(column, &values)
        })
        .collect()
}

/// Statistics for every column holding at least one numeric cell.
pub fn describe_numeric(rows: &RowSet) -> Vec<ColumnStats> {
    let columns: Vec<&str> = rows.columns.iter().map(String::as_str).collect();
    describe(rows, &columns)
}
