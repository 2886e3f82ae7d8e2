//! Shared numeric kernel
//!
//! Free functions over `f64` slices used by every engine operation. The
//! formulas are the engine's documented contract: internally consistent,
//! not tied to any external numerical library.

use serde::Serialize;

/// Linear-interpolated quantile over an ascending-sorted slice.
///
/// For quantile `p`, the index is `(n - 1) * p`; an integer index selects
/// that element, otherwise the floor and ceil elements are interpolated
/// weighted by the fractional part. `quantile(s, 0.0)` is the minimum and
/// `quantile(s, 1.0)` the maximum. Returns NaN for an empty slice.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = (sorted.len() - 1) as f64 * p;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = idx - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Central moment sums (Σd², Σd³, Σd⁴) about the given mean.
pub fn central_moment_sums(values: &[f64], mean: f64) -> (f64, f64, f64) {
    let mut m2 = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for x in values {
        let d = x - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2, m3, m4)
}

/// Sample variance (n − 1 denominator); 0 when n ≤ 1.
pub fn sample_variance(n: usize, m2: f64) -> f64 {
    if n > 1 {
        m2 / (n - 1) as f64
    } else {
        0.0
    }
}

/// Adjusted Fisher–Pearson skewness `n·Σd³ / ((n−1)(n−2)·s³)`.
///
/// Defined only for n > 2 and positive standard deviation; 0 otherwise.
pub fn skewness(n: usize, m3: f64, std_dev: f64) -> f64 {
    if n > 2 && std_dev > 0.0 {
        let nf = n as f64;
        nf * m3 / ((nf - 1.0) * (nf - 2.0) * std_dev * std_dev * std_dev)
    } else {
        0.0
    }
}

/// Excess kurtosis with the small-sample bias correction.
///
/// `(n(n+1)·Σd⁴) / ((n−1)(n−2)(n−3)·var²) − 3(n−1)²/((n−2)(n−3))`,
/// defined only for n > 3 and positive variance; 0 otherwise.
pub fn excess_kurtosis(n: usize, m4: f64, variance: f64) -> f64 {
    if n > 3 && variance > 0.0 {
        let nf = n as f64;
        (nf * (nf + 1.0) * m4) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0) * variance * variance)
            - (3.0 * (nf - 1.0) * (nf - 1.0)) / ((nf - 2.0) * (nf - 3.0))
    } else {
        0.0
    }
}

/// Pearson correlation over the first `min(a.len(), b.len())` paired
/// entries.
///
/// A zero denominator (either vector has zero variance) is clamped to 1,
/// reporting correlation 0 instead of an undefined value, since callers depend
/// on always receiving a finite number. Empty input yields 0.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let ma = a[..n].iter().sum::<f64>() / n as f64;
    let mb = b[..n].iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut da = 0.0;
    let mut db = 0.0;
    for i in 0..n {
        let xa = a[i] - ma;
        let xb = b[i] - mb;
        num += xa * xb;
        da += xa * xa;
        db += xb * xb;
    }
    let denom = (da * db).sqrt();
    let denom = if denom == 0.0 { 1.0 } else { denom };
    num / denom
}

/// One equal-width histogram bin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: usize,
}

/// Equal-width histogram over `[min, max]` with `clamp(round(√n), 5, 20)`
/// bins (width 1 when max == min). Out-of-range indices are clamped into
/// the edge bins, so counts always sum to `values.len()`.
pub fn histogram(values: &[f64], min: f64, max: f64) -> Vec<HistogramBin> {
    if values.is_empty() {
        return Vec::new();
    }
    let bin_count = ((values.len() as f64).sqrt().round() as usize).clamp(5, 20);
    let range = if max - min > 0.0 { max - min } else { 1.0 };
    let bin_size = range / bin_count as f64;

    let mut counts = vec![0usize; bin_count];
    for x in values {
        let idx = ((x - min) / bin_size).floor() as isize;
        let idx = idx.clamp(0, bin_count as isize - 1) as usize;
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            bin_start: min + i as f64 * bin_size,
            bin_end: min + (i + 1) as f64 * bin_size,
            count,
        })
        .collect()
}
