//! Multi-variable histogram model
//!
//! Holds named attribute series with their value ranges and keeps one
//! normalized histogram per series for the current bucket count.

/// Smallest and largest bucket counts accepted by [`MultiVarHistograms`]
pub const MIN_BUCKETS: usize = 1;
pub const MAX_BUCKETS: usize = 255;
pub const DEFAULT_BUCKETS: usize = 50;

/// A named scalar series and the range its histogram spans
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSeries {
    pub name: String,
    pub values: Vec<f32>,
    pub min: f32,
    pub max: f32,
}

impl AttributeSeries {
    /// Range is taken from the finite values; `[0, 0]` if there are none
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 0.0;
        }
        Self {
            name: name.into(),
            values,
            min,
            max,
        }
    }

    /// Use an explicit range instead of the data range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Bucket `value` falls into. Values outside the range clamp to the first or
/// last bucket; a degenerate range puts everything in bucket 0.
pub fn bucket_index(value: f32, min: f32, max: f32, buckets: usize) -> usize {
    let last = buckets.saturating_sub(1);
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        return 0;
    }
    let t = (value - min) / span * last as f32;
    // Float-to-int casts saturate, so far outliers clamp too
    (t as i64).clamp(0, last as i64) as usize
}

/// Histogram of the finite values in `values`, normalized so the fullest
/// bucket is 1.0. All zeros when no finite value is present.
pub fn compute_histogram(values: &[f32], min: f32, max: f32, buckets: usize) -> Vec<f32> {
    let buckets = buckets.max(MIN_BUCKETS);
    let mut counts = vec![0.0f32; buckets];
    for &v in values.iter().filter(|v| v.is_finite()) {
        counts[bucket_index(v, min, max, buckets)] += 1.0;
    }

    let peak = counts.iter().copied().fold(0.0f32, f32::max);
    if peak > 0.0 {
        for c in &mut counts {
            *c /= peak;
        }
    }
    counts
}

/// Histogram state for a set of attribute series
#[derive(Clone, Debug)]
pub struct MultiVarHistograms {
    series: Vec<AttributeSeries>,
    histograms: Vec<Vec<f32>>,
    bucket_count: usize,
    selected: usize,
}

impl Default for MultiVarHistograms {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MultiVarHistograms {
    pub fn new(series: Vec<AttributeSeries>) -> Self {
        let mut model = Self {
            series,
            histograms: Vec::new(),
            bucket_count: DEFAULT_BUCKETS,
            selected: 0,
        };
        model.recompute();
        model
    }

    /// Replace the series and recompute every histogram
    pub fn set_series(&mut self, series: Vec<AttributeSeries>) {
        self.series = series;
        self.selected = self.selected.min(self.series.len().saturating_sub(1));
        self.recompute();
    }

    pub fn series(&self) -> &[AttributeSeries] {
        &self.series
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }

    /// `(min, max)` per series
    pub fn ranges(&self) -> Vec<(f32, f32)> {
        self.series.iter().map(|s| (s.min, s.max)).collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Change the bucket count (clamped to 1..=255). Histograms are
    /// recomputed only when the count actually changes; returns whether
    /// they were.
    pub fn set_bucket_count(&mut self, buckets: usize) -> bool {
        let buckets = buckets.clamp(MIN_BUCKETS, MAX_BUCKETS);
        if buckets == self.bucket_count {
            return false;
        }
        self.bucket_count = buckets;
        self.recompute();
        true
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Select the series shown by [`MultiVarHistograms::current`]. Out of
    /// range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.series.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    pub fn histogram(&self, index: usize) -> Option<&[f32]> {
        self.histograms.get(index).map(Vec::as_slice)
    }

    /// Histogram of the selected series
    pub fn current(&self) -> Option<(&AttributeSeries, &[f32])> {
        let series = self.series.get(self.selected)?;
        Some((series, self.histogram(self.selected)?))
    }

    fn recompute(&mut self) {
        let buckets = self.bucket_count;
        self.histograms = self
            .series
            .iter()
            .map(|s| compute_histogram(&s.values, s.min, s.max, buckets))
            .collect();
        tracing::trace!(
            "recomputed {} histograms with {} buckets",
            self.histograms.len(),
            buckets
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_spans_range() {
        assert_eq!(bucket_index(0.0, 0.0, 10.0, 11), 0);
        assert_eq!(bucket_index(5.0, 0.0, 10.0, 11), 5);
        assert_eq!(bucket_index(10.0, 0.0, 10.0, 11), 10);
        assert_eq!(bucket_index(-3.0, 0.0, 10.0, 11), 0);
        assert_eq!(bucket_index(1e9, 0.0, 10.0, 11), 10);
    }

    #[test]
    fn degenerate_range_uses_first_bucket() {
        assert_eq!(bucket_index(4.0, 4.0, 4.0, 50), 0);
        let h = compute_histogram(&[4.0, 4.0], 4.0, 4.0, 5);
        assert_eq!(h, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalizes_to_peak() {
        let h = compute_histogram(&[0.0, 0.0, 0.0, 1.0, 2.0], 0.0, 2.0, 3);
        assert_eq!(h, vec![1.0, 1.0 / 3.0, 1.0 / 3.0]);
    }

    #[test]
    fn empty_series_is_all_zero() {
        let h = compute_histogram(&[], 0.0, 1.0, 4);
        assert_eq!(h, vec![0.0; 4]);
        let h = compute_histogram(&[f32::NAN], 0.0, 1.0, 4);
        assert_eq!(h, vec![0.0; 4]);
    }

    #[test]
    fn single_bucket_collects_everything() {
        let h = compute_histogram(&[1.0, 7.0, 3.0], 1.0, 7.0, 1);
        assert_eq!(h, vec![1.0]);
    }

    #[test]
    fn series_range_skips_non_finite() {
        let s = AttributeSeries::new("p", vec![f32::NAN, 3.0, f32::INFINITY, -2.0]);
        assert_eq!((s.min, s.max), (-2.0, 3.0));
    }

    #[test]
    fn bucket_count_changes_trigger_recompute() {
        let mut model = MultiVarHistograms::new(vec![AttributeSeries::new(
            "pressure",
            vec![100.0, 500.0, 900.0],
        )]);
        assert_eq!(model.bucket_count(), DEFAULT_BUCKETS);
        assert_eq!(model.histogram(0).unwrap().len(), DEFAULT_BUCKETS);

        assert!(!model.set_bucket_count(DEFAULT_BUCKETS));
        assert!(model.set_bucket_count(10));
        assert_eq!(model.histogram(0).unwrap().len(), 10);

        assert!(model.set_bucket_count(0));
        assert_eq!(model.bucket_count(), MIN_BUCKETS);
        assert!(model.set_bucket_count(1000));
        assert_eq!(model.bucket_count(), MAX_BUCKETS);
    }

    #[test]
    fn selection_stays_in_range() {
        let mut model = MultiVarHistograms::new(vec![
            AttributeSeries::new("a", vec![1.0]),
            AttributeSeries::new("b", vec![2.0]),
        ]);
        assert!(model.select(1));
        assert!(!model.select(2));
        assert_eq!(model.current().unwrap().0.name, "b");

        model.set_series(vec![AttributeSeries::new("c", vec![3.0])]);
        assert_eq!(model.selected(), 0);
    }
}
