//! Text rendering of the histogram model

use std::fmt::Write;

use strato_traj::MultiVarHistograms;

/// One block per series: a header with the range, then one bar per bucket
/// labelled with the bucket's lower edge
pub fn format_histograms(model: &MultiVarHistograms, bar_width: usize) -> String {
    let mut out = String::new();
    let buckets = model.bucket_count();

    for (index, series) in model.series().iter().enumerate() {
        let Some(histogram) = model.histogram(index) else {
            continue;
        };
        let marker = if index == model.selected() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {} [{}, {}] {} values, {} buckets",
            marker,
            series.name,
            series.min,
            series.max,
            series.values.len(),
            buckets
        );

        // Same scale as `bucket_index`: the last bucket starts at `max`
        let step = (series.max - series.min) / buckets.saturating_sub(1).max(1) as f32;
        for (bucket, height) in histogram.iter().enumerate() {
            let lower = series.min + step * bucket as f32;
            let bar = "#".repeat((height * bar_width as f32).round() as usize);
            let _ = writeln!(out, "{:>12.3} | {}", lower, bar);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_traj::AttributeSeries;

    #[test]
    fn bars_scale_to_width() {
        let mut model = MultiVarHistograms::new(vec![AttributeSeries::new(
            "pressure",
            vec![100.0, 100.0, 200.0, 300.0],
        )]);
        model.set_bucket_count(3);

        let text = format_histograms(&model, 10);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("* pressure [100, 300] 4 values, 3 buckets"));
        assert_eq!(lines[1], "     100.000 | ##########");
        assert_eq!(lines[2], "     200.000 | #####");
        assert_eq!(lines[3], "     300.000 | #####");
    }

    #[test]
    fn labels_match_bucket_assignment() {
        let values = vec![0.0, 2.5, 5.0, 7.5, 10.0];
        let mut model = MultiVarHistograms::new(vec![AttributeSeries::new("t", values.clone())]);
        model.set_bucket_count(5);

        let text = format_histograms(&model, 4);
        let labels: Vec<f32> = text
            .lines()
            .skip(1)
            .filter_map(|l| l.split('|').next()?.trim().parse().ok())
            .collect();
        assert_eq!(labels, vec![0.0, 2.5, 5.0, 7.5, 10.0]);

        // Each value lands in the bucket whose label equals it
        for (v, label) in values.iter().zip(&labels) {
            let bucket = strato_traj::bucket_index(*v, 0.0, 10.0, 5);
            assert_eq!(labels[bucket], *label);
        }
    }

    #[test]
    fn single_bucket_is_labelled_with_min() {
        let mut model = MultiVarHistograms::new(vec![AttributeSeries::new("t", vec![3.0, 9.0])]);
        model.set_bucket_count(1);
        let text = format_histograms(&model, 2);
        assert_eq!(text.lines().nth(1), Some("       3.000 | ##"));
    }

    #[test]
    fn empty_model_prints_nothing() {
        assert!(format_histograms(&MultiVarHistograms::default(), 10).is_empty());
    }
}
