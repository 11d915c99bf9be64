//! Latitude/longitude/pressure to scene coordinates
//!
//! `x = lat / 100`, `z = lon / 100`, and `y` is log-pressure normalized so
//! the highest pressure (ground) maps to 0 and the lowest to 1.

use glam::Vec3;

use crate::trajectory::{Trajectory, TrajectorySet, PRESSURE};

/// Global pressure range over strictly positive samples
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureRange {
    pub min: f32,
    pub max: f32,
}

impl PressureRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Range of the positive values, `None` if there are none.
    /// Non-positive values mark missing data.
    pub fn from_values(values: &[f32]) -> Option<Self> {
        let mut positive = values.iter().copied().filter(|p| *p > 0.0 && p.is_finite());
        let first = positive.next()?;
        Some(positive.fold(Self::new(first, first), |r, p| {
            Self::new(r.min.min(p), r.max.max(p))
        }))
    }

    /// `(ln p - ln max) / (ln min - ln max)`, 0 when the range is a single value
    pub fn normalized_log(&self, pressure: f32) -> f32 {
        let log_min = self.min.ln();
        let log_max = self.max.ln();
        let span = log_min - log_max;
        if span == 0.0 {
            return 0.0;
        }
        (pressure.ln() - log_max) / span
    }
}

/// Scene position of one sample
pub fn project_point(lat: f32, lon: f32, pressure: f32, range: &PressureRange) -> Vec3 {
    Vec3::new(lat / 100.0, range.normalized_log(pressure), lon / 100.0)
}

/// Convert `[trajectory][time]` row-major arrays into trajectories.
///
/// Samples with `pressure <= 0` are skipped and trajectories left without
/// points are dropped. Pressure is kept as attribute 0.
pub fn convert_lat_lon_to_cartesian(
    lat: &[f32],
    lon: &[f32],
    pressure: &[f32],
    trajectory_count: usize,
    time_count: usize,
) -> TrajectorySet {
    let mut set = TrajectorySet::new(vec![PRESSURE.to_string()]);
    let total = (trajectory_count * time_count).min(pressure.len());

    let Some(range) = PressureRange::from_values(&pressure[..total]) else {
        tracing::warn!("no positive pressure samples; nothing to convert");
        return set;
    };

    for trajectory_index in 0..trajectory_count {
        let mut trajectory = Trajectory::with_attributes(1);
        for time_index in 0..time_count {
            let index = trajectory_index * time_count + time_index;
            let (Some(&p), Some(&la), Some(&lo)) =
                (pressure.get(index), lat.get(index), lon.get(index))
            else {
                break;
            };
            if p <= 0.0 {
                continue;
            }
            trajectory.push(project_point(la, lo, p, &range), &[p]);
        }
        if !trajectory.is_empty() {
            set.trajectories.push(trajectory);
        }
    }

    tracing::debug!(
        "converted {} of {} trajectories ({} points, pressure {}..{})",
        set.len(),
        trajectory_count,
        set.point_count(),
        range.min,
        range.max
    );
    set
}
