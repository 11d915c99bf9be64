//! Deterministic synthetic trajectories for demos and tests

use std::f32::consts::TAU;

use crate::convert::convert_lat_lon_to_cartesian;
use crate::trajectory::TrajectorySet;

/// `count` rising spirals of `steps` samples each, converted the same way
/// as loaded data. Pressure falls from 1000 hPa to 100 hPa along each one.
pub fn spiral_trajectories(count: usize, steps: usize) -> TrajectorySet {
    let total = count * steps;
    let mut lat = Vec::with_capacity(total);
    let mut lon = Vec::with_capacity(total);
    let mut pressure = Vec::with_capacity(total);

    for t in 0..count {
        let phase = t as f32 / count.max(1) as f32 * TAU;
        let radius = 300.0 + 40.0 * (t % 7) as f32;
        for s in 0..steps {
            let progress = if steps > 1 {
                s as f32 / (steps - 1) as f32
            } else {
                0.0
            };
            let angle = phase + progress * TAU * 1.5;
            let r = radius * (1.0 - 0.5 * progress);
            lat.push(r * angle.sin());
            lon.push(r * angle.cos());
            pressure.push(1000.0 - 900.0 * progress);
        }
    }

    convert_lat_lon_to_cartesian(&lat, &lon, &pressure, count, steps)
}
