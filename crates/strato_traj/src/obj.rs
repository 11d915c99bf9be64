//! Wavefront OBJ polyline export
//!
//! Per trajectory with at least two points:
//!
//! ```text
//! v x y z
//! vt pressure
//! ...
//! g line<N>
//! l i i+1 ...
//! ```
//!
//! followed by a blank line. Indices are one-based and count exported
//! points only. Numbers use five significant digits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TrajError};
use crate::trajectory::TrajectorySet;

/// Significant digits written for every number
pub const OBJ_PRECISION: usize = 5;

/// `%g`-style formatting: shortest of fixed or exponent notation with
/// `precision` significant digits and trailing zeros removed
pub fn format_g(value: f32, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let precision = precision.max(1);
    // Rounding can carry into the next power of ten, so take the exponent
    // from the rounded scientific form
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Counts written by an export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjSummary {
    pub lines: usize,
    pub vertices: usize,
}

/// Write trajectories as OBJ polylines. Trajectories with fewer than two
/// points are skipped.
pub fn write_obj<W: Write>(set: &TrajectorySet, out: &mut W) -> std::io::Result<ObjSummary> {
    let g = |v: f32| format_g(v, OBJ_PRECISION);
    let mut summary = ObjSummary::default();

    for trajectory in set.iter().filter(|t| t.len() >= 2) {
        let attribute = trajectory.attribute(0).unwrap_or(&[]);
        for (i, p) in trajectory.positions.iter().enumerate() {
            writeln!(out, "v {} {} {}", g(p.x), g(p.y), g(p.z))?;
            writeln!(out, "vt {}", g(attribute.get(i).copied().unwrap_or(0.0)))?;
        }

        writeln!(out, "g line{}", summary.lines)?;
        write!(out, "l")?;
        for index in summary.vertices + 1..=summary.vertices + trajectory.len() {
            write!(out, " {}", index)?;
        }
        writeln!(out)?;
        writeln!(out)?;

        summary.vertices += trajectory.len();
        summary.lines += 1;
    }
    Ok(summary)
}

/// Export to `path`. Fails without creating the file when no trajectory
/// has two or more points.
pub fn export_obj_file(set: &TrajectorySet, path: impl AsRef<Path>) -> Result<ObjSummary> {
    let path = path.as_ref();
    if !set.iter().any(|t| t.len() >= 2) {
        return Err(TrajError::EmptyInput);
    }

    let export_err = |source| TrajError::Export {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(export_err)?;
    let mut writer = BufWriter::new(file);
    let summary = write_obj(set, &mut writer).map_err(export_err)?;
    writer.flush().map_err(export_err)?;

    tracing::info!(
        "wrote {} lines ({} vertices) to {}",
        summary.lines,
        summary.vertices,
        path.display()
    );
    Ok(summary)
}

/// `input` with its extension replaced by `.obj`
pub fn default_obj_path(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension("obj")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{Trajectory, PRESSURE};
    use glam::Vec3;

    #[test]
    fn formats_like_printf_g() {
        assert_eq!(format_g(25.0, 5), "25");
        assert_eq!(format_g(-15.0, 5), "-15");
        assert_eq!(format_g(0.30103, 5), "0.30103");
        assert_eq!(format_g(0.301029995, 5), "0.30103");
        assert_eq!(format_g(1000.0, 5), "1000");
        assert_eq!(format_g(12345.6, 5), "12346");
        assert_eq!(format_g(123456.0, 5), "1.2346e+05");
        assert_eq!(format_g(99999.9, 5), "1e+05");
        assert_eq!(format_g(0.0001, 5), "0.0001");
        assert_eq!(format_g(0.00001, 5), "1e-05");
        assert_eq!(format_g(0.0, 5), "0");
        assert_eq!(format_g(1.5, 5), "1.5");
    }

    #[test]
    fn default_path_swaps_extension() {
        assert_eq!(default_obj_path("/data/run.nc"), PathBuf::from("/data/run.obj"));
        assert_eq!(default_obj_path("traj"), PathBuf::from("traj.obj"));
    }

    #[test]
    fn writes_groups_with_running_indices() {
        let mut set = TrajectorySet::new(vec![PRESSURE.to_string()]);
        let mut a = Trajectory::with_attributes(1);
        a.push(Vec3::new(1.0, 0.0, 2.0), &[900.0]);
        a.push(Vec3::new(1.5, 0.25, 2.5), &[850.0]);
        let mut lone = Trajectory::with_attributes(1);
        lone.push(Vec3::ZERO, &[500.0]);
        let mut b = Trajectory::with_attributes(1);
        b.push(Vec3::new(-1.0, 1.0, 0.0), &[300.0]);
        b.push(Vec3::new(-2.0, 0.5, 0.0), &[400.0]);
        b.push(Vec3::new(-3.0, 0.0, 0.0), &[1000.0]);
        set.trajectories = vec![a, lone, b];

        let mut out = Vec::new();
        let summary = write_obj(&set, &mut out).unwrap();
        assert_eq!(summary, ObjSummary { lines: 2, vertices: 5 });

        let text = String::from_utf8(out).unwrap();
        let expected = "\
v 1 0 2
vt 900
v 1.5 0.25 2.5
vt 850
g line0
l 1 2

v -1 1 0
vt 300
v -2 0.5 0
vt 400
v -3 0 0
vt 1000
g line1
l 3 4 5

";
        assert_eq!(text, expected);
    }
}
