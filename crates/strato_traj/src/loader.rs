//! Trajectory file loader
//!
//! Expects the layout written by the trajectory model output:
//! dimensions `time`, `trajectory`, `ensemble`, `start_lon`, `start_lat`,
//! `time_interval` and variables `time`, `lon`, `lat`, `pressure`,
//! `start_lon`, `start_lat`, `time_interval`. Position variables are
//! `[ensemble, trajectory, time]`; only ensemble 0 is read.

use crate::convert::convert_lat_lon_to_cartesian;
use crate::error::{Result, TrajError};
use crate::source::{ArrayData, TrajectorySource};
use crate::trajectory::TrajectorySet;

pub const REQUIRED_DIMENSIONS: [&str; 6] = [
    "time",
    "trajectory",
    "ensemble",
    "start_lon",
    "start_lat",
    "time_interval",
];

/// Everything read from one trajectory file
#[derive(Clone, Debug, Default)]
pub struct TrajectoryData {
    pub trajectories: TrajectorySet,
    /// Time axis shared by every trajectory
    pub time: Vec<f64>,
    pub start_lon: Vec<f32>,
    pub start_lat: Vec<f32>,
    pub time_interval: Vec<f32>,
    /// Ensemble members present in the file (only the first is converted)
    pub ensemble_count: usize,
}

fn shape_mismatch(source: &dyn TrajectorySource, name: &'static str, expected: Vec<usize>, actual: Vec<usize>) -> TrajError {
    TrajError::ShapeMismatch {
        path: source.path().to_path_buf(),
        name,
        expected,
        actual,
    }
}

fn read_1d(source: &dyn TrajectorySource, name: &'static str, len: usize) -> Result<ArrayData> {
    let data = source.require_variable(name)?;
    if data.shape != [len] || data.values.len() < len {
        return Err(shape_mismatch(source, name, vec![len], data.shape));
    }
    Ok(data)
}

/// First `[trajectory, time]` slab of a position variable
fn read_first_member(
    source: &dyn TrajectorySource,
    name: &'static str,
    ensembles: usize,
    trajectories: usize,
    times: usize,
) -> Result<Vec<f32>> {
    let data = source.require_variable(name)?;
    let shape_ok = match data.shape.as_slice() {
        [e, t, n] => *e == ensembles && *t == trajectories && *n == times,
        [t, n] => *t == trajectories && *n == times,
        _ => false,
    };
    let slab = trajectories * times;
    if !shape_ok || data.values.len() < slab {
        return Err(shape_mismatch(
            source,
            name,
            vec![ensembles, trajectories, times],
            data.shape,
        ));
    }
    Ok(data.values[..slab].iter().map(|v| *v as f32).collect())
}

/// Read and convert a trajectory file. Any missing dimension or variable
/// aborts the whole file.
pub fn load_trajectories(source: &dyn TrajectorySource) -> Result<TrajectoryData> {
    let mut dims = [0usize; REQUIRED_DIMENSIONS.len()];
    for (len, name) in dims.iter_mut().zip(REQUIRED_DIMENSIONS) {
        *len = source.require_dimension(name)?;
    }
    let [time_dim, trajectory_dim, ensemble_dim, start_lon_dim, start_lat_dim, interval_dim] = dims;

    if ensemble_dim == 0 {
        return Err(TrajError::EmptyInput);
    }
    if ensemble_dim > 1 {
        tracing::debug!("{} ensemble members, using the first", ensemble_dim);
    }

    let time = read_1d(source, "time", time_dim)?.values;
    let lon = read_first_member(source, "lon", ensemble_dim, trajectory_dim, time_dim)?;
    let lat = read_first_member(source, "lat", ensemble_dim, trajectory_dim, time_dim)?;
    let pressure = read_first_member(source, "pressure", ensemble_dim, trajectory_dim, time_dim)?;
    let start_lon = read_1d(source, "start_lon", start_lon_dim)?.to_f32();
    let start_lat = read_1d(source, "start_lat", start_lat_dim)?.to_f32();
    let time_interval = read_1d(source, "time_interval", interval_dim)?.to_f32();

    let trajectories = convert_lat_lon_to_cartesian(&lat, &lon, &pressure, trajectory_dim, time_dim);
    tracing::info!(
        "loaded {} trajectories ({} points) from {}",
        trajectories.len(),
        trajectories.point_count(),
        source.path().display()
    );

    Ok(TrajectoryData {
        trajectories,
        time: time[..time_dim].to_vec(),
        start_lon,
        start_lat,
        time_interval,
        ensemble_count: ensemble_dim,
    })
}

/// Open and load a NetCDF trajectory file
#[cfg(feature = "netcdf")]
pub fn load_netcdf_file(path: impl AsRef<std::path::Path>) -> Result<TrajectoryData> {
    let source = crate::netcdf_source::NetCdfSource::open(path)?;
    load_trajectories(&source)
}
