//! Strato trajectory data
//!
//! Loading of atmospheric trajectory files, conversion to scene
//! coordinates, OBJ polyline export and the multi-variable histogram model
//! used by the inspector.
//!
//! # Example
//!
//! ```
//! use strato_traj::{convert_lat_lon_to_cartesian, MultiVarHistograms};
//!
//! let lat = [1000.0, 1100.0, 1200.0];
//! let lon = [-500.0, -450.0, -400.0];
//! let pressure = [950.0, 700.0, 300.0];
//! let set = convert_lat_lon_to_cartesian(&lat, &lon, &pressure, 1, 3);
//! assert_eq!(set.point_count(), 3);
//!
//! let histograms = MultiVarHistograms::new(set.attribute_series());
//! assert_eq!(histograms.names().next(), Some("pressure"));
//! ```

pub mod convert;
pub mod error;
pub mod histogram;
pub mod loader;
#[cfg(feature = "netcdf")]
pub mod netcdf_source;
pub mod obj;
pub mod source;
pub mod synthetic;
pub mod trajectory;

pub use convert::{convert_lat_lon_to_cartesian, project_point, PressureRange};
pub use error::{Result, TrajError};
pub use histogram::{
    bucket_index, compute_histogram, AttributeSeries, MultiVarHistograms, DEFAULT_BUCKETS,
    MAX_BUCKETS, MIN_BUCKETS,
};
#[cfg(feature = "netcdf")]
pub use loader::load_netcdf_file;
pub use loader::{load_trajectories, TrajectoryData, REQUIRED_DIMENSIONS};
#[cfg(feature = "netcdf")]
pub use netcdf_source::NetCdfSource;
pub use obj::{default_obj_path, export_obj_file, format_g, write_obj, ObjSummary};
pub use source::{ArrayData, InMemorySource, TrajectorySource};
pub use synthetic::spiral_trajectories;
pub use trajectory::{Trajectory, TrajectorySet, PRESSURE};
