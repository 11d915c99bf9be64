//! NetCDF-backed [`TrajectorySource`]

use std::path::{Path, PathBuf};

use crate::error::{Result, TrajError};
use crate::source::{ArrayData, TrajectorySource};

pub struct NetCdfSource {
    path: PathBuf,
    file: netcdf::File,
}

impl NetCdfSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path).map_err(|e| TrajError::Open {
            path: path.clone(),
            source: Box::new(e),
        })?;
        tracing::debug!("opened NetCDF file {}", path.display());
        Ok(Self { path, file })
    }
}

impl TrajectorySource for NetCdfSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file.dimension(name).map(|d| d.len())
    }

    fn read_variable(&self, name: &'static str) -> Result<Option<ArrayData>> {
        let Some(variable) = self.file.variable(name) else {
            return Ok(None);
        };
        let shape = variable.dimensions().iter().map(|d| d.len()).collect();
        let values = variable
            .get_values::<f64, _>(..)
            .map_err(|e| TrajError::Read {
                path: self.path.clone(),
                name,
                source: Box::new(e),
            })?;
        Ok(Some(ArrayData::new(shape, values)))
    }
}
