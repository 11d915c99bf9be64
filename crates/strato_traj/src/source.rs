//! Access to named dimensions and variables of a scientific array file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrajError};

/// A variable's shape and values, converted to `f64`
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayData {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl ArrayData {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Self {
        Self { shape, values }
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }
}

/// Read access to a file of named dimensions and variables
pub trait TrajectorySource {
    /// Path used in error messages
    fn path(&self) -> &Path;

    /// Length of a dimension, `None` when absent
    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// Whole variable, `Ok(None)` when absent
    fn read_variable(&self, name: &'static str) -> Result<Option<ArrayData>>;

    fn require_dimension(&self, name: &'static str) -> Result<usize> {
        self.dimension_len(name)
            .ok_or_else(|| TrajError::MissingDimension {
                path: self.path().to_path_buf(),
                name,
            })
    }

    fn require_variable(&self, name: &'static str) -> Result<ArrayData> {
        self.read_variable(name)?
            .ok_or_else(|| TrajError::MissingVariable {
                path: self.path().to_path_buf(),
                name,
            })
    }
}

/// Source backed by in-memory arrays
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    path: PathBuf,
    dimensions: HashMap<String, usize>,
    variables: HashMap<String, ArrayData>,
}

impl InMemorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.insert(name.to_string(), len);
        self
    }

    pub fn with_variable(mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Self {
        self.variables
            .insert(name.to_string(), ArrayData::new(shape.to_vec(), values));
        self
    }

    pub fn with_variable_f32(self, name: &str, shape: &[usize], values: &[f32]) -> Self {
        let values = values.iter().map(|v| f64::from(*v)).collect();
        self.with_variable(name, shape, values)
    }
}

impl TrajectorySource for InMemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    fn read_variable(&self, name: &'static str) -> Result<Option<ArrayData>> {
        Ok(self.variables.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_name_the_file() {
        let source = InMemorySource::new("/data/run1.nc").with_dimension("time", 4);
        assert_eq!(source.require_dimension("time").unwrap(), 4);

        let err = source.require_dimension("trajectory").unwrap_err();
        assert!(err.to_string().contains("/data/run1.nc"));
        assert!(err.to_string().contains("trajectory"));

        let err = source.require_variable("lon").unwrap_err();
        assert!(matches!(err, TrajError::MissingVariable { name: "lon", .. }));
    }
}
