//! Trajectory error types

use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while loading, converting or exporting trajectories.
///
/// Every file-related variant carries the offending path. A failed file is
/// abandoned as a whole; no partial trajectories are returned.
#[derive(Error, Debug)]
pub enum TrajError {
    #[error("Failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("'{}' is missing dimension '{name}'", path.display())]
    MissingDimension { path: PathBuf, name: &'static str },

    #[error("'{}' is missing variable '{name}'", path.display())]
    MissingVariable { path: PathBuf, name: &'static str },

    #[error("Failed to read variable '{name}' from '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Variable '{name}' in '{}' has shape {actual:?}, expected {expected:?}", path.display())]
    ShapeMismatch {
        path: PathBuf,
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Failed to write '{}': {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input contains no usable trajectory data")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, TrajError>;
