//! Renderer error types

use thiserror::Error;

/// Errors raised while creating or resizing transparency renderers.
///
/// Allocation failures are fatal for the renderer that raised them; nothing
/// in this crate retries after an `OutOfMemory` or `Validation` error.
#[derive(Error, Debug)]
pub enum OitError {
    /// No adapter matched the request
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    /// The adapter refused to create a device
    #[error("Failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// The driver ran out of memory while allocating a resource
    #[error("GPU out of memory while allocating {label} ({bytes} bytes)")]
    OutOfMemory { label: &'static str, bytes: u64 },

    /// A buffer would exceed the device binding limit
    #[error("{label} needs {requested} bytes but the device allows at most {limit}")]
    BufferTooLarge {
        label: &'static str,
        requested: u64,
        limit: u64,
    },

    /// Width, height or entries per pixel cannot back a fragment arena
    #[error("Invalid resolution {width}x{height} with {entries_per_pixel} entries per pixel")]
    InvalidResolution {
        width: u32,
        height: u32,
        entries_per_pixel: u32,
    },

    /// The adapter lacks a capability the renderer needs
    #[error("GPU adapter does not support {0}")]
    Unsupported(&'static str),

    /// wgpu reported a validation error for a resource we created
    #[error("GPU validation error: {0}")]
    Validation(String),

    /// Mapping a readback buffer failed
    #[error("Failed to map readback buffer: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
}

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, OitError>;
