//! Arena sizing shared by the GPU buffer set and the host-side model

use crate::error::{OitError, Result};
use crate::fragment::{FragmentNode, SENTINEL};

/// Dimensions of a per-pixel linked-list arena.
///
/// Capacity is `width * height * entries_per_pixel` and must stay strictly
/// below [`SENTINEL`] so that every valid slot is distinguishable from
/// "end of list".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaLayout {
    pub width: u32,
    pub height: u32,
    pub entries_per_pixel: u32,
    pub pixels: u32,
    pub capacity: u32,
}

impl ArenaLayout {
    pub fn new(width: u32, height: u32, entries_per_pixel: u32) -> Result<Self> {
        let invalid = || OitError::InvalidResolution {
            width,
            height,
            entries_per_pixel,
        };
        if width == 0 || height == 0 || entries_per_pixel == 0 {
            return Err(invalid());
        }
        let pixels = u64::from(width) * u64::from(height);
        let capacity = pixels * u64::from(entries_per_pixel);
        if capacity >= u64::from(SENTINEL) {
            return Err(invalid());
        }
        Ok(Self {
            width,
            height,
            entries_per_pixel,
            pixels: pixels as u32,
            capacity: capacity as u32,
        })
    }

    /// Size of the fragment-and-link buffer
    pub fn fragment_bytes(&self) -> u64 {
        u64::from(self.capacity) * std::mem::size_of::<FragmentNode>() as u64
    }

    /// Size of the head-offset table
    pub fn head_bytes(&self) -> u64 {
        u64::from(self.pixels) * std::mem::size_of::<u32>() as u64
    }

    /// Row-major head-table index, or `None` outside the target
    pub fn head_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize) * (self.width as usize) + x as usize)
    }
}
