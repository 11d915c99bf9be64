//! Fragment arena diagnostics.

/// Occupancy of the fragment arena for one frame.
///
/// `requested` is the final value of the allocation counter, so it keeps
/// counting past `capacity`; everything beyond capacity was dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OitStats {
    /// Fragments that asked for a slot this frame
    pub requested: u32,
    /// Fixed arena capacity (0 for renderers without an arena)
    pub capacity: u32,
    /// Fill ratio at which [`OitStats::near_capacity`] starts reporting
    pub near_capacity_ratio: f32,
}

impl OitStats {
    pub fn new(requested: u32, capacity: u32, near_capacity_ratio: f32) -> Self {
        Self {
            requested,
            capacity,
            near_capacity_ratio,
        }
    }

    /// Fragments that received a slot
    pub fn stored(&self) -> u32 {
        self.requested.min(self.capacity)
    }

    /// Fragments discarded by the overflow policy
    pub fn dropped(&self) -> u32 {
        self.requested.saturating_sub(self.capacity)
    }

    /// Stored fragments divided by capacity, in [0, 1]
    pub fn fill_ratio(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.stored() as f32 / self.capacity as f32
    }

    pub fn is_overflowing(&self) -> bool {
        self.dropped() > 0
    }

    /// True when the arena is close enough to full that the entries-per-pixel
    /// setting should be raised
    pub fn near_capacity(&self) -> bool {
        self.capacity > 0 && self.fill_ratio() >= self.near_capacity_ratio
    }
}
