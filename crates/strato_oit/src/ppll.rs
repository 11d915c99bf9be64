//! Host-side per-pixel linked list.
//!
//! Runs the clear, gather and resolve passes on the CPU with the same arena
//! layout and atomics the WGSL shaders use. Useful for testing the list
//! invariants without a GPU adapter and for offline compositing.
//!
//! Frame barriers are encoded in borrows:
//!
//! ```text
//! FragmentArena --begin_gather(&mut)--> GatherPhase --finish--> ResolvePhase
//! ```
//!
//! A [`GatherPhase`] is `Sync` and can be shared across threads; inserts from
//! any number of threads race only on the allocation counter and the head
//! table, both of which are updated with single atomic operations.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::composite::{blend_over, composite_back_to_front, sort_by_depth};
use crate::error::Result;
use crate::fragment::{FragmentNode, Rgba, SENTINEL};
use crate::layout::ArenaLayout;
use crate::stats::OitStats;

/// Fragments collected for one pixel during resolve
pub type PixelFragments = SmallVec<[FragmentNode; 8]>;

/// Outcome of a single gather insert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// Fragment linked at this arena slot
    Stored { slot: u32 },
    /// Arena full; fragment discarded
    Dropped,
    /// Pixel outside the target
    OutOfBounds,
}

impl Insertion {
    pub fn is_stored(&self) -> bool {
        matches!(self, Insertion::Stored { .. })
    }
}

/// Fixed-capacity fragment arena with a per-pixel head table
pub struct FragmentArena {
    layout: ArenaLayout,
    counter: AtomicU32,
    heads: Vec<AtomicU32>,
    nodes: Vec<OnceLock<FragmentNode>>,
    near_capacity_ratio: f32,
}

impl FragmentArena {
    pub fn new(width: u32, height: u32, entries_per_pixel: u32) -> Result<Self> {
        let layout = ArenaLayout::new(width, height, entries_per_pixel)?;
        tracing::debug!(
            "fragment arena {}x{} ({} entries per pixel, {} slots)",
            width,
            height,
            entries_per_pixel,
            layout.capacity
        );
        Ok(Self {
            layout,
            counter: AtomicU32::new(0),
            heads: (0..layout.pixels).map(|_| AtomicU32::new(SENTINEL)).collect(),
            nodes: (0..layout.capacity).map(|_| OnceLock::new()).collect(),
            near_capacity_ratio: 0.9,
        })
    }

    pub fn with_near_capacity_ratio(mut self, ratio: f32) -> Self {
        self.near_capacity_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn layout(&self) -> ArenaLayout {
        self.layout
    }

    /// Reallocate for a new target size. Nothing from the previous frame
    /// survives.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let ratio = self.near_capacity_ratio;
        *self = Self::new(width, height, self.layout.entries_per_pixel)?
            .with_near_capacity_ratio(ratio);
        Ok(())
    }

    /// Clear pass: every head back to the sentinel, counter to zero.
    pub fn clear(&mut self) {
        let used = (*self.counter.get_mut()).min(self.layout.capacity) as usize;
        for node in &mut self.nodes[..used] {
            node.take();
        }
        for head in &mut self.heads {
            *head.get_mut() = SENTINEL;
        }
        *self.counter.get_mut() = 0;
        tracing::trace!("cleared {} heads, released {} slots", self.heads.len(), used);
    }

    /// Clear and open the gather phase for this frame
    pub fn begin_gather(&mut self) -> GatherPhase<'_> {
        self.clear();
        GatherPhase { arena: self }
    }

    /// Allocation counter and capacity from the last frame
    pub fn stats(&self) -> OitStats {
        OitStats::new(
            self.counter.load(Ordering::Acquire),
            self.layout.capacity,
            self.near_capacity_ratio,
        )
    }
}

/// Shared handle used while transparent fragments are recorded
#[derive(Clone, Copy)]
pub struct GatherPhase<'a> {
    arena: &'a FragmentArena,
}

impl<'a> GatherPhase<'a> {
    /// Record one fragment.
    ///
    /// The slot comes from the global counter. Once the counter passes
    /// capacity every further fragment is dropped, regardless of pixel.
    pub fn insert(&self, x: u32, y: u32, color: Rgba, depth: f32) -> Insertion {
        let arena = self.arena;
        let Some(pixel) = arena.layout.head_index(x, y) else {
            return Insertion::OutOfBounds;
        };

        let slot = arena.counter.fetch_add(1, Ordering::AcqRel);
        if slot >= arena.layout.capacity {
            return Insertion::Dropped;
        }

        let next = arena.heads[pixel].swap(slot, Ordering::AcqRel);
        match arena.nodes[slot as usize].set(FragmentNode::new(color, depth, next)) {
            Ok(()) => Insertion::Stored { slot },
            Err(_) => Insertion::Dropped,
        }
    }

    /// Slots handed out so far, including dropped requests
    pub fn requested(&self) -> u32 {
        self.arena.counter.load(Ordering::Acquire)
    }

    /// Gather/resolve barrier
    pub fn finish(self) -> ResolvePhase<'a> {
        let stats = self.arena.stats();
        if stats.is_overflowing() {
            tracing::warn!(
                "fragment arena overflow: {} of {} fragments dropped",
                stats.dropped(),
                stats.requested
            );
        }
        ResolvePhase { arena: self.arena }
    }
}

/// Read-only view of a gathered frame
pub struct ResolvePhase<'a> {
    arena: &'a FragmentArena,
}

impl<'a> ResolvePhase<'a> {
    pub fn layout(&self) -> ArenaLayout {
        self.arena.layout
    }

    /// Follow a pixel's list from its head, most recent fragment first.
    ///
    /// The walk stops at the sentinel, at a slot outside the arena, or after
    /// `capacity` steps, whichever comes first.
    pub fn chain(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, &'a FragmentNode)> + 'a {
        let arena = self.arena;
        let mut slot = arena
            .layout
            .head_index(x, y)
            .map(|pixel| arena.heads[pixel].load(Ordering::Acquire))
            .unwrap_or(SENTINEL);
        let mut steps = 0u32;
        std::iter::from_fn(move || {
            if slot >= arena.layout.capacity || steps >= arena.layout.capacity {
                return None;
            }
            let node = arena.nodes[slot as usize].get()?;
            let current = slot;
            slot = node.next;
            steps += 1;
            Some((current, node))
        })
    }

    /// Bounded walk into a local array, sorted nearest first
    pub fn collect(&self, x: u32, y: u32) -> PixelFragments {
        let mut fragments: PixelFragments = self
            .chain(x, y)
            .take(self.arena.layout.entries_per_pixel as usize)
            .map(|(_, node)| *node)
            .collect();
        sort_by_depth(&mut fragments);
        fragments
    }

    /// Composite one pixel over `background`. Empty pixels return the
    /// background unchanged.
    pub fn resolve_pixel(&self, x: u32, y: u32, background: Rgba) -> Rgba {
        let fragments = self.collect(x, y);
        if fragments.is_empty() {
            return background;
        }
        blend_over(composite_back_to_front(&fragments), background)
    }

    /// Resolve every pixel, row-major
    pub fn resolve_image(&self, background: Rgba) -> Vec<Rgba> {
        let layout = self.arena.layout;
        let mut out = Vec::with_capacity(layout.pixels as usize);
        for y in 0..layout.height {
            for x in 0..layout.width {
                out.push(self.resolve_pixel(x, y, background));
            }
        }
        out
    }

    pub fn stats(&self) -> OitStats {
        self.arena.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_links_in_reverse_order() {
        let mut arena = FragmentArena::new(2, 2, 4).unwrap();
        let gather = arena.begin_gather();
        assert_eq!(gather.insert(1, 0, Rgba::WHITE, 1.0), Insertion::Stored { slot: 0 });
        assert_eq!(gather.insert(1, 0, Rgba::WHITE, 2.0), Insertion::Stored { slot: 1 });
        let resolve = gather.finish();

        let slots: Vec<u32> = resolve.chain(1, 0).map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![1, 0]);
        assert_eq!(resolve.chain(0, 0).count(), 0);
    }

    #[test]
    fn out_of_bounds_does_not_allocate() {
        let mut arena = FragmentArena::new(2, 2, 1).unwrap();
        let gather = arena.begin_gather();
        assert_eq!(gather.insert(2, 0, Rgba::WHITE, 1.0), Insertion::OutOfBounds);
        assert_eq!(gather.requested(), 0);
    }

    #[test]
    fn clear_releases_slots_for_next_frame() {
        let mut arena = FragmentArena::new(1, 1, 2).unwrap();
        {
            let gather = arena.begin_gather();
            gather.insert(0, 0, Rgba::WHITE, 1.0);
            gather.insert(0, 0, Rgba::WHITE, 2.0);
            gather.insert(0, 0, Rgba::WHITE, 3.0);
            assert!(gather.finish().stats().is_overflowing());
        }
        let gather = arena.begin_gather();
        assert_eq!(gather.insert(0, 0, Rgba::BLACK, 5.0), Insertion::Stored { slot: 0 });
        let resolve = gather.finish();
        assert_eq!(resolve.collect(0, 0).len(), 1);
        assert_eq!(resolve.stats().requested, 1);
    }

    #[test]
    fn every_request_advances_the_counter() {
        let mut arena = FragmentArena::new(1, 1, 2).unwrap();
        let gather = arena.begin_gather();
        let outcomes: Vec<Insertion> = (0..5)
            .map(|i| gather.insert(0, 0, Rgba::WHITE, i as f32))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Insertion::Stored { slot: 0 },
                Insertion::Stored { slot: 1 },
                Insertion::Dropped,
                Insertion::Dropped,
                Insertion::Dropped,
            ]
        );
        // Dropped fragments still consumed a counter increment
        assert_eq!(gather.requested(), 5);

        let stats = gather.finish().stats();
        assert_eq!(stats.stored(), 2);
        assert_eq!(stats.dropped(), 3);
    }

    #[test]
    fn resize_resets_everything() {
        let mut arena = FragmentArena::new(2, 2, 2).unwrap();
        arena.begin_gather().insert(0, 0, Rgba::WHITE, 1.0);
        arena.resize(3, 1).unwrap();
        assert_eq!(arena.layout().pixels, 3);
        assert_eq!(arena.layout().capacity, 6);
        assert_eq!(arena.stats().requested, 0);
    }
}
