//! GPU buffer set backing the per-pixel linked lists

use crate::context::GpuContext;
use crate::error::Result;
use crate::fragment::OitParams;
use crate::layout::ArenaLayout;

/// Fragment arena, head table and allocation counter for one resolution.
///
/// Never resized in place: a new resolution builds a new set and drops the
/// old one.
pub struct LinkedListBuffers {
    pub layout: ArenaLayout,
    /// `FragmentNode` array, `capacity` entries
    pub fragments: wgpu::Buffer,
    /// One `u32` head slot per pixel
    pub heads: wgpu::Buffer,
    /// Global `atomic<u32>` allocation counter
    pub counter: wgpu::Buffer,
    /// Host-mappable copy of the counter for diagnostics
    pub counter_readback: wgpu::Buffer,
    /// `OitParams` uniform
    pub params: wgpu::Buffer,
}

impl LinkedListBuffers {
    pub fn new(ctx: &GpuContext, width: u32, height: u32, entries_per_pixel: u32) -> Result<Self> {
        let layout = ArenaLayout::new(width, height, entries_per_pixel)?;
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        let fragments = ctx.create_buffer_checked(
            "strato_oit_fragments",
            layout.fragment_bytes(),
            storage,
        )?;
        let heads = ctx.create_buffer_checked("strato_oit_heads", layout.head_bytes(), storage)?;
        let counter = ctx.create_buffer_checked(
            "strato_oit_counter",
            std::mem::size_of::<u32>() as u64,
            storage | wgpu::BufferUsages::COPY_SRC,
        )?;
        let counter_readback = ctx.create_buffer_checked(
            "strato_oit_counter_readback",
            std::mem::size_of::<u32>() as u64,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;
        let params = ctx.create_buffer_checked(
            "strato_oit_params",
            std::mem::size_of::<OitParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;

        let values = OitParams {
            width,
            height,
            capacity: layout.capacity,
            entries_per_pixel,
        };
        ctx.queue()
            .write_buffer(&params, 0, bytemuck::bytes_of(&values));

        tracing::info!(
            "linked-list buffers {}x{}: {} slots, {:.1} MiB fragments, {:.1} MiB heads",
            width,
            height,
            layout.capacity,
            layout.fragment_bytes() as f64 / (1024.0 * 1024.0),
            layout.head_bytes() as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            layout,
            fragments,
            heads,
            counter,
            counter_readback,
            params,
        })
    }

    /// Total device memory held by this set
    pub fn total_bytes(&self) -> u64 {
        self.fragments.size()
            + self.heads.size()
            + self.counter.size()
            + self.counter_readback.size()
            + self.params.size()
    }

    /// Invocations needed to cover every head slot
    pub fn clear_invocations(&self) -> u32 {
        self.layout.pixels
    }
}
