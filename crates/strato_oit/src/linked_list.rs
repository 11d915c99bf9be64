//! Per-pixel linked-list renderer
//!
//! Frame sequence on the GPU:
//!
//! 1. `cs_clear` resets every head to the sentinel and the counter to zero
//! 2. `fs_gather` links each transparent fragment into its pixel's list
//! 3. `fs_resolve` walks, sorts and composites each list over the scene
//!
//! wgpu inserts the storage barriers between passes, so the clear is
//! visible to the gather pass and the gather pass to the resolve pass.

use crate::buffers::LinkedListBuffers;
use crate::config::{OitConfig, OitMode};
use crate::context::GpuContext;
use crate::error::{OitError, Result};
use crate::fragment::{CameraUniforms, FragmentNode};
use crate::renderer::{
    gather_vertex_buffers, line_primitive_state, read_only_depth, transparent_depth_state,
    CameraBinding, FramePhase, OitRenderer, SceneTargets,
};
use crate::shaders::{clear_shader_source, gather_shader_source, resolve_shader_source};
use crate::stats::OitStats;

const CLEAR_WORKGROUP_SIZE: u32 = 64;

/// Workgroup grid covering `invocations` with at most `max_per_dimension`
/// groups along x. Matches the index math in `cs_clear`.
pub fn clear_dispatch_size(invocations: u32, max_per_dimension: u32) -> (u32, u32) {
    let groups = invocations.div_ceil(CLEAR_WORKGROUP_SIZE).max(1);
    let max = max_per_dimension.max(1);
    if groups <= max {
        (groups, 1)
    } else {
        (max, groups.div_ceil(max))
    }
}

/// Largest entries-per-pixel value whose fragment buffer fits in `limit`
/// bytes at this resolution. Never below 1.
pub fn fit_entries_per_pixel(limit: u64, width: u32, height: u32, requested: u32) -> u32 {
    let per_entry = u64::from(width) * u64::from(height) * std::mem::size_of::<FragmentNode>() as u64;
    if per_entry == 0 {
        return requested.max(1);
    }
    let fits = (limit / per_entry).min(u64::from(u32::MAX)) as u32;
    requested.min(fits).max(1)
}

/// Resources rebuilt on every resize
struct FrameResources {
    buffers: LinkedListBuffers,
    /// Group 0 of the clear pass, group 1 of the gather pass
    list_bind_group: wgpu::BindGroup,
    resolve_bind_group: wgpu::BindGroup,
    /// Group 2 of the gather pass for the last scene depth view
    scene_depth: Option<SceneDepthBinding>,
}

struct SceneDepthBinding {
    view: wgpu::Id<wgpu::TextureView>,
    bind_group: wgpu::BindGroup,
}

pub struct LinkedListRenderer {
    ctx: GpuContext,
    config: OitConfig,
    width: u32,
    height: u32,
    camera: CameraBinding,
    list_layout: wgpu::BindGroupLayout,
    depth_layout: wgpu::BindGroupLayout,
    resolve_layout: wgpu::BindGroupLayout,
    clear_pipeline: wgpu::ComputePipeline,
    gather_pipeline: wgpu::RenderPipeline,
    resolve_pipeline: wgpu::RenderPipeline,
    frame: FrameResources,
    phase: FramePhase,
    counter_copied: bool,
    depth_bind_groups_created: u64,
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl LinkedListRenderer {
    pub fn new(ctx: &GpuContext, config: &OitConfig, width: u32, height: u32) -> Result<Self> {
        if !ctx.supports_fragment_storage() {
            return Err(OitError::Unsupported("storage buffer writes from fragment shaders"));
        }
        let device = ctx.device();
        let camera = CameraBinding::new(ctx)?;

        let list_stages = wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE;
        let list_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Strato Linked List Bind Group Layout"),
            entries: &[
                uniform_entry(0, list_stages),
                storage_entry(1, list_stages, false),
                storage_entry(2, list_stages, false),
                storage_entry(3, list_stages, false),
            ],
        });
        let depth_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Strato Scene Depth Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });
        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Strato Resolve Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                storage_entry(1, wgpu::ShaderStages::FRAGMENT, true),
                storage_entry(2, wgpu::ShaderStages::FRAGMENT, true),
            ],
        });

        // Clear pipeline
        let clear_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Strato Clear Shader"),
            source: wgpu::ShaderSource::Wgsl(clear_shader_source().into()),
        });
        let clear_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Strato Clear Pipeline Layout"),
            bind_group_layouts: &[&list_layout],
            push_constant_ranges: &[],
        });
        let clear_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Strato Clear Pipeline"),
            layout: Some(&clear_layout),
            module: &clear_shader,
            entry_point: Some("cs_clear"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        // Gather pipeline
        let gather_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Strato Gather Shader"),
            source: wgpu::ShaderSource::Wgsl(gather_shader_source().into()),
        });
        let gather_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Strato Gather Pipeline Layout"),
            bind_group_layouts: &[&camera.layout, &list_layout, &depth_layout],
            push_constant_ranges: &[],
        });
        let vertex_buffers = gather_vertex_buffers();
        let gather_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Strato Gather Pipeline"),
            layout: Some(&gather_layout),
            vertex: wgpu::VertexState {
                module: &gather_shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &gather_shader,
                entry_point: Some("fs_gather"),
                targets: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: line_primitive_state(),
            depth_stencil: Some(transparent_depth_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Resolve pipeline
        let resolve_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Strato Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(resolve_shader_source(config.entries_per_pixel).into()),
        });
        let resolve_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Strato Resolve Pipeline Layout"),
            bind_group_layouts: &[&resolve_layout],
            push_constant_ranges: &[],
        });
        // Resolve output is premultiplied
        let premultiplied_over = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let resolve_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Strato Resolve Pipeline"),
            layout: Some(&resolve_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &resolve_shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &resolve_shader,
                entry_point: Some("fs_resolve"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.texture_format,
                    blend: Some(premultiplied_over),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let frame = Self::create_frame_resources(
            ctx,
            config,
            &list_layout,
            &resolve_layout,
            width,
            height,
        )?;

        Ok(Self {
            ctx: ctx.clone(),
            config: config.clone(),
            width,
            height,
            camera,
            list_layout,
            depth_layout,
            resolve_layout,
            clear_pipeline,
            gather_pipeline,
            resolve_pipeline,
            frame,
            phase: FramePhase::Idle,
            counter_copied: false,
            depth_bind_groups_created: 0,
        })
    }

    fn create_frame_resources(
        ctx: &GpuContext,
        config: &OitConfig,
        list_layout: &wgpu::BindGroupLayout,
        resolve_layout: &wgpu::BindGroupLayout,
        width: u32,
        height: u32,
    ) -> Result<FrameResources> {
        let limit = ctx.buffer_limit(wgpu::BufferUsages::STORAGE);
        let entries = fit_entries_per_pixel(limit, width, height, config.entries_per_pixel);
        if entries < config.entries_per_pixel {
            tracing::warn!(
                "entries_per_pixel reduced from {} to {} to fit the {} MiB storage limit at {}x{}",
                config.entries_per_pixel,
                entries,
                limit / (1024 * 1024),
                width,
                height
            );
        }

        let buffers = LinkedListBuffers::new(ctx, width, height, entries)?;
        let device = ctx.device();

        let list_entries = [
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: buffers.fragments.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffers.heads.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: buffers.counter.as_entire_binding(),
            },
        ];
        let list_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Strato Linked List Bind Group"),
            layout: list_layout,
            entries: &list_entries,
        });
        let resolve_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Strato Resolve Bind Group"),
            layout: resolve_layout,
            entries: &list_entries[..3],
        });

        Ok(FrameResources {
            buffers,
            list_bind_group,
            resolve_bind_group,
            scene_depth: None,
        })
    }

    /// Entries per pixel actually allocated at the current resolution
    pub fn entries_per_pixel(&self) -> u32 {
        self.frame.buffers.layout.entries_per_pixel
    }

    /// Fragment arena capacity at the current resolution
    pub fn capacity(&self) -> u32 {
        self.frame.buffers.layout.capacity
    }

    pub fn buffers(&self) -> &LinkedListBuffers {
        &self.frame.buffers
    }

    /// Allocation counter value from the last submitted `gather_end`.
    ///
    /// Returns 0 before the first frame.
    pub fn read_fragment_count(&self) -> Result<u32> {
        if !self.counter_copied {
            return Ok(0);
        }
        let bytes = self.ctx.read_buffer(&self.frame.buffers.counter_readback)?;
        Ok(bytemuck::pod_read_unaligned::<u32>(&bytes[..4]))
    }
}

impl OitRenderer for LinkedListRenderer {
    fn mode(&self) -> OitMode {
        OitMode::LinkedList
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resolution_changed(&mut self, width: u32, height: u32) -> Result<()> {
        if self.phase == FramePhase::Gathering {
            tracing::warn!("resolution changed during a gather phase; frame discarded");
        }
        self.frame = Self::create_frame_resources(
            &self.ctx,
            &self.config,
            &self.list_layout,
            &self.resolve_layout,
            width,
            height,
        )?;
        self.width = width;
        self.height = height;
        self.phase = FramePhase::Idle;
        self.counter_copied = false;
        tracing::debug!("linked-list renderer resized to {}x{}", width, height);
        Ok(())
    }

    fn set_camera(&mut self, camera: CameraUniforms) {
        self.camera.set(self.ctx.queue(), camera);
    }

    fn camera(&self) -> CameraUniforms {
        self.camera.get()
    }

    fn gather_begin(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if self.phase == FramePhase::Gathering {
            tracing::warn!("gather_begin called twice without gather_end");
        }
        let (x, y) = clear_dispatch_size(
            self.frame.buffers.clear_invocations(),
            self.ctx.limits().max_compute_workgroups_per_dimension,
        );
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Strato Clear Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.clear_pipeline);
            pass.set_bind_group(0, &self.frame.list_bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        tracing::trace!("clear pass recorded ({}x{} workgroups)", x, y);
        self.phase = FramePhase::Gathering;
    }

    fn gather_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.gather_pipeline
    }

    fn begin_gather_pass<'e>(
        &mut self,
        encoder: &'e mut wgpu::CommandEncoder,
        targets: &SceneTargets<'_>,
    ) -> wgpu::RenderPass<'e> {
        if self.phase != FramePhase::Gathering {
            tracing::warn!("gather pass opened outside gather_begin/gather_end");
        }
        let view = targets.depth.global_id();
        let cached = self.frame.scene_depth.as_ref().is_some_and(|b| b.view == view);
        if !cached {
            let bind_group = self.ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Strato Scene Depth Bind Group"),
                layout: &self.depth_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(targets.depth),
                }],
            });
            self.frame.scene_depth = Some(SceneDepthBinding { view, bind_group });
            self.depth_bind_groups_created += 1;
            tracing::debug!("scene depth bind group rebuilt for a new depth view");
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Strato Gather Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(read_only_depth(targets.depth)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.gather_pipeline);
        pass.set_bind_group(0, &self.camera.bind_group, &[]);
        pass.set_bind_group(1, &self.frame.list_bind_group, &[]);
        if let Some(binding) = &self.frame.scene_depth {
            pass.set_bind_group(2, &binding.bind_group, &[]);
        }
        pass
    }

    fn gather_end(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if self.phase != FramePhase::Gathering {
            tracing::warn!("gather_end called without gather_begin");
        }
        let buffers = &self.frame.buffers;
        encoder.copy_buffer_to_buffer(
            &buffers.counter,
            0,
            &buffers.counter_readback,
            0,
            buffers.counter.size(),
        );
        self.counter_copied = true;
        self.phase = FramePhase::Gathered;
    }

    fn render_to_screen(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.phase != FramePhase::Gathered {
            tracing::warn!("render_to_screen called before gather_end; output is undefined");
        }
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Strato Resolve Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.resolve_pipeline);
        pass.set_bind_group(0, &self.frame.resolve_bind_group, &[]);
        pass.draw(0..3, 0..1);
        drop(pass);
        self.phase = FramePhase::Idle;
    }

    fn stats(&self) -> Result<OitStats> {
        let stats = OitStats::new(
            self.read_fragment_count()?,
            self.capacity(),
            self.config.near_capacity_ratio,
        );
        if stats.is_overflowing() {
            tracing::warn!(
                "fragment buffer overflow: dropped {} of {} fragments; raise entries_per_pixel",
                stats.dropped(),
                stats.requested
            );
        } else if stats.near_capacity() {
            tracing::warn!(
                "fragment buffer {:.0}% full",
                stats.fill_ratio() * 100.0
            );
        }
        Ok(stats)
    }

    fn diagnostics(&self) -> Vec<(&'static str, String)> {
        let layout = self.frame.buffers.layout;
        vec![
            ("mode", OitMode::LinkedList.to_string()),
            ("resolution", format!("{}x{}", self.width, self.height)),
            ("entries per pixel", layout.entries_per_pixel.to_string()),
            ("capacity", layout.capacity.to_string()),
            (
                "fragment buffer",
                format!("{:.1} MiB", layout.fragment_bytes() as f64 / (1024.0 * 1024.0)),
            ),
            (
                "head table",
                format!("{:.1} MiB", layout.head_bytes() as f64 / (1024.0 * 1024.0)),
            ),
            (
                "total",
                format!("{:.1} MiB", self.frame.buffers.total_bytes() as f64 / (1024.0 * 1024.0)),
            ),
            ("depth bind groups", self.depth_bind_groups_created.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_targets_dispatch_one_row() {
        assert_eq!(clear_dispatch_size(1, 65535), (1, 1));
        assert_eq!(clear_dispatch_size(64, 65535), (1, 1));
        assert_eq!(clear_dispatch_size(65, 65535), (2, 1));
    }

    #[test]
    fn large_targets_spill_into_y() {
        // 4K: 8_294_400 heads -> 129_600 groups
        let (x, y) = clear_dispatch_size(3840 * 2160, 65535);
        assert_eq!(x, 65535);
        assert_eq!(y, 2);
        assert!(u64::from(x) * u64::from(y) * 64 >= 3840 * 2160);
    }

    #[test]
    fn entries_shrink_to_fit_storage_limit() {
        let per_entry = 1920u64 * 1080 * 32;
        assert_eq!(fit_entries_per_pixel(per_entry * 8, 1920, 1080, 8), 8);
        assert_eq!(fit_entries_per_pixel(per_entry * 4, 1920, 1080, 8), 4);
        assert_eq!(fit_entries_per_pixel(per_entry / 2, 1920, 1080, 8), 1);
    }
}
