//! Renderer interface shared by every transparency strategy
//!
//! The render loop drives a renderer in a fixed order each frame:
//!
//! ```text
//! resolution_changed (only when the target size changed)
//! gather_begin -> begin_gather_pass + draws -> gather_end -> render_to_screen
//! ```
//!
//! All methods record into a caller-owned `CommandEncoder`; nothing is
//! submitted here.

use crate::config::{OitConfig, OitMode};
use crate::context::{GpuContext, DEPTH_FORMAT};
use crate::dummy::DummyRenderer;
use crate::error::Result;
use crate::fragment::{CameraUniforms, LineVertex};
use crate::linked_list::LinkedListRenderer;
use crate::stats::OitStats;

/// Opaque scene attachments the transparent geometry is drawn against
#[derive(Clone, Copy)]
pub struct SceneTargets<'a> {
    /// Scene color, already containing the opaque pass
    pub color: &'a wgpu::TextureView,
    /// Scene depth in [`DEPTH_FORMAT`], usable as a texture binding
    pub depth: &'a wgpu::TextureView,
}

/// A swappable order-independent transparency strategy
pub trait OitRenderer {
    fn mode(&self) -> OitMode;

    /// Current target size in pixels
    fn resolution(&self) -> (u32, u32);

    /// Reallocate every resolution-dependent resource. Equivalent to a
    /// full reset; no fragment state survives.
    fn resolution_changed(&mut self, width: u32, height: u32) -> Result<()>;

    /// Upload view, projection and transfer-function range for the gather
    /// draws
    fn set_camera(&mut self, camera: CameraUniforms);

    fn camera(&self) -> CameraUniforms;

    /// Start a frame. Stateful variants record their clear pass here.
    fn gather_begin(&mut self, encoder: &mut wgpu::CommandEncoder);

    /// Pipeline transparent geometry must be drawn with
    fn gather_pipeline(&self) -> &wgpu::RenderPipeline;

    /// Open a render pass with the gather pipeline and its bind groups set.
    /// The caller binds a [`LineVertex`] buffer and issues draws. Bindings
    /// of `targets.depth` are kept until a different view is passed.
    fn begin_gather_pass<'e>(
        &mut self,
        encoder: &'e mut wgpu::CommandEncoder,
        targets: &SceneTargets<'_>,
    ) -> wgpu::RenderPass<'e>;

    /// Close the gather phase
    fn gather_end(&mut self, encoder: &mut wgpu::CommandEncoder);

    /// Composite gathered fragments over `target`
    fn render_to_screen(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView);

    /// Arena occupancy of the last submitted frame. Blocks on a readback.
    fn stats(&self) -> Result<OitStats>;

    /// Name/value pairs for a diagnostics panel
    fn diagnostics(&self) -> Vec<(&'static str, String)>;
}

impl OitMode {
    /// Create the renderer for this mode sized to `width` x `height`
    pub fn create_renderer(
        self,
        ctx: &GpuContext,
        config: &OitConfig,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn OitRenderer>> {
        let config = OitConfig {
            mode: self,
            ..config.clone()
        }
        .sanitized();
        tracing::info!(
            "creating {} renderer {}x{} ({} entries per pixel)",
            self,
            width,
            height,
            config.entries_per_pixel
        );
        let renderer: Box<dyn OitRenderer> = match self {
            OitMode::Dummy => Box::new(DummyRenderer::new(ctx, &config, width, height)?),
            OitMode::LinkedList => Box::new(LinkedListRenderer::new(ctx, &config, width, height)?),
        };
        Ok(renderer)
    }
}

/// Create the renderer selected by `config.mode`
pub fn create_renderer(
    ctx: &GpuContext,
    config: &OitConfig,
    width: u32,
    height: u32,
) -> Result<Box<dyn OitRenderer>> {
    config.mode.create_renderer(ctx, config, width, height)
}

/// Where a renderer is inside the per-frame call sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FramePhase {
    Idle,
    Gathering,
    Gathered,
}

/// Camera uniform buffer and its bind group (group 0 of both gather
/// pipelines)
pub(crate) struct CameraBinding {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    buffer: wgpu::Buffer,
    value: CameraUniforms,
}

impl CameraBinding {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let device = ctx.device();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Strato Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let buffer = ctx.create_buffer_checked(
            "strato_camera_uniforms",
            std::mem::size_of::<CameraUniforms>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Strato Camera Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let value = CameraUniforms::default();
        ctx.queue().write_buffer(&buffer, 0, bytemuck::bytes_of(&value));
        Ok(Self {
            layout,
            bind_group,
            buffer,
            value,
        })
    }

    pub fn set(&mut self, queue: &wgpu::Queue, value: CameraUniforms) {
        self.value = value;
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&value));
    }

    pub fn get(&self) -> CameraUniforms {
        self.value
    }
}

/// Depth state for transparent geometry: test against the opaque scene,
/// never write
pub(crate) fn transparent_depth_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub(crate) fn line_primitive_state() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::LineList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

/// Read-only depth attachment shared by the gather passes
pub(crate) fn read_only_depth(view: &wgpu::TextureView) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: None,
        stencil_ops: None,
    }
}

/// Vertex buffers every gather pipeline expects
pub(crate) fn gather_vertex_buffers() -> [wgpu::VertexBufferLayout<'static>; 1] {
    [LineVertex::layout()]
}
