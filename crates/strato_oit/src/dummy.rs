//! Baseline renderer: hardware alpha blending in submission order.
//!
//! Results depend on draw order. Useful as a performance and correctness
//! reference for the linked-list renderer.

use crate::config::{OitConfig, OitMode};
use crate::context::GpuContext;
use crate::error::{OitError, Result};
use crate::fragment::CameraUniforms;
use crate::renderer::{
    gather_vertex_buffers, line_primitive_state, read_only_depth, transparent_depth_state,
    CameraBinding, OitRenderer, SceneTargets,
};
use crate::shaders::dummy_shader_source;
use crate::stats::OitStats;

pub struct DummyRenderer {
    ctx: GpuContext,
    width: u32,
    height: u32,
    near_capacity_ratio: f32,
    camera: CameraBinding,
    pipeline: wgpu::RenderPipeline,
}

impl DummyRenderer {
    pub fn new(ctx: &GpuContext, config: &OitConfig, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(OitError::InvalidResolution {
                width,
                height,
                entries_per_pixel: 0,
            });
        }

        let device = ctx.device();
        let camera = CameraBinding::new(ctx)?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Strato Dummy Shader"),
            source: wgpu::ShaderSource::Wgsl(dummy_shader_source().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Strato Dummy Pipeline Layout"),
            bind_group_layouts: &[&camera.layout],
            push_constant_ranges: &[],
        });

        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let vertex_buffers = gather_vertex_buffers();
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Strato Dummy Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_blend"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.texture_format,
                    blend: Some(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: line_primitive_state(),
            depth_stencil: Some(transparent_depth_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            ctx: ctx.clone(),
            width,
            height,
            near_capacity_ratio: config.near_capacity_ratio,
            camera,
            pipeline,
        })
    }
}

impl OitRenderer for DummyRenderer {
    fn mode(&self) -> OitMode {
        OitMode::Dummy
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resolution_changed(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(OitError::InvalidResolution {
                width,
                height,
                entries_per_pixel: 0,
            });
        }
        self.width = width;
        self.height = height;
        tracing::debug!("dummy renderer resized to {}x{}", width, height);
        Ok(())
    }

    fn set_camera(&mut self, camera: CameraUniforms) {
        self.camera.set(self.ctx.queue(), camera);
    }

    fn camera(&self) -> CameraUniforms {
        self.camera.get()
    }

    fn gather_begin(&mut self, _encoder: &mut wgpu::CommandEncoder) {}

    fn gather_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    fn begin_gather_pass<'e>(
        &mut self,
        encoder: &'e mut wgpu::CommandEncoder,
        targets: &SceneTargets<'_>,
    ) -> wgpu::RenderPass<'e> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Strato Dummy Blend Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(read_only_depth(targets.depth)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera.bind_group, &[]);
        pass
    }

    fn gather_end(&mut self, _encoder: &mut wgpu::CommandEncoder) {}

    fn render_to_screen(&mut self, _encoder: &mut wgpu::CommandEncoder, _target: &wgpu::TextureView) {}

    fn stats(&self) -> Result<OitStats> {
        Ok(OitStats::new(0, 0, self.near_capacity_ratio))
    }

    fn diagnostics(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", OitMode::Dummy.to_string()),
            ("resolution", format!("{}x{}", self.width, self.height)),
        ]
    }
}
