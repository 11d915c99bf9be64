//! Headless frame loop
//!
//! Each frame clears the opaque scene, runs the transparency renderer's
//! gather and resolve phases over the trajectory lines and submits. The
//! last frame is read back for PNG output.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use strato_oit::{
    CameraUniforms, GpuContext, LineVertex, OitConfig, OitRenderer, OitStats, SceneTargets,
    DEPTH_FORMAT,
};
use strato_traj::TrajectorySet;
use wgpu::util::DeviceExt;

use crate::config::{CameraConfig, OutputConfig};

/// Two vertices per segment, for a line-list draw
pub fn line_vertices(set: &TrajectorySet) -> Vec<LineVertex> {
    let mut vertices = Vec::with_capacity(set.segment_count() * 2);
    for trajectory in set {
        for ((a, value_a), (b, value_b)) in trajectory.segments() {
            vertices.push(LineVertex::new(a, value_a));
            vertices.push(LineVertex::new(b, value_b));
        }
    }
    vertices
}

/// View and projection orbiting the bounding sphere of `bounds`
pub fn orbit_camera(
    bounds: Option<(Vec3, Vec3)>,
    camera: &CameraConfig,
    frame: u32,
    aspect: f32,
) -> (Mat4, Mat4) {
    let (lo, hi) = bounds.unwrap_or((Vec3::splat(-1.0), Vec3::ONE));
    let center = (lo + hi) * 0.5;
    let radius = ((hi - lo).length() * 0.5).max(1e-3);

    let azimuth = (camera.azimuth_deg + camera.orbit_deg_per_frame * frame as f32).to_radians();
    let elevation = camera.elevation_deg.clamp(-89.0, 89.0).to_radians();
    let direction = Vec3::new(
        elevation.cos() * azimuth.sin(),
        elevation.sin(),
        elevation.cos() * azimuth.cos(),
    );
    // Keep the eye outside the bounding sphere
    let distance = radius * camera.distance.max(1.0);
    let eye = center + direction * distance;

    let view = Mat4::look_at_rh(eye, center, Vec3::Y);
    let near = (distance - radius).max(distance * 0.01);
    let projection = Mat4::perspective_rh(
        camera.fov_y_deg.clamp(1.0, 170.0).to_radians(),
        aspect,
        near,
        distance + radius,
    );
    (view, projection)
}

/// Offscreen color and depth attachments
struct SceneTextures {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl SceneTextures {
    fn new(ctx: &GpuContext, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("strato_scene_color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("strato_scene_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            color,
            color_view,
            depth_view,
        }
    }

    /// Opaque pass: background color and far depth
    fn clear(&self, encoder: &mut wgpu::CommandEncoder, background: [f32; 4]) {
        let [r, g, b, a] = background.map(f64::from);
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Strato Opaque Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

/// Result of a headless run
pub struct RenderOutcome {
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    /// Statistics of the last frame
    pub stats: OitStats,
    /// Tightly packed RGBA8 pixels of the last frame
    pub pixels: Vec<u8>,
}

/// Render `output.frames` frames of `set` and read back the last one
pub fn render_frames(
    ctx: &GpuContext,
    set: &TrajectorySet,
    oit: &OitConfig,
    output: &OutputConfig,
    camera: &CameraConfig,
) -> Result<RenderOutcome> {
    let (width, height) = (output.width.max(1), output.height.max(1));
    let frames = output.frames.max(1);

    let mut renderer = oit
        .mode
        .create_renderer(ctx, oit, width, height)
        .context("Failed to create transparency renderer")?;
    let scene = SceneTextures::new(ctx, oit.texture_format, width, height);

    let vertices = line_vertices(set);
    let vertex_buffer = (!vertices.is_empty()).then(|| {
        ctx.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("strato_trajectory_lines"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
    });
    tracing::info!(
        "rendering {} segments from {} trajectories at {}x{} ({} frames, {})",
        vertices.len() / 2,
        set.len(),
        width,
        height,
        frames,
        oit.mode
    );

    let (attribute_min, attribute_max) = set
        .attribute_series()
        .first()
        .map(|s| (s.min, s.max))
        .unwrap_or((0.0, 1.0));
    let bounds = set.bounds();
    let aspect = width as f32 / height as f32;

    let mut stats = OitStats::default();
    for frame in 0..frames {
        if renderer.resolution() != (width, height) {
            renderer
                .resolution_changed(width, height)
                .context("Failed to resize transparency renderer")?;
        }

        let (view, projection) = orbit_camera(bounds, camera, frame, aspect);
        renderer.set_camera(
            CameraUniforms::new(view, projection)
                .with_attribute_range(attribute_min, attribute_max)
                .with_opacity(oit.opacity),
        );

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strato_frame_encoder"),
            });
        scene.clear(&mut encoder, output.background);
        record_transparent(renderer.as_mut(), &mut encoder, &scene, vertex_buffer.as_ref(), vertices.len() as u32);
        ctx.queue().submit(std::iter::once(encoder.finish()));

        stats = renderer.stats()?;
        tracing::debug!(
            "frame {}: {} fragments stored, {} dropped, {:.1}% full",
            frame,
            stats.stored(),
            stats.dropped(),
            stats.fill_ratio() * 100.0
        );
    }

    for (name, value) in renderer.diagnostics() {
        tracing::info!("{}: {}", name, value);
    }

    let pixels = ctx
        .read_texture_rgba8(&scene.color, width, height)
        .context("Failed to read back the rendered frame")?;
    Ok(RenderOutcome {
        width,
        height,
        frames,
        stats,
        pixels,
    })
}

/// The renderer's per-frame call sequence
fn record_transparent(
    renderer: &mut dyn OitRenderer,
    encoder: &mut wgpu::CommandEncoder,
    scene: &SceneTextures,
    vertex_buffer: Option<&wgpu::Buffer>,
    vertex_count: u32,
) {
    renderer.gather_begin(encoder);
    {
        let targets = SceneTargets {
            color: &scene.color_view,
            depth: &scene.depth_view,
        };
        let mut pass = renderer.begin_gather_pass(encoder, &targets);
        if let Some(buffer) = vertex_buffer {
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..vertex_count, 0..1);
        }
    }
    renderer.gather_end(encoder);
    renderer.render_to_screen(encoder, &scene.color_view);
}

/// Write an RGBA8 frame as PNG
pub fn save_png(path: &Path, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow::anyhow!("Frame buffer does not match {}x{}", width, height))?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_traj::spiral_trajectories;

    #[test]
    fn one_vertex_pair_per_segment() {
        let set = spiral_trajectories(3, 5);
        let vertices = line_vertices(&set);
        assert_eq!(vertices.len(), set.segment_count() * 2);
        assert_eq!(vertices.len(), 3 * 4 * 2);

        // Consecutive pairs share the joint point
        assert_eq!(vertices[1].position, vertices[2].position);
    }

    #[test]
    fn camera_keeps_data_in_front() {
        let set = spiral_trajectories(6, 20);
        let bounds = set.bounds();
        let (view, projection) = orbit_camera(bounds, &CameraConfig::default(), 0, 4.0 / 3.0);
        let view_projection = projection * view;

        let (lo, hi) = bounds.unwrap();
        let clip = view_projection * ((lo + hi) * 0.5).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn orbit_advances_per_frame() {
        let camera = CameraConfig {
            orbit_deg_per_frame: 90.0,
            ..CameraConfig::default()
        };
        let (a, _) = orbit_camera(None, &camera, 0, 1.0);
        let (b, _) = orbit_camera(None, &camera, 1, 1.0);
        assert_ne!(a, b);
    }

    #[test]
    fn png_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        save_png(&path, 2, 2, vec![255; 16]).unwrap();
        assert!(path.exists());
        assert!(save_png(&path, 3, 3, vec![0; 4]).is_err());
    }
}
