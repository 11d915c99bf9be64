//! End-to-end checks against a real adapter. Run with `cargo test -- --ignored`.

use glam::{Mat4, Vec3};
use strato_oit::{
    CameraUniforms, GpuContext, LineVertex, OitConfig, OitMode, OitRenderer, SceneTargets,
    DEPTH_FORMAT,
};
use wgpu::util::DeviceExt;

const SIZE: u32 = 32;

struct Scene {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

fn scene(ctx: &GpuContext) -> Scene {
    let extent = wgpu::Extent3d {
        width: SIZE,
        height: SIZE,
        depth_or_array_layers: 1,
    };
    let color = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("test_scene_color"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("test_scene_depth"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    Scene {
        color,
        color_view,
        depth_view,
    }
}

/// Horizontal line through the middle of the target at view depth `z`
fn line(z: f32, attribute: f32) -> [LineVertex; 2] {
    [
        LineVertex::new(Vec3::new(-1.0, 0.0, z), attribute),
        LineVertex::new(Vec3::new(1.0, 0.0, z), attribute),
    ]
}

fn render_frame(ctx: &GpuContext, renderer: &mut dyn OitRenderer, vertices: &[LineVertex]) -> Vec<u8> {
    render_into(ctx, renderer, &scene(ctx), vertices)
}

fn render_into(
    ctx: &GpuContext,
    renderer: &mut dyn OitRenderer,
    scene: &Scene,
    vertices: &[LineVertex],
) -> Vec<u8> {
    let (color_view, depth_view) = (&scene.color_view, &scene.depth_view);
    let vertex_buffer = ctx
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("test_lines"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let _opaque = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("test_opaque"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
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

    renderer.gather_begin(&mut encoder);
    {
        let targets = SceneTargets {
            color: color_view,
            depth: depth_view,
        };
        let mut pass = renderer.begin_gather_pass(&mut encoder, &targets);
        if !vertices.is_empty() {
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..vertices.len() as u32, 0..1);
        }
    }
    renderer.gather_end(&mut encoder);
    renderer.render_to_screen(&mut encoder, color_view);
    ctx.queue().submit(std::iter::once(encoder.finish()));

    ctx.read_texture_rgba8(&scene.color, SIZE, SIZE).unwrap()
}

fn camera() -> CameraUniforms {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
    CameraUniforms::new(view, projection)
        .with_attribute_range(0.0, 1.0)
        .with_opacity(0.5)
}

fn context() -> GpuContext {
    GpuContext::headless_blocking().expect("a GPU adapter is required for ignored tests")
}

#[test]
#[ignore]
fn linked_list_output_is_order_independent() {
    let ctx = context();
    let mut renderer = OitMode::LinkedList
        .create_renderer(&ctx, &OitConfig::default(), SIZE, SIZE)
        .unwrap();
    renderer.set_camera(camera());

    let near = line(1.0, 0.0);
    let far = line(-1.0, 1.0);
    let a = render_frame(&ctx, renderer.as_mut(), &[near, far].concat());
    let b = render_frame(&ctx, renderer.as_mut(), &[far, near].concat());
    assert_eq!(a, b);

    let stats = renderer.stats().unwrap();
    assert!(stats.requested > 0);
    assert_eq!(stats.dropped(), 0);
}

#[test]
#[ignore]
fn empty_frame_leaves_scene_untouched() {
    let ctx = context();
    let mut renderer = OitMode::LinkedList
        .create_renderer(&ctx, &OitConfig::default(), SIZE, SIZE)
        .unwrap();
    renderer.set_camera(camera());

    let pixels = render_frame(&ctx, renderer.as_mut(), &[]);
    assert!(pixels.chunks(4).all(|p| p == [0, 0, 0, 255]));
    assert_eq!(renderer.stats().unwrap().requested, 0);
}

#[test]
#[ignore]
fn resize_keeps_camera_and_resets_counts() {
    let ctx = context();
    let mut renderer = OitMode::LinkedList
        .create_renderer(&ctx, &OitConfig::default(), 16, 16)
        .unwrap();
    let cam = camera();
    renderer.set_camera(cam);
    renderer.resolution_changed(SIZE, SIZE).unwrap();

    assert_eq!(renderer.resolution(), (SIZE, SIZE));
    assert_eq!(renderer.camera(), cam);
    assert_eq!(renderer.stats().unwrap().requested, 0);

    render_frame(&ctx, renderer.as_mut(), &line(0.0, 0.5));
    assert_eq!(renderer.camera(), cam);
}

fn diagnostic(renderer: &dyn OitRenderer, name: &str) -> Option<String> {
    renderer
        .diagnostics()
        .into_iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[test]
#[ignore]
fn depth_binding_is_reused_for_the_same_view() {
    let ctx = context();
    let mut renderer = OitMode::LinkedList
        .create_renderer(&ctx, &OitConfig::default(), SIZE, SIZE)
        .unwrap();
    renderer.set_camera(camera());

    let target = scene(&ctx);
    let first = render_into(&ctx, renderer.as_mut(), &target, &line(0.0, 0.5));
    let second = render_into(&ctx, renderer.as_mut(), &target, &line(0.0, 0.5));
    assert_eq!(first, second);
    assert_eq!(diagnostic(renderer.as_ref(), "depth bind groups").as_deref(), Some("1"));

    // A new depth view gets a new binding
    render_frame(&ctx, renderer.as_mut(), &line(0.0, 0.5));
    assert_eq!(diagnostic(renderer.as_ref(), "depth bind groups").as_deref(), Some("2"));

    // Resizing drops the binding along with the arena
    renderer.resolution_changed(SIZE, SIZE).unwrap();
    render_into(&ctx, renderer.as_mut(), &target, &line(0.0, 0.5));
    assert_eq!(diagnostic(renderer.as_ref(), "depth bind groups").as_deref(), Some("3"));
}

#[test]
#[ignore]
fn dummy_renderer_blends_in_draw_order() {
    let ctx = context();
    let mut renderer = OitMode::Dummy
        .create_renderer(&ctx, &OitConfig::default(), SIZE, SIZE)
        .unwrap();
    renderer.set_camera(camera());

    let pixels = render_frame(&ctx, renderer.as_mut(), &line(0.0, 0.5));
    assert!(pixels.chunks(4).any(|p| p[0] > 0 || p[1] > 0 || p[2] > 0));
    assert_eq!(renderer.stats().unwrap().capacity, 0);
}
