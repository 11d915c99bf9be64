//! GPU-shared data layouts
//!
//! Every structure here is `#[repr(C)]` and `bytemuck::Pod` so it can be
//! copied into buffers without conversion. Field order must match the WGSL
//! declarations in [`crate::shaders`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Index value meaning "no further fragment" / "empty pixel".
///
/// Arena capacities are always strictly below this value.
pub const SENTINEL: u32 = u32::MAX;

/// Linear RGBA color, straight (non-premultiplied) unless stated otherwise
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn rgb(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// Quantize to 8-bit RGBA, clamping each channel to [0, 1]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl From<[f32; 4]> for Rgba {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// One recorded transparent fragment.
///
/// 32 bytes: two `vec4` slots on the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FragmentNode {
    /// RGBA color of the fragment
    pub color: Rgba,
    /// View-space distance from the camera (larger is farther)
    pub depth: f32,
    /// 1 when the slot was written this frame
    pub used: u32,
    /// Slot of the next fragment of the same pixel, or [`SENTINEL`]
    pub next: u32,
    pub padding: u32,
}

impl FragmentNode {
    pub fn new(color: Rgba, depth: f32, next: u32) -> Self {
        Self {
            color,
            depth,
            used: 1,
            next,
            padding: 0,
        }
    }

    pub fn is_tail(&self) -> bool {
        self.next == SENTINEL
    }
}

/// Per-resolution parameters shared by the clear, gather and resolve shaders
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct OitParams {
    pub width: u32,
    pub height: u32,
    /// Fragment arena capacity (`width * height * entries_per_pixel`)
    pub capacity: u32,
    pub entries_per_pixel: u32,
}

/// Camera and transfer-function uniforms used by the gather shaders.
///
/// The resolve pass draws a fullscreen triangle in clip space and never
/// reads or writes these values.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// Attribute min, attribute max, fragment opacity, unused
    pub attribute_range: [f32; 4],
}

impl CameraUniforms {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            attribute_range: [0.0, 1.0, 1.0, 0.0],
        }
    }

    /// Map `[min, max]` of the per-vertex attribute onto the color ramp
    pub fn with_attribute_range(mut self, min: f32, max: f32) -> Self {
        self.attribute_range[0] = min;
        self.attribute_range[1] = max;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.attribute_range[2] = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.projection)
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Vertex of a transparent polyline segment
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    /// Scalar mapped through the transfer function (pressure for trajectories)
    pub attribute: f32,
}

impl LineVertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

    pub fn new(position: Vec3, attribute: f32) -> Self {
        Self {
            position: position.to_array(),
            attribute,
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_node_is_two_vec4() {
        assert_eq!(std::mem::size_of::<FragmentNode>(), 32);
        assert_eq!(std::mem::align_of::<FragmentNode>(), 4);
    }

    #[test]
    fn uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<OitParams>(), 16);
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 144);
        assert_eq!(std::mem::size_of::<LineVertex>(), 16);
    }

    #[test]
    fn new_node_is_marked_used() {
        let node = FragmentNode::new(Rgba::WHITE, 2.0, SENTINEL);
        assert_eq!(node.used, 1);
        assert!(node.is_tail());
    }

    #[test]
    fn opacity_is_clamped() {
        let camera = CameraUniforms::default().with_opacity(3.0);
        assert_eq!(camera.attribute_range[2], 1.0);
    }

    #[test]
    fn rgba8_quantization_clamps() {
        assert_eq!(Rgba::new(2.0, -1.0, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
    }
}
