//! WGSL shaders for the transparency passes
//!
//! - `COMMON_SHADER`: camera uniforms, line vertex stage, transfer function
//! - `CLEAR_SHADER`: compute pass resetting heads and the counter
//! - `LINKED_LIST_GATHER_SHADER`: records fragments into per-pixel lists
//! - `DUMMY_SHADER`: plain alpha blending in submission order
//! - `RESOLVE_SHADER`: fullscreen walk, sort and composite
//!
//! Struct layouts mirror [`crate::fragment`].

/// Token replaced by the configured entries per pixel in [`RESOLVE_SHADER`]
pub const MAX_FRAGMENTS_TOKEN: &str = "@MAX_FRAGMENTS@";

/// Vertex stage and color mapping shared by both gather variants
pub const COMMON_SHADER: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    // min, max, opacity, unused
    attribute_range: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) attribute: f32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) view_depth: f32,
    @location(1) attribute: f32,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let view_pos = camera.view * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = camera.projection * view_pos;
    // Right-handed view space looks down -Z
    out.view_depth = -view_pos.z;
    out.attribute = in.attribute;
    return out;
}

// Diverging blue-grey-red ramp over the normalized attribute
fn transfer_function(attribute: f32) -> vec4<f32> {
    let range = camera.attribute_range;
    let span = max(range.y - range.x, 1e-6);
    let t = clamp((attribute - range.x) / span, 0.0, 1.0);
    let low = vec3<f32>(0.23, 0.30, 0.75);
    let mid = vec3<f32>(0.87, 0.87, 0.87);
    let high = vec3<f32>(0.71, 0.02, 0.15);
    var rgb: vec3<f32>;
    if (t < 0.5) {
        rgb = mix(low, mid, t * 2.0);
    } else {
        rgb = mix(mid, high, (t - 0.5) * 2.0);
    }
    return vec4<f32>(rgb, range.z);
}
"#;

/// Per-pixel linked-list declarations shared by clear and gather
const LINKED_LIST_BINDINGS: &str = r#"
struct FragmentNode {
    color: vec4<f32>,
    depth: f32,
    used: u32,
    next: u32,
    padding: u32,
}

struct OitParams {
    width: u32,
    height: u32,
    capacity: u32,
    entries_per_pixel: u32,
}

const SENTINEL: u32 = 0xffffffffu;
"#;

/// Clear pass: one invocation per head slot
pub const CLEAR_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> params: OitParams;
@group(0) @binding(2) var<storage, read_write> heads: array<atomic<u32>>;
@group(0) @binding(3) var<storage, read_write> counter: atomic<u32>;

@compute @workgroup_size(64)
fn cs_clear(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let index = gid.x + gid.y * groups.x * 64u;
    if (index == 0u) {
        atomicStore(&counter, 0u);
    }
    if (index < params.width * params.height) {
        atomicStore(&heads[index], SENTINEL);
    }
}
"#;

/// Gather pass: allocate a slot, swap it into the pixel head, write the node
pub const LINKED_LIST_GATHER_SHADER: &str = r#"
@group(1) @binding(0) var<uniform> params: OitParams;
@group(1) @binding(1) var<storage, read_write> fragments: array<FragmentNode>;
@group(1) @binding(2) var<storage, read_write> heads: array<atomic<u32>>;
@group(1) @binding(3) var<storage, read_write> counter: atomic<u32>;

@group(2) @binding(0) var scene_depth: texture_depth_2d;

@fragment
fn fs_gather(in: VertexOutput) {
    let pixel = vec2<u32>(in.clip_position.xy);
    if (pixel.x >= params.width || pixel.y >= params.height) {
        return;
    }

    // Storage writes may run before the fixed-function depth test, so
    // occluded fragments are rejected here explicitly.
    let opaque_depth = textureLoad(scene_depth, vec2<i32>(pixel), 0);
    if (in.clip_position.z > opaque_depth) {
        return;
    }

    let slot = atomicAdd(&counter, 1u);
    if (slot >= params.capacity) {
        return;
    }

    let next = atomicExchange(&heads[pixel.y * params.width + pixel.x], slot);
    fragments[slot] = FragmentNode(transfer_function(in.attribute), in.view_depth, 1u, next, 0u);
}
"#;

/// Baseline: fixed-function blending, result depends on draw order
pub const DUMMY_SHADER: &str = r#"
@fragment
fn fs_blend(in: VertexOutput) -> @location(0) vec4<f32> {
    return transfer_function(in.attribute);
}
"#;

/// Resolve pass. `@MAX_FRAGMENTS@` sizes the local arrays.
pub const RESOLVE_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> params: OitParams;
@group(0) @binding(1) var<storage, read> fragments: array<FragmentNode>;
@group(0) @binding(2) var<storage, read> heads: array<u32>;

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

// Depth first, then color, so equal depths never depend on list order
fn nearer(da: f32, ca: vec4<f32>, db: f32, cb: vec4<f32>) -> bool {
    if (da != db) { return da < db; }
    if (ca.r != cb.r) { return ca.r < cb.r; }
    if (ca.g != cb.g) { return ca.g < cb.g; }
    if (ca.b != cb.b) { return ca.b < cb.b; }
    return ca.a < cb.a;
}

@fragment
fn fs_resolve(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let pixel = vec2<u32>(position.xy);
    if (pixel.x >= params.width || pixel.y >= params.height) {
        discard;
    }

    var colors: array<vec4<f32>, @MAX_FRAGMENTS@>;
    var depths: array<f32, @MAX_FRAGMENTS@>;
    var count = 0u;
    var slot = heads[pixel.y * params.width + pixel.x];
    loop {
        if (slot == SENTINEL || slot >= params.capacity || count >= params.entries_per_pixel || count >= @MAX_FRAGMENTS@u) {
            break;
        }
        let node = fragments[slot];
        colors[count] = node.color;
        depths[count] = node.depth;
        count += 1u;
        slot = node.next;
    }

    if (count == 0u) {
        discard;
    }

    // Insertion sort, nearest first
    for (var i = 1u; i < count; i += 1u) {
        let color = colors[i];
        let depth = depths[i];
        var j = i;
        while (j > 0u && nearer(depth, color, depths[j - 1u], colors[j - 1u])) {
            colors[j] = colors[j - 1u];
            depths[j] = depths[j - 1u];
            j -= 1u;
        }
        colors[j] = color;
        depths[j] = depth;
    }

    // Back to front, premultiplied
    var accum = vec4<f32>(0.0);
    for (var k = count; k > 0u; k -= 1u) {
        let c = colors[k - 1u];
        let a = clamp(c.a, 0.0, 1.0);
        accum = vec4<f32>(c.rgb * a + accum.rgb * (1.0 - a), a + accum.a * (1.0 - a));
    }
    return accum;
}
"#;

pub fn clear_shader_source() -> String {
    format!("{LINKED_LIST_BINDINGS}{CLEAR_SHADER}")
}

pub fn gather_shader_source() -> String {
    format!("{COMMON_SHADER}{LINKED_LIST_BINDINGS}{LINKED_LIST_GATHER_SHADER}")
}

pub fn dummy_shader_source() -> String {
    format!("{COMMON_SHADER}{DUMMY_SHADER}")
}

/// Resolve shader with its local arrays sized for `entries_per_pixel`
pub fn resolve_shader_source(entries_per_pixel: u32) -> String {
    let body = RESOLVE_SHADER.replace(MAX_FRAGMENTS_TOKEN, &entries_per_pixel.max(1).to_string());
    format!("{LINKED_LIST_BINDINGS}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("{}", e.emit_to_string(source)),
        };
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        if let Err(e) = validator.validate(&module) {
            panic!("{}", e.emit_to_string(source));
        }
    }

    #[test]
    fn clear_shader_is_valid() {
        validate(&clear_shader_source());
    }

    #[test]
    fn gather_shader_is_valid() {
        validate(&gather_shader_source());
    }

    #[test]
    fn dummy_shader_is_valid() {
        validate(&dummy_shader_source());
    }

    #[test]
    fn resolve_shader_is_valid_for_any_entry_count() {
        for entries in [1, 8, 64] {
            let source = resolve_shader_source(entries);
            assert!(!source.contains(MAX_FRAGMENTS_TOKEN));
            validate(&source);
        }
    }
}
