//! WGSL sources for the two blarp programs.
//!
//! Both programs share the full-screen quad vertex stage. `uv` is flipped on y so that texture
//! row 0 maps to framebuffer row 0 and a readback returns rows in upload order.

pub(crate) const VERTEX_WGSL: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) in_vert: vec2<f32>) -> VsOut {
  var o: VsOut;
  o.pos = vec4<f32>(in_vert, 0.0, 1.0);
  o.uv = vec2<f32>(in_vert.x * 0.5 + 0.5, 0.5 - in_vert.y * 0.5);
  return o;
}
"#;

// 5-tap gaussian folded into 3 linear samples.
pub(crate) const BLUR_WGSL: &str = r#"
struct BlurParams {
  resolution: vec2<f32>,
  direction: vec2<f32>,
};

@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;
@group(0) @binding(2) var<uniform> params: BlurParams;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
  let off1 = vec2<f32>(1.3333333333333333) * params.direction / params.resolution;
  var color = textureSample(src_tex, src_sampler, in.uv) * 0.29411764705882354;
  color += textureSample(src_tex, src_sampler, in.uv + off1) * 0.35294117647058826;
  color += textureSample(src_tex, src_sampler, in.uv - off1) * 0.35294117647058826;
  return color;
}
"#;

pub(crate) const SHARPEN_WGSL: &str = r#"
struct SharpenParams {
  render_size: vec2<f32>,
  adjust: f32,
  _pad: f32,
};

@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;
@group(0) @binding(2) var<uniform> params: SharpenParams;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
  let dx = 1.0 / params.render_size.x;
  let dy = 1.0 / params.render_size.y;
  let a = params.adjust;

  let center = textureSample(src_tex, src_sampler, in.uv);
  let up = textureSample(src_tex, src_sampler, in.uv + vec2<f32>(0.0, -dy));
  let down = textureSample(src_tex, src_sampler, in.uv + vec2<f32>(0.0, dy));
  let left = textureSample(src_tex, src_sampler, in.uv + vec2<f32>(-dx, 0.0));
  let right = textureSample(src_tex, src_sampler, in.uv + vec2<f32>(dx, 0.0));

  return (4.0 * a + 1.0) * center - a * (up + down + left + right);
}
"#;

/// Size of both uniform blocks in bytes.
pub(crate) const UNIFORM_BYTES: u64 = 16;

pub(crate) fn program_source(fragment: &str) -> String {
    format!("{VERTEX_WGSL}\n{fragment}")
}

/// Pack four floats into a little-endian uniform block.
pub(crate) fn uniform_bytes(values: [f32; 4]) -> [u8; UNIFORM_BYTES as usize] {
    let mut out = [0u8; UNIFORM_BYTES as usize];
    for (chunk, v) in out.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out
}
