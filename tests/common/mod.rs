// tests/common/mod.rs: shared helpers for the GPU integration tests.
//
// GPU tests are #[ignore]d by default; run them on a machine with a render
// node via `cargo test -- --ignored`. Set GLKOMPUTE_DEVICE to pick a node
// other than /dev/dri/renderD128.

#![allow(dead_code)]

use glkompute::Device;

pub const DEFAULT_NODE: &str = "/dev/dri/renderD128";

pub fn node() -> String {
    std::env::var("GLKOMPUTE_DEVICE").unwrap_or_else(|_| DEFAULT_NODE.to_string())
}

pub fn open_device() -> Device {
    let node = node();
    Device::open(&node).unwrap_or_else(|e| panic!("cannot open {node}: {e}"))
}

/// Copies slot 0 into slot 1, element by element.
pub const COPY_KERNEL: &str = r#"#version 430
layout(local_size_x = 64) in;
layout(std430, binding = 0) readonly buffer Input { int src[]; };
layout(std430, binding = 1) writeonly buffer Output { int dst[]; };
uniform int count;

void main() {
    uint i = gl_GlobalInvocationID.x;
    if (i < uint(count)) {
        dst[i] = src[i];
    }
}
"#;

/// Increments a single counter in slot 0 once per dispatch.
pub const COUNTER_KERNEL: &str = r#"#version 430
layout(local_size_x = 1) in;
layout(std430, binding = 0) buffer Counter { uint value; };

void main() {
    value += 1u;
}
"#;

/// out[i] = in[i] * scale + offset.xy summed, exercising scalar and vector uniforms.
pub const AFFINE_KERNEL: &str = r#"#version 430
layout(local_size_x = 64) in;
layout(std430, binding = 0) readonly buffer Input { float src[]; };
layout(std430, binding = 1) writeonly buffer Output { float dst[]; };
uniform float scale;
uniform vec2 offset;
uniform ivec3 dims;

void main() {
    uint i = gl_GlobalInvocationID.x;
    if (i < uint(dims.x)) {
        dst[i] = src[i] * scale + offset.x + offset.y;
    }
}
"#;
