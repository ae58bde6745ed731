//! Shared constants for the attachment pipeline.

/// Bytes per slot in a batch results buffer: 3 packed 32-bit floats,
/// no padding, no alignment gap between slots. This layout is part of
/// the external contract and is mirrored by the resolve shader, which
/// writes through a flat `array<f32>` for exactly this reason.
pub const TRANSFORM_RESULT_STRIDE: u64 = 3 * std::mem::size_of::<f32>() as u64;

/// Workgroup width of the resolve compute shader.
pub const RESOLVE_WORKGROUP_SIZE: u32 = 64;

/// Squared-length threshold below which a triangle edge or cross product
/// is treated as degenerate. Shared between the CPU resolver and the
/// WGSL shader so both paths skip the same triangles.
pub const DEGENERATE_TRIANGLE_EPSILON: f32 = 1e-12;
