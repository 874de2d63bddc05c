//! Orthographic projection of the pixel viewport.

use super::context::ApiVersion;

/// Minimal logical depth of the engine geometry.
pub const MIN_DEPTH: f32 = -20000.0;
/// Maximal logical depth of the engine geometry.
pub const MAX_DEPTH: f32 = 20000.0;

/// Builds a column-major orthographic projection matrix.
///
/// X maps linearly from `[left, right]` to `[-1, 1]`, Y from `[bottom, top]` to
/// `[-1, 1]`, and the logical depth `[MIN_DEPTH, MAX_DEPTH]` to `[-1, 1]`, or to
/// `[0, 1]` for APIs using unsigned depth.
///
/// Requires `left != right` and `bottom != top`.
pub fn make_projection(api: ApiVersion, left: f32, right: f32, bottom: f32, top: f32) -> [f32; 16] {
    let (depth_scale, depth_offset) = if api.uses_unsigned_depth() {
        (0.5, 0.5)
    } else {
        (1.0, 0.0)
    };

    let width = right - left;
    let height = top - bottom;
    let depth = MAX_DEPTH - MIN_DEPTH;

    let mut m = [0.0; 16];
    m[0] = 2.0 / width;
    m[5] = 2.0 / height;
    m[10] = 2.0 * depth_scale / depth;
    m[12] = -(right + left) / width;
    m[13] = -(top + bottom) / height;
    m[14] = depth_offset - depth_scale * (MAX_DEPTH + MIN_DEPTH) / depth;
    m[15] = 1.0;
    m
}

/// Applies a column-major matrix to a point, assuming `w = 1`.
pub fn transform_point(m: &[f32; 16], p: [f32; 3]) -> [f32; 3] {
    let mut result = [0.0; 3];
    for (row, r) in result.iter_mut().enumerate() {
        *r = m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row];
    }
    result
}
