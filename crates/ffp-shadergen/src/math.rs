//! Column-major 4x4 helpers for per-draw constant updates.

use crate::host::Mat4;

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Maps clip space [-1, 1] to texture space [0, 1] with a flipped v axis.
pub const CLIP_SPACE_TO_IMAGE_SPACE: Mat4 = [
    [0.5, 0.0, 0.0, 0.0],
    [0.0, -0.5, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.5, 0.5, 0.0, 1.0],
];

pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, value) in out_col.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    out
}

pub fn transform_direction(m: &Mat4, d: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * d[0] + m[1][row] * d[1] + m[2][row] * d[2];
    }
    out
}

pub fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

pub fn is_identity(m: &Mat4) -> bool {
    m == &IDENTITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_moves_points_but_not_directions() {
        let mut m = IDENTITY;
        m[3] = [1.0, 2.0, 3.0, 1.0];
        assert_eq!(transform_point(&m, [0.0, 0.0, 0.0]), [1.0, 2.0, 3.0]);
        assert_eq!(transform_direction(&m, [0.0, 0.0, 1.0]), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn multiplying_by_identity_is_a_no_op() {
        assert_eq!(mul(&IDENTITY, &CLIP_SPACE_TO_IMAGE_SPACE), CLIP_SPACE_TO_IMAGE_SPACE);
        assert_eq!(mul(&CLIP_SPACE_TO_IMAGE_SPACE, &IDENTITY), CLIP_SPACE_TO_IMAGE_SPACE);
    }
}
