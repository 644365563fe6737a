use image::Rgb;
use nalgebra as na;
use na::{Matrix4, Vector3, Vector4};

/// Lifts a 3-vector into homogeneous space, using `fill` as the 4th component.
pub fn embed(v: Vector3<f32>, fill: f32) -> Vector4<f32> {
    return Vector4::new(v.x, v.y, v.z, fill);
}

/// Drops the 4th component of a homogeneous vector, no division involved.
pub fn proj(v: Vector4<f32>) -> Vector3<f32> {
    return v.xyz();
}

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return embed(v, 1.0);
}

/// Transformation of a vector (direction) to homogenous coordinates.
pub fn to_hom_vector(v: Vector3<f32>) -> Vector4<f32> {
    return embed(v, 0.0);
}

/// Transformation of a point from homogenous coordinates, doing the perspective divide.
pub fn from_hom_point(v: Vector4<f32>) -> Vector3<f32> {
    return proj(v / v.w);
}

/// Matrix to apply to normals when positions are transformed by `m`.
/// None if `m` is singular.
pub fn invert_transpose(m: Matrix4<f32>) -> Option<Matrix4<f32>> {
    return m.try_inverse().map(|inverse| inverse.transpose());
}

/// Convex combination of two colors: t * c_1 + (1 - t) * c_2.
/// t is unrestricted, channels are rounded and saturate at 0 and 255.
pub fn color_blend(color_1: Rgb<u8>, color_2: Rgb<u8>, t: f32) -> Rgb<u8> {
    let mut blended = Rgb([0, 0, 0]);
    for i in 0..3 {
        let value = t * color_1.0[i] as f32 + (1.0 - t) * color_2.0[i] as f32;
        blended.0[i] = value.round().clamp(0.0, 255.0) as u8;
    }
    return blended;
}
