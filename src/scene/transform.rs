use nalgebra as na;
use na::{matrix, Matrix4, Vector3};

use super::util::{from_hom_point, to_hom_point};

/// Everything the caller decides about a frame. Not persisted anywhere.
#[derive(Debug, Clone, Copy)]
pub struct SceneConfig {
    pub eye: Vector3<f32>,
    pub center: Vector3<f32>,
    pub up: Vector3<f32>,
    pub light_direction: Vector3<f32>, // Direction towards the light, in world space.
    pub width: u32,
    pub height: u32,
}

/// Camera transform placing `eye` at the origin and looking down -z towards `center`.
///
/// `up` only picks the roll and must not be parallel to `eye - center`, otherwise the basis
/// degenerates and the matrix is garbage.
pub fn lookat(eye: Vector3<f32>, center: Vector3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    // New coordinate system x, y, z around camera position.
    let new_z = (eye - center).normalize();
    let new_x = up.cross(&new_z).normalize();
    let new_y = new_z.cross(&new_x);
    let rotation = matrix![new_x.x, new_x.y, new_x.z, 0.0;
                           new_y.x, new_y.y, new_y.z, 0.0;
                           new_z.x, new_z.y, new_z.z, 0.0;
                           0.0,     0.0,     0.0,     1.0];
    let translation = matrix![1.0, 0.0, 0.0, -eye.x;
                              0.0, 1.0, 0.0, -eye.y;
                              0.0, 0.0, 1.0, -eye.z;
                              0.0, 0.0, 0.0, 1.0];
    return rotation * translation;
}

/// Simple perspective: identity with `coeff` in the bottom row, so w depends on z.
/// `coeff` is conventionally -1 / distance(eye, center).
pub fn projection(coeff: f32) -> Matrix4<f32> {
    return matrix![1.0, 0.0, 0.0,   0.0;
                   0.0, 1.0, 0.0,   0.0;
                   0.0, 0.0, 1.0,   0.0;
                   0.0, 0.0, coeff, 1.0];
}

/// Maps the [-1, 1] cube to the pixel box at (x, y) of size (w, h).
/// Depth goes to [0, 255], the unit the z-buffer compares in.
pub fn viewport(x: f32, y: f32, w: f32, h: f32) -> Matrix4<f32> {
    let d = 255.0;
    return matrix![w / 2.0, 0.0,     0.0,     x + w / 2.0;
                   0.0,     h / 2.0, 0.0,     y + h / 2.0;
                   0.0,     0.0,     d / 2.0, d / 2.0;
                   0.0,     0.0,     0.0,     1.0];
}

/// The three transforms of a frame, computed once before any face is processed and only read after.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub viewport: Matrix4<f32>,
}

impl FrameContext {
    pub fn new(config: &SceneConfig) -> Self {
        // Leaving a margin of 1/8 of the frame on every side.
        let viewport_matrix = viewport(
            (config.width / 8) as f32,
            (config.height / 8) as f32,
            (config.width * 3 / 4) as f32,
            (config.height * 3 / 4) as f32,
        );
        return Self {
            model_view: lookat(config.eye, config.center, config.up),
            projection: projection(-1.0 / (config.eye - config.center).norm()),
            viewport: viewport_matrix,
        };
    }

    /// Model to clip space.
    pub fn transform(&self) -> Matrix4<f32> {
        return self.projection * self.model_view;
    }

    /// Model space point to (x, y) in pixels and z in depth-buffer units.
    pub fn to_screen(&self, point: Vector3<f32>) -> Vector3<f32> {
        return from_hom_point(self.viewport * self.transform() * to_hom_point(point));
    }
}
