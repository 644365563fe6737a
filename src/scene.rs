pub mod model;
pub mod shader;
pub mod transform;
pub mod util;

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use nalgebra as na;
use na::{Matrix4, Matrix4x3, Vector2, Vector3};

use crate::error::{Error, Result};
use model::Mesh;
use shader::{DarbouxShader, Shader};
use transform::{FrameContext, SceneConfig};

/// Triangles with less than this much area on screen (in pixels, doubled) are skipped.
const DEGENERATE_AREA: f32 = 1e-2;

/// Color buffer with its z-buffer.
/// (0, 0) is the bottom left pixel.
pub struct Scene {
    pub width: u32,
    pub height: u32,
    z_buffer: Vec<f32>, // Largest depth drawn so far per pixel, larger is closer to the camera.
    frame: RgbImage,    // Rows stored bottom up, flipped on export.
}

/// Pixel range a triangle can touch, inclusive on both ends.
#[derive(Debug)]
struct BoundingBox {
    ll: Vector2<u32>, // lower left corner
    ur: Vector2<u32>, // upper right corner
}

impl Scene {
    /// Black frame of the given size with nothing drawn yet.
    pub fn new(width: u32, height: u32) -> Scene {
        let n_pixels = (width * height) as usize;
        return Scene {
            width,
            height,
            z_buffer: vec![f32::NEG_INFINITY; n_pixels],
            frame: RgbImage::new(width, height),
        };
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        return *self.frame.get_pixel(x, y);
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        return self.z_buffer[(x + y * self.width) as usize];
    }

    /// Color buffer with (0, 0) moved to the top left, the way image files and windows expect it.
    pub fn into_image(self) -> RgbImage {
        let mut frame = self.frame;
        imageops::flip_vertical_in_place(&mut frame);
        return frame;
    }

    /// Image, representing z-buffer values, oriented like `into_image`.
    /// Drawn depths are stretched over [1, 255], nearest brightest. Pixels nothing was drawn to stay black.
    pub fn depth_image(&self) -> GrayImage {
        let drawn = self.z_buffer.iter().filter(|z| z.is_finite());
        let z_max = drawn.clone().fold(f32::MIN, |max_value, &value| value.max(max_value));
        let z_min = drawn.fold(f32::MAX, |min_value, &value| value.min(min_value));
        let scale = z_max - z_min;
        let mut depth = GrayImage::from_fn(self.width, self.height, |x, y| {
            let z = self.depth(x, y);
            if !z.is_finite() {
                return Luma([0]);
            }
            if scale <= 0.0 {
                return Luma([255]);
            }
            return Luma([(1.0 + (z - z_min) / scale * 254.0).round() as u8]);
        });
        imageops::flip_vertical_in_place(&mut depth);
        return depth;
    }

    /// Bounding box of screen points, clamped to the frame. None if nothing of it is on screen.
    fn bounding_box(&self, points: &[Vector3<f32>; 3]) -> Option<BoundingBox> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let min_x = points[0].x.min(points[1].x).min(points[2].x);
        let min_y = points[0].y.min(points[1].y).min(points[2].y);
        let max_x = points[0].x.max(points[1].x).max(points[2].x);
        let max_y = points[0].y.max(points[1].y).max(points[2].y);
        // Zero area box, or one flattened to a line.
        if !(max_x > min_x && max_y > min_y) {
            return None;
        }
        let ll_x = min_x.floor().max(0.0);
        let ll_y = min_y.floor().max(0.0);
        let ur_x = max_x.ceil().min((self.width - 1) as f32);
        let ur_y = max_y.ceil().min((self.height - 1) as f32);
        if ll_x > ur_x || ll_y > ur_y {
            return None;
        }
        return Some(BoundingBox {
            ll: Vector2::new(ll_x as u32, ll_y as u32),
            ur: Vector2::new(ur_x as u32, ur_y as u32),
        });
    }

    /// Draws a triangle given in clip coordinates, one vertex per column.
    ///
    /// Pixels whose centre lies inside the triangle and passes the depth test get the color from
    /// `shader.fragment`, unless it discards them. Returns the number of pixels written.
    pub fn draw_triangle<S: Shader>(
        &mut self,
        viewport: &Matrix4<f32>,
        clip: &Matrix4x3<f32>,
        shader: &S,
        varying: &S::Varying,
    ) -> usize {
        let screen = viewport * clip;
        // x, y in pixels and z in depth-buffer units per vertex, plus w for perspective correction.
        let mut points = [Vector3::zeros(); 3];
        let mut w = Vector3::zeros();
        for i in 0..3 {
            w[i] = screen[(3, i)];
            points[i] = Vector3::new(screen[(0, i)], screen[(1, i)], screen[(2, i)]) / w[i];
        }

        let bbox = match self.bounding_box(&points) {
            Some(bbox) => bbox,
            None => return 0,
        };
        let (a, b, c) = (points[0], points[1], points[2]);
        // Twice the signed area, doesn't depend on the pixel so checking it once.
        // Not finite when a vertex has w = 0, NaN weights would pass every inside test.
        let area = (c.x - a.x) * (b.y - a.y) - (b.x - a.x) * (c.y - a.y);
        if !area.is_finite() || area.abs() < DEGENERATE_AREA {
            return 0;
        }
        let depths = Vector3::new(a.z, b.z, c.z);

        let mut written = 0;
        for i in bbox.ll.x..=bbox.ur.x {
            for j in bbox.ll.y..=bbox.ur.y {
                let p = Vector2::new(i as f32 + 0.5, j as f32 + 0.5);
                let bar_screen = barycentric(&a, &b, &c, area, &p);
                if bar_screen.x < 0.0 || bar_screen.y < 0.0 || bar_screen.z < 0.0 {
                    // If any of the coordinates are negative, point is not in the triangle, so skipping it.
                    continue;
                }
                let z_value = bar_screen.dot(&depths);
                let index = (i + j * self.width) as usize;
                if z_value < self.z_buffer[index] {
                    continue;
                }
                // Undoing the perspective distortion before handing weights to the shader.
                let bar_clip = bar_screen.component_div(&w);
                let bar_clip = bar_clip / bar_clip.sum();
                if let Some(color) = shader.fragment(varying, bar_clip) {
                    self.z_buffer[index] = z_value;
                    self.frame.put_pixel(i, j, color);
                    written += 1;
                }
            }
        }
        return written;
    }

    /// Runs the shader over faces 0..nfaces, one triangle at a time.
    pub fn draw_faces<S: Shader>(&mut self, viewport: &Matrix4<f32>, shader: &S, nfaces: usize) -> usize {
        let mut written = 0;
        for face in 0..nfaces {
            let mut varying = S::Varying::default();
            let mut clip = Matrix4x3::zeros();
            for slot in 0..3 {
                clip.set_column(slot, &shader.vertex(face, slot, &mut varying));
            }
            written += self.draw_triangle(viewport, &clip, shader, &varying);
        }
        return written;
    }
}

/// Barycentric coordinates of `p` with respect to triangle abc with doubled signed area `area`.
fn barycentric(a: &Vector3<f32>, b: &Vector3<f32>, c: &Vector3<f32>, area: f32, p: &Vector2<f32>) -> Vector3<f32> {
    let raw_cross = Vector3::new(c.x - a.x, b.x - a.x, a.x - p.x)
        .cross(&Vector3::new(c.y - a.y, b.y - a.y, a.y - p.y));
    // raw_cross.z is the area, passed in to keep it identical for every pixel.
    return Vector3::new(1.0 - (raw_cross.x + raw_cross.y) / area, raw_cross.y / area, raw_cross.x / area);
}

/// Renders every face of `mesh` as seen from `config`, with the normal mapped diffuse shader.
pub fn render<M: Mesh>(mesh: &M, config: &SceneConfig) -> Result<Scene> {
    if config.width == 0 || config.height == 0 {
        return Err(Error::InvalidDimensions {
            width: config.width,
            height: config.height,
        });
    }
    let context = FrameContext::new(config);
    let shader = DarbouxShader::new(mesh, &context, config.light_direction)?;
    let mut scene = Scene::new(config.width, config.height);

    tracing::debug!("Rendering {} triangles...", mesh.nfaces());
    let written = scene.draw_faces(&context.viewport, &shader, mesh.nfaces());
    tracing::debug!("{} pixels written", written);

    return Ok(scene);
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::vector;
    use std::collections::BTreeSet;

    /// Triangle given straight in screen coordinates, painted with one color.
    struct Solid {
        corners: [Vector3<f32>; 3],
        color: Rgb<u8>,
        discard: bool,
    }

    impl Shader for Solid {
        type Varying = ();

        fn vertex(&self, _face: usize, slot: usize, _varying: &mut ()) -> na::Vector4<f32> {
            let corner = self.corners[slot];
            return vector![corner.x, corner.y, corner.z, 1.0];
        }

        fn fragment(&self, _varying: &(), _bar: Vector3<f32>) -> Option<Rgb<u8>> {
            if self.discard {
                return None;
            }
            return Some(self.color);
        }
    }

    fn solid(corners: [Vector3<f32>; 3], color: Rgb<u8>) -> Solid {
        return Solid { corners, color, discard: false };
    }

    fn covered(scene: &Scene) -> BTreeSet<(u32, u32)> {
        let mut pixels = BTreeSet::new();
        for x in 0..scene.width {
            for y in 0..scene.height {
                if scene.depth(x, y).is_finite() {
                    pixels.insert((x, y));
                }
            }
        }
        return pixels;
    }

    #[test]
    fn fresh_scene_is_black_and_infinitely_far() {
        let scene = Scene::new(4, 3);
        assert_eq!(scene.pixel(3, 2), Rgb([0, 0, 0]));
        assert_eq!(scene.depth(0, 0), f32::NEG_INFINITY);
        assert_eq!(scene.into_image().dimensions(), (4, 3));
    }

    #[test]
    fn fills_pixels_inside_only() {
        let mut scene = Scene::new(20, 20);
        let triangle = solid(
            [vector![2.0, 2.0, 10.0], vector![18.0, 2.0, 10.0], vector![2.0, 18.0, 10.0]],
            Rgb([255, 0, 0]),
        );
        let written = scene.draw_faces(&Matrix4::identity(), &triangle, 1);
        assert!(written > 0);
        assert_eq!(covered(&scene).len(), written);
        assert_eq!(scene.pixel(3, 3), Rgb([255, 0, 0]));
        approx::assert_relative_eq!(scene.depth(3, 3), 10.0, epsilon = 1e-4);
        // Beyond the hypotenuse and outside the box.
        assert_eq!(scene.pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(scene.pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(scene.pixel(19, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn membership_does_not_depend_on_vertex_order() {
        let a = vector![3.3, 4.1, 0.0];
        let b = vector![27.6, 9.7, 0.0];
        let c = vector![11.2, 25.4, 0.0];
        let orders = [[a, b, c], [b, c, a], [c, a, b], [a, c, b], [c, b, a], [b, a, c]];

        let mut reference = None;
        for corners in orders {
            let mut scene = Scene::new(32, 32);
            scene.draw_faces(&Matrix4::identity(), &solid(corners, Rgb([1, 2, 3])), 1);
            let pixels = covered(&scene);
            assert!(!pixels.is_empty());
            match &reference {
                None => reference = Some(pixels),
                Some(expected) => assert_eq!(&pixels, expected),
            }
        }
    }

    #[test]
    fn zero_area_triangles_draw_nothing() {
        let mut scene = Scene::new(10, 10);
        let point = vector![5.0, 5.0, 1.0];
        assert_eq!(scene.draw_faces(&Matrix4::identity(), &solid([point; 3], Rgb([9, 9, 9])), 1), 0);
        let line = [vector![1.0, 1.0, 1.0], vector![5.0, 5.0, 1.0], vector![9.0, 9.0, 1.0]];
        assert_eq!(scene.draw_faces(&Matrix4::identity(), &solid(line, Rgb([9, 9, 9])), 1), 0);
        assert!(covered(&scene).is_empty());
    }

    #[test]
    fn vertex_at_infinity_draws_nothing() {
        let mut scene = Scene::new(10, 10);
        let clip = Matrix4x3::from_columns(&[
            vector![1.0, 1.0, 0.0, 1.0],
            vector![10.0, 0.0, 0.0, 0.0],
            vector![1.0, 9.0, 0.0, 1.0],
        ]);
        let triangle = solid([Vector3::zeros(); 3], Rgb([5, 5, 5]));
        assert_eq!(scene.draw_triangle(&Matrix4::identity(), &clip, &triangle, &()), 0);
        assert!(covered(&scene).is_empty());
        assert!(scene.z_buffer.iter().all(|depth| !depth.is_nan()));
    }

    #[test]
    fn empty_scene_accepts_triangles() {
        let mut scene = Scene::new(0, 0);
        let triangle = solid([vector![0.0, 0.0, 1.0], vector![4.0, 0.0, 1.0], vector![0.0, 4.0, 1.0]], Rgb([5, 5, 5]));
        assert_eq!(scene.draw_faces(&Matrix4::identity(), &triangle, 1), 0);
    }

    #[test]
    fn offscreen_parts_are_clipped() {
        let mut scene = Scene::new(10, 10);
        let big = [vector![-50.0, -50.0, 1.0], vector![150.0, -50.0, 1.0], vector![-50.0, 150.0, 1.0]];
        let written = scene.draw_faces(&Matrix4::identity(), &solid(big, Rgb([7, 7, 7])), 1);
        assert_eq!(written, 100);
        let away = [vector![-50.0, -50.0, 1.0], vector![-40.0, -50.0, 1.0], vector![-50.0, -40.0, 1.0]];
        assert_eq!(scene.draw_faces(&Matrix4::identity(), &solid(away, Rgb([7, 7, 7])), 1), 0);
    }

    #[test]
    fn nearer_triangle_wins_in_any_order() {
        let far = solid([vector![0.0, 0.0, 10.0], vector![16.0, 0.0, 10.0], vector![0.0, 16.0, 10.0]], Rgb([0, 0, 255]));
        let near = solid([vector![4.0, 4.0, 20.0], vector![16.0, 4.0, 20.0], vector![4.0, 16.0, 20.0]], Rgb([255, 0, 0]));

        let mut far_first = Scene::new(16, 16);
        far_first.draw_faces(&Matrix4::identity(), &far, 1);
        far_first.draw_faces(&Matrix4::identity(), &near, 1);
        let mut near_first = Scene::new(16, 16);
        near_first.draw_faces(&Matrix4::identity(), &near, 1);
        near_first.draw_faces(&Matrix4::identity(), &far, 1);

        assert_eq!(far_first.pixel(5, 5), Rgb([255, 0, 0]));
        assert_eq!(far_first.pixel(1, 1), Rgb([0, 0, 255]));
        assert_eq!(far_first.into_image(), near_first.into_image());
    }

    #[test]
    fn discarded_fragments_leave_no_trace() {
        let mut scene = Scene::new(10, 10);
        let mut triangle = solid([vector![0.0, 0.0, 5.0], vector![10.0, 0.0, 5.0], vector![0.0, 10.0, 5.0]], Rgb([1, 1, 1]));
        triangle.discard = true;
        assert_eq!(scene.draw_faces(&Matrix4::identity(), &triangle, 1), 0);
        assert!(covered(&scene).is_empty());
        assert_eq!(scene.pixel(1, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn perspective_weights_favour_the_near_vertex() {
        struct LastWeights(std::cell::Cell<Vector3<f32>>);
        impl Shader for LastWeights {
            type Varying = ();
            fn vertex(&self, _face: usize, _slot: usize, _varying: &mut ()) -> na::Vector4<f32> {
                unreachable!()
            }
            fn fragment(&self, _varying: &(), bar: Vector3<f32>) -> Option<Rgb<u8>> {
                self.0.set(bar);
                return Some(Rgb([1, 1, 1]));
            }
        }

        // Screen triangle (0, 0), (40, 0), (0, 40) covering the whole frame, first vertex with w = 1 and
        // the others with w = 3.
        let clip = Matrix4x3::from_columns(&[
            vector![0.0, 0.0, 0.0, 1.0],
            vector![120.0, 0.0, 0.0, 3.0],
            vector![0.0, 120.0, 0.0, 3.0],
        ]);
        let last_weights = LastWeights(std::cell::Cell::new(Vector3::zeros()));
        let mut scene = Scene::new(10, 10);
        assert_eq!(scene.draw_triangle(&Matrix4::identity(), &clip, &last_weights, &()), 100);

        // Last fragment is pixel (9, 9), where screen weights are (0.525, 0.2375, 0.2375).
        let bar = last_weights.0.get();
        approx::assert_relative_eq!(bar, vector![0.768293, 0.115854, 0.115854], epsilon = 1e-4);
    }

    #[test]
    fn depth_image_is_flipped_and_black_where_empty() {
        let mut scene = Scene::new(4, 4);
        let corner = solid([vector![0.0, 0.0, 100.0], vector![2.0, 0.0, 100.0], vector![0.0, 2.0, 100.0]], Rgb([1, 1, 1]));
        scene.draw_faces(&Matrix4::identity(), &corner, 1);
        let depth = scene.depth_image();
        // Bottom left pixel of the scene is the last row of the image.
        assert_ne!(depth.get_pixel(0, 3), &Luma([0]));
        assert_eq!(depth.get_pixel(3, 0), &Luma([0]));
    }

    #[test]
    fn depth_image_stretches_range() {
        let mut scene = Scene::new(8, 8);
        let far = solid([vector![0.0, 0.0, -40.0], vector![8.0, 0.0, -40.0], vector![0.0, 8.0, -40.0]], Rgb([1, 1, 1]));
        let near = solid([vector![8.0, 8.0, 60.0], vector![0.0, 8.0, 60.0], vector![8.0, 0.0, 60.0]], Rgb([1, 1, 1]));
        scene.draw_faces(&Matrix4::identity(), &far, 1);
        scene.draw_faces(&Matrix4::identity(), &near, 1);
        let depth = scene.depth_image();
        // Scene (0, 0) is far, scene (7, 7) is near.
        assert_eq!(depth.get_pixel(0, 7), &Luma([1]));
        assert_eq!(depth.get_pixel(7, 0), &Luma([255]));
    }
}
