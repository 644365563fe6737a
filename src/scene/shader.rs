use image::Rgb;
use nalgebra as na;
use na::{Matrix2x3, Matrix3, Matrix4, Matrix4x3, Vector3, Vector4};

use super::model::Mesh;
use super::transform::FrameContext;
use super::util::{color_blend, from_hom_point, invert_transpose, proj, to_hom_point, to_hom_vector};
use crate::error::{Error, Result};

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Programmable part of the pipeline.
///
/// For every face `vertex` is called for slots 0, 1, 2 with a fresh `Varying`, after which the
/// rasterizer calls `fragment` with that same `Varying` for every pixel the triangle covers.
pub trait Shader {
    /// Values passed from the vertex stage of a triangle to its fragments.
    type Varying: Default;

    /// Returns the clip space position of corner `slot` of `face`.
    fn vertex(&self, face: usize, slot: usize, varying: &mut Self::Varying) -> Vector4<f32>;

    /// Color of a fragment at barycentric coordinates `bar`, None to discard it.
    fn fragment(&self, varying: &Self::Varying, bar: Vector3<f32>) -> Option<Rgb<u8>>;
}

/// Per-triangle values of `DarbouxShader`, one column per triangle corner.
#[derive(Debug, Default, Clone)]
pub struct Varying {
    pub uv: Matrix2x3<f32>,
    pub tri: Matrix4x3<f32>,  // Clip coordinates.
    pub nrm: Matrix3<f32>,    // Normals, already transformed by the normal matrix.
    pub ndc_tri: Matrix3<f32>, // Normalized device coordinates.
}

/// Diffuse lighting with a tangent space normal map.
///
/// Tangents aren't stored with the mesh, the local Darboux basis is built per fragment from the
/// triangle edges and how uv changes along them.
pub struct DarbouxShader<'a, M: Mesh> {
    mesh: &'a M,
    uniform_m: Matrix4<f32>,      // Projection * ModelView.
    uniform_mit: Matrix4<f32>,    // Its inverse transpose, applied to normals.
    light_direction: Vector3<f32>, // In the same space as transformed normals.
}

impl<'a, M: Mesh> DarbouxShader<'a, M> {
    pub fn new(mesh: &'a M, context: &FrameContext, light_direction: Vector3<f32>) -> Result<Self> {
        let uniform_m = context.transform();
        // A degenerate camera basis shows up as NaNs rather than a zero determinant.
        let uniform_mit = invert_transpose(uniform_m)
            .filter(|mit| mit.iter().all(|x| x.is_finite()))
            .ok_or(Error::SingularTransform)?;
        let light_direction = proj(uniform_m * to_hom_vector(light_direction)).normalize();
        return Ok(Self {
            mesh,
            uniform_m,
            uniform_mit,
            light_direction,
        });
    }

    pub fn light_direction(&self) -> Vector3<f32> {
        return self.light_direction;
    }
}

impl<'a, M: Mesh> Shader for DarbouxShader<'a, M> {
    type Varying = Varying;

    fn vertex(&self, face: usize, slot: usize, varying: &mut Varying) -> Vector4<f32> {
        varying.uv.set_column(slot, &self.mesh.uv(face, slot));
        let normal = proj(self.uniform_mit * to_hom_vector(self.mesh.normal(face, slot)));
        varying.nrm.set_column(slot, &normal);
        let gl_vertex = self.uniform_m * to_hom_point(self.mesh.vert(face, slot));
        varying.tri.set_column(slot, &gl_vertex);
        varying.ndc_tri.set_column(slot, &from_hom_point(gl_vertex));
        return gl_vertex;
    }

    fn fragment(&self, varying: &Varying, bar: Vector3<f32>) -> Option<Rgb<u8>> {
        let bn = (varying.nrm * bar).normalize();
        let uv = varying.uv * bar;

        // Rows are two triangle edges and the normal. Solving against it gives the directions in which
        // u and v grow, which are the tangent and bitangent of the local basis.
        let edge_1 = varying.ndc_tri.column(1) - varying.ndc_tri.column(0);
        let edge_2 = varying.ndc_tri.column(2) - varying.ndc_tri.column(0);
        let a = Matrix3::from_rows(&[edge_1.transpose(), edge_2.transpose(), bn.transpose()]);
        // Singular for triangles collapsed to a line on screen.
        let ai = a.try_inverse()?;

        let i = ai * Vector3::new(varying.uv[(0, 1)] - varying.uv[(0, 0)], varying.uv[(0, 2)] - varying.uv[(0, 0)], 0.0);
        let j = ai * Vector3::new(varying.uv[(1, 1)] - varying.uv[(1, 0)], varying.uv[(1, 2)] - varying.uv[(1, 0)], 0.0);
        // Zero when uv doesn't change over the triangle.
        let b = Matrix3::from_columns(&[i.try_normalize(f32::EPSILON)?, j.try_normalize(f32::EPSILON)?, bn]);

        let n = (b * self.mesh.normal_map(uv)).normalize();
        let diff_coef = n.dot(&self.light_direction).max(0.0);
        return Some(color_blend(self.mesh.diffuse(uv), BLACK, diff_coef));
    }
}
