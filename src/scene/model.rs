use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use nalgebra as na;
use na::{vector, Vector2, Vector3};
use obj::raw::object::Polygon;
use obj::raw::{parse_obj, RawObj};

use crate::error::{Error, Result};

/// What the pipeline needs to know about the geometry and materials it draws.
/// Faces are triangles, `slot` is the corner in 0..3.
pub trait Mesh {
    fn nverts(&self) -> usize;
    fn nfaces(&self) -> usize;
    fn vert(&self, face: usize, slot: usize) -> Vector3<f32>;
    fn uv(&self, face: usize, slot: usize) -> Vector2<f32>;
    fn normal(&self, face: usize, slot: usize) -> Vector3<f32>;
    /// Diffuse color at texture coordinates.
    fn diffuse(&self, uv: Vector2<f32>) -> Rgb<u8>;
    /// Tangent space normal at texture coordinates.
    fn normal_map(&self, uv: Vector2<f32>) -> Vector3<f32>;
}

/// Indices of one face corner into position, texture coordinate and normal lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Corner {
    position: usize,
    uv: usize,
    normal: usize,
}

/// Triangle mesh from a Wavefront OBJ file with a diffuse texture and a tangent space normal map.
pub struct Model {
    positions: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    normals: Vec<Vector3<f32>>,
    faces: Vec<[Corner; 3]>,
    diffuse_map: RgbImage,
    normal_map: RgbImage,
}

/// Texture paths conventionally stored next to the model: `<stem>_diffuse.tga` and `<stem>_nm_tangent.tga`.
pub fn texture_paths(obj_path: &Path) -> (PathBuf, PathBuf) {
    let stem = obj_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let diffuse = obj_path.with_file_name(format!("{}_diffuse.tga", stem));
    let normal_map = obj_path.with_file_name(format!("{}_nm_tangent.tga", stem));
    return (diffuse, normal_map);
}

fn load_texture(path: &Path) -> Result<RgbImage> {
    let texture = image::open(path).map_err(|source| Error::Texture {
        path: path.to_path_buf(),
        source,
    })?;
    return Ok(texture.to_rgb8());
}

/// Nearest texel lookup. Texture v grows upwards, image rows grow downwards.
fn texel(texture: &RgbImage, uv: Vector2<f32>) -> Rgb<u8> {
    let (width, height) = texture.dimensions();
    // Casting a negative float to u32 saturates at 0, clamping the other side by hand.
    let x = ((uv.x * width as f32) as u32).min(width - 1);
    let y = (((1.0 - uv.y) * height as f32) as u32).min(height - 1);
    return *texture.get_pixel(x, y);
}

impl Model {
    /// Loads the model and its textures, found by `texture_paths`.
    pub fn load(obj_path: &Path) -> Result<Self> {
        let (diffuse_path, normal_map_path) = texture_paths(obj_path);
        return Self::load_with_textures(obj_path, &diffuse_path, &normal_map_path);
    }

    pub fn load_with_textures(obj_path: &Path, diffuse_path: &Path, normal_map_path: &Path) -> Result<Self> {
        let file = File::open(obj_path).map_err(|source| Error::Io {
            path: obj_path.to_path_buf(),
            source,
        })?;
        let diffuse_map = load_texture(diffuse_path)?;
        let normal_map = load_texture(normal_map_path)?;
        return Self::from_reader(BufReader::new(file), diffuse_map, normal_map);
    }

    /// Parses OBJ data. The parser rejects indices past the attributes defined so far, so lookups later
    /// can't go out of range.
    pub fn from_reader<R: BufRead>(reader: R, diffuse_map: RgbImage, normal_map: RgbImage) -> Result<Self> {
        check_texture("diffuse", &diffuse_map)?;
        check_texture("normal map", &normal_map)?;
        let raw: RawObj = parse_obj(reader)?;

        let positions: Vec<Vector3<f32>> = raw
            .positions
            .iter()
            .map(|&(x, y, z, _)| vector![x, y, z])
            .collect();
        let uvs: Vec<Vector2<f32>> = raw.tex_coords.iter().map(|&(u, v, _)| vector![u, v]).collect();
        let normals: Vec<Vector3<f32>> = raw.normals.iter().map(|&(x, y, z)| vector![x, y, z]).collect();

        let mut faces = Vec::<[Corner; 3]>::with_capacity(raw.polygons.len());
        for (face, polygon) in raw.polygons.iter().enumerate() {
            let corners: Vec<Corner> = match polygon {
                Polygon::PTN(corners) => corners
                    .iter()
                    .map(|&(position, uv, normal)| Corner { position, uv, normal })
                    .collect(),
                Polygon::P(_) | Polygon::PN(_) => {
                    return Err(Error::MissingAttribute { attribute: "texture coordinate" })
                }
                Polygon::PT(_) => return Err(Error::MissingAttribute { attribute: "normal" }),
            };
            if corners.len() > 3 {
                tracing::warn!("Face {} has {} corners, splitting into a fan", face, corners.len());
            }
            // Fan triangulation, a no-op for triangles and nothing at all for broken faces with < 3 corners.
            for i in 1..corners.len().saturating_sub(1) {
                faces.push([corners[0], corners[i], corners[i + 1]]);
            }
        }

        return Ok(Self {
            positions,
            uvs,
            normals,
            faces,
            diffuse_map,
            normal_map,
        });
    }
}

fn check_texture(texture: &'static str, image: &RgbImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::EmptyTexture { texture });
    }
    return Ok(());
}

impl Mesh for Model {
    fn nverts(&self) -> usize {
        return self.positions.len();
    }

    fn nfaces(&self) -> usize {
        return self.faces.len();
    }

    fn vert(&self, face: usize, slot: usize) -> Vector3<f32> {
        return self.positions[self.faces[face][slot].position];
    }

    fn uv(&self, face: usize, slot: usize) -> Vector2<f32> {
        return self.uvs[self.faces[face][slot].uv];
    }

    fn normal(&self, face: usize, slot: usize) -> Vector3<f32> {
        return self.normals[self.faces[face][slot].normal];
    }

    fn diffuse(&self, uv: Vector2<f32>) -> Rgb<u8> {
        return texel(&self.diffuse_map, uv);
    }

    fn normal_map(&self, uv: Vector2<f32>) -> Vector3<f32> {
        let color = texel(&self.normal_map, uv);
        // [0, 255] per channel to [-1, 1] per coordinate.
        return vector![color.0[0] as f32, color.0[1] as f32, color.0[2] as f32] / 255.0 * 2.0
            - vector![1.0, 1.0, 1.0];
    }
}
