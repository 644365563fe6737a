//! Errors reported by the renderer.
//!
//! Everything here happens before the first triangle is drawn: loading the mesh and its textures,
//! or validating the scene setup. The pipeline itself never fails, degenerate geometry just produces
//! no pixels.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model: {0}")]
    Obj(#[from] obj::ObjError),

    #[error("failed to load texture {path}: {source}")]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Faces must carry position, uv and normal indices (`f v/vt/vn`).
    #[error("model faces have no {attribute} indices")]
    MissingAttribute { attribute: &'static str },

    /// A texture without pixels has nothing to sample.
    #[error("{texture} texture is empty")]
    EmptyTexture { texture: &'static str },

    /// Projection * ModelView can't be inverted, so normals have nowhere to go.
    /// Usually means `up` is parallel to the viewing direction or `eye == center`.
    #[error("camera transform is singular, check eye, center and up")]
    SingularTransform,

    #[error("invalid frame size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
