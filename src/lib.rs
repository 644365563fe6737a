//! Software rasterizer drawing a textured, normal mapped mesh into a color buffer.
//!
//! The pipeline runs entirely on the CPU: faces go through the vertex stage of a [`Shader`], get
//! scan-converted against a z-buffer by [`Scene::draw_triangle`], and every covered pixel is colored
//! by the fragment stage. [`render`] wires this up for a [`Mesh`] and a [`SceneConfig`].

pub mod app;
pub mod error;
pub mod scene;

pub use error::{Error, Result};
pub use scene::model::{Mesh, Model};
pub use scene::shader::{DarbouxShader, Shader, Varying};
pub use scene::transform::{FrameContext, SceneConfig};
pub use scene::{render, Scene};
