use std::error::Error;
use std::path::PathBuf;
use std::time;

use anyhow::Context;
use image::RgbImage;
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use crate::scene::model::{texture_paths, Mesh, Model};
use crate::scene::render;
use crate::scene::transform::SceneConfig;

/// Everything needed for one run of the renderer.
pub struct Params {
    pub model: PathBuf,
    pub diffuse: Option<PathBuf>,    // Defaults to <model stem>_diffuse.tga.
    pub normal_map: Option<PathBuf>, // Defaults to <model stem>_nm_tangent.tga.
    pub output: PathBuf,
    pub depth_output: Option<PathBuf>,
    pub scene: SceneConfig,
    pub show: bool,
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }
    return false;
}

/// Loads the model, renders it and writes the results to disk. Returns the rendered image.
pub fn render_to_files(params: &Params) -> anyhow::Result<RgbImage> {
    let (default_diffuse, default_normal_map) = texture_paths(&params.model);
    let diffuse = params.diffuse.clone().unwrap_or(default_diffuse);
    let normal_map = params.normal_map.clone().unwrap_or(default_normal_map);
    let model = Model::load_with_textures(&params.model, &diffuse, &normal_map)
        .with_context(|| format!("can't load {}", params.model.display()))?;
    tracing::info!("Number of vertices - {}", model.nverts());
    tracing::info!("Number of faces    - {}", model.nfaces());

    let time_begin = time::Instant::now();
    let scene = render(&model, &params.scene)?;
    tracing::info!(
        "Rendered {}x{} in {:.1} ms",
        scene.width,
        scene.height,
        time_begin.elapsed().as_secs_f32() * 1000.0
    );

    if let Some(depth_output) = &params.depth_output {
        scene
            .depth_image()
            .save(depth_output)
            .with_context(|| format!("can't write {}", depth_output.display()))?;
        tracing::info!("Depth written to {}", depth_output.display());
    }
    let image = scene.into_image();
    image
        .save(&params.output)
        .with_context(|| format!("can't write {}", params.output.display()))?;
    tracing::info!("Frame written to {}", params.output.display());

    return Ok(image);
}

/// Shows the image in a window until Escape is pressed.
fn show(image: &RgbImage) -> Result<(), Box<dyn Error>> {
    let (width, height) = image.dimensions();
    let window_options = WindowOptions {
        size: Some([width, height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    window.set_image("image", ImageView::new(ImageInfo::rgb8(width, height), image.as_raw()))?;

    // Ends on Escape, or when the window is gone and the channel disconnects.
    for window_event in window.event_channel()? {
        if is_exit_event(window_event) {
            break;
        }
    }
    return Ok(());
}

pub fn run(params: Params) -> Result<(), Box<dyn Error>> {
    let image = render_to_files(&params)?;
    if params.show {
        show(&image)?;
    }
    return Ok(());
}
