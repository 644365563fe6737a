use std::path::PathBuf;

use clap::Parser;
use nalgebra::{vector, Vector3};
use tracing_subscriber::EnvFilter;

use tangent_renderer::app;
use tangent_renderer::SceneConfig;

/// Renders a normal mapped OBJ model on the CPU.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Wavefront OBJ model, faces need v/vt/vn indices.
    #[arg(short = 'p', long, default_value = "assets/african_head/african_head.obj")]
    model: PathBuf,

    /// Diffuse texture [default: <model>_diffuse.tga]
    #[arg(long)]
    diffuse: Option<PathBuf>,

    /// Tangent space normal map [default: <model>_nm_tangent.tga]
    #[arg(long)]
    normal_map: Option<PathBuf>,

    /// Output image, format picked by extension.
    #[arg(short, long, default_value = "framebuffer.tga")]
    output: PathBuf,

    /// Also write the z-buffer as a grayscale image.
    #[arg(long)]
    depth_output: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Camera position, as x,y,z.
    #[arg(long, value_parser = parse_vector, default_value = "1,1,3", allow_hyphen_values = true)]
    eye: Vector3<f32>,

    /// Point the camera looks at.
    #[arg(long, value_parser = parse_vector, default_value = "0,0,0", allow_hyphen_values = true)]
    center: Vector3<f32>,

    /// Camera up direction.
    #[arg(long, value_parser = parse_vector, default_value = "0,1,0", allow_hyphen_values = true)]
    up: Vector3<f32>,

    /// Direction towards the light.
    #[arg(long, value_parser = parse_vector, default_value = "1,1,1", allow_hyphen_values = true)]
    light: Vector3<f32>,

    /// Show the result in a window, Escape closes it.
    #[arg(short, long)]
    show: bool,
}

fn parse_vector(value: &str) -> Result<Vector3<f32>, String> {
    let coords = value
        .split(',')
        .map(|coord| coord.trim().parse::<f32>().map_err(|e| format!("{:?}: {}", coord, e)))
        .collect::<Result<Vec<f32>, String>>()?;
    if coords.len() != 3 {
        return Err(format!("expected x,y,z, got {} values", coords.len()));
    }
    return Ok(vector![coords[0], coords[1], coords[2]]);
}

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let params = app::Params {
        model: args.model,
        diffuse: args.diffuse,
        normal_map: args.normal_map,
        output: args.output,
        depth_output: args.depth_output,
        scene: SceneConfig {
            eye: args.eye,
            center: args.center,
            up: args.up,
            light_direction: args.light,
            width: args.width,
            height: args.height,
        },
        show: args.show,
    };

    app::run(params)?;

    return Ok(());
}
