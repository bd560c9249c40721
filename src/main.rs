use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ Context, Result };
use clap::{ Parser, Subcommand };
use log::info;

use aun_tracer::canvas::ImageFormat;
use aun_tracer::camera::Camera;
use aun_tracer::parallel::{ multi_threaded_render, RenderConfig };
use aun_tracer::scene::Scene;
use aun_tracer::scenes;
use aun_tracer::consts::{
    ASPECT_RATIO, DEFAULT_QUEUE_CAPACITY, DEFAULT_WIDTH, DEFAULT_WORKERS,
    OUT_FILE, RECURSION_DEPTH
};

/// Some example 3D renders.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Filename of the output, without extension
    #[clap(short, long, global = true, default_value = OUT_FILE)]
    filename: String,

    /// Output format: ppm or ppm-binary
    #[clap(long, global = true, default_value = "ppm")]
    format: ImageFormat,

    /// Number of samples per pixel (every pixel is shaded once)
    #[clap(short, long, global = true, default_value_t = 4)]
    samples: u16,

    /// Image width in pixels; the height follows a 16:9 ratio. Scene files
    /// keep their own size unless this is given.
    #[clap(short, long, global = true)]
    width: Option<usize>,

    /// Number of render worker threads
    #[clap(long, global = true, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Capacity of the pixel and result queues
    #[clap(long, global = true, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Render spheres and a cube in a checkered room
    Cubes,

    /// Render a hexagon made of spheres and cylinders
    Hexagon,

    /// Render the Utah teapot in front of a simple background
    Teapot {
        /// Use the low resolution mesh
        #[clap(short, long)]
        low_res: bool,

        /// Directory holding the teapot OBJ files
        #[clap(long, default_value = "models")]
        models: PathBuf,
    },

    /// Render a JSON scene description
    Scene {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let cli = Cli::parse();
    let start = Instant::now();

    let width = cli.width.unwrap_or(DEFAULT_WIDTH).max(1);
    let height = ((width as f64 / ASPECT_RATIO) as usize).max(1);

    let scene = match cli.command {
        Command::Cubes => scenes::cubes(width, height)
            .context("failed to build the cubes scene")?,
        Command::Hexagon => scenes::hexagon(width, height)
            .context("failed to build the hexagon scene")?,
        Command::Teapot { low_res, ref models } =>
            scenes::teapot(models, low_res, width, height)
                .with_context(|| format!(
                    "failed to build the teapot scene from {}", models.display()
                ))?,
        Command::Scene { ref file } => {
            let mut scene = Scene::load(file).with_context(||
                format!("failed to load scene {}", file.display())
            )?;

            if let Some(w) = cli.width {
                let c = &scene.camera;
                let h = ((w * c.vsize) as f64 / c.hsize as f64).round() as usize;
                let resized = Camera::new(w.max(1), h.max(1), c.field_of_view,
                    *c.transform())?;
                scene.camera = resized;
            }

            scene
        },
    };

    info!("generating image {}x{} with {} samples per pixel",
        scene.camera.hsize, scene.camera.vsize, cli.samples);

    let config = RenderConfig {
        workers: cli.workers,
        queue_capacity: cli.queue_capacity,
        depth: RECURSION_DEPTH,
    };
    let canvas = multi_threaded_render(&scene.camera, &scene.world, &config);

    let path = format!("{}.{}", cli.filename, cli.format.extension());
    canvas.save(&path, cli.format)
        .with_context(|| format!("failed to write {}", path))?;

    info!("wrote {} in {:.2?}", path, start.elapsed());
    Ok(())
}
