// bvec-render: render, compare and determinism-check Bvec vector images.
//
// Usage:
//   bvec-render render --in <scene.bvec> --out <image.bmp|raw> [--threads N] [--scale S]
//   bvec-render compare <a> <b> [--diff <diff.bmp>]
//   bvec-render determinism --in <scene.bvec> [--threads N]
//   bvec-render scene <name> --width W --height H --out <scene.bvec>
//   bvec-render list

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context as _;
use bvec_render::{available_scenes, build_scene, compare_images, diff_image, load_image, save_image};
use clap::{Parser, Subcommand};
use tileraster::{rasterize, ExecutorConfig, ImageBuffer, Matrix, TaskExecutor, VectorImage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bvec-render", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterize a .bvec file to BMP or raw RGBA.
    Render(RenderArgs),
    /// Compare two images pixel by pixel.
    Compare(CompareArgs),
    /// Render serially and in parallel and check the outputs match.
    Determinism(DeterminismArgs),
    /// Write a built-in scene as a .bvec file.
    Scene(SceneArgs),
    /// List built-in scenes.
    List,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input container.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output image (.bmp, .raw or .rgba).
    #[arg(long)]
    out: PathBuf,

    /// Worker count including the calling thread; defaults to all cores.
    #[arg(long)]
    threads: Option<usize>,

    /// Uniform scale applied to the whole image.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    a: PathBuf,
    b: PathBuf,

    /// Write a difference image here.
    #[arg(long)]
    diff: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DeterminismArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Parallel worker count.
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Scene name, see `list`.
    name: String,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 512)]
    height: u32,

    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Compare(args) => cmd_compare(args),
        Command::Determinism(args) => cmd_determinism(args),
        Command::Scene(args) => cmd_scene(args),
        Command::List => {
            println!("Available scenes:");
            for name in available_scenes() {
                println!("  {name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_bvec(path: &Path) -> anyhow::Result<VectorImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    VectorImage::decode(&bytes).with_context(|| format!("decode '{}'", path.display()))
}

/// Canvas size for an image: its bounds' far corner, scaled.
fn canvas_size(image: &VectorImage, scale: f64) -> anyhow::Result<(u32, u32)> {
    let w = (image.bounds.x2 as f64 * scale).ceil();
    let h = (image.bounds.y2 as f64 * scale).ceil();
    if !(w >= 1.0 && h >= 1.0) {
        anyhow::bail!("image bounds {:?} give an empty canvas", image.bounds);
    }
    Ok((w as u32, h as u32))
}

fn render(image: &VectorImage, scale: f64, executor: &mut TaskExecutor) -> anyhow::Result<ImageBuffer> {
    let (w, h) = canvas_size(image, scale)?;
    let mut out = ImageBuffer::new(w, h)?;
    rasterize(&image.geometries, &Matrix::new_scaling(scale, scale), executor, &mut out);
    Ok(out)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<ExitCode> {
    let image = read_bvec(&args.in_path)?;
    let mut executor = TaskExecutor::new(&ExecutorConfig {
        threads: args.threads,
        batch_size: None,
    })?;
    let start = Instant::now();
    let out = render(&image, args.scale, &mut executor)?;
    tracing::info!(
        paths = image.geometries.len(),
        width = out.width(),
        height = out.height(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "rendered"
    );
    save_image(&args.out, &out).with_context(|| format!("write '{}'", args.out.display()))?;
    println!("Saved: {}", args.out.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<ExitCode> {
    let a = load_image(&args.a).with_context(|| format!("load '{}'", args.a.display()))?;
    let b = load_image(&args.b).with_context(|| format!("load '{}'", args.b.display()))?;
    let result = compare_images(&a, &b)?;
    println!("{result}");
    if let Some(path) = args.diff {
        save_image(&path, &diff_image(&a, &b)?)?;
        println!("Diff saved: {}", path.display());
    }
    if !result.identical {
        for (d, &count) in result.diff_histogram.iter().enumerate().filter(|&(_, &c)| c > 0) {
            println!("  diff={d}: {count} channels");
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_determinism(args: DeterminismArgs) -> anyhow::Result<ExitCode> {
    let image = read_bvec(&args.in_path)?;
    let serial = render(&image, 1.0, &mut TaskExecutor::new(&ExecutorConfig::serial())?)?;
    let parallel = render(
        &image,
        1.0,
        &mut TaskExecutor::new(&ExecutorConfig::with_threads(args.threads))?,
    )?;
    let result = compare_images(&serial, &parallel)?;
    println!("serial vs {} workers: {result}", args.threads);
    Ok(if result.identical {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_scene(args: SceneArgs) -> anyhow::Result<ExitCode> {
    let Some(scene) = build_scene(&args.name, args.width, args.height) else {
        anyhow::bail!("unknown scene '{}', use 'list'", args.name);
    };
    std::fs::write(&args.out, scene.encode())
        .with_context(|| format!("write '{}'", args.out.display()))?;
    println!(
        "Saved {} paths to {}",
        scene.geometries.len(),
        args.out.display()
    );
    Ok(ExitCode::SUCCESS)
}
