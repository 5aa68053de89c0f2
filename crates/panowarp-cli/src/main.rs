//! panowarp CLI — warp posed camera views onto an equirectangular canvas.

use clap::Parser;
use std::path::PathBuf;

use panowarp::{warp_scene, Scene};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "panowarp")]
#[command(about = "Warp cameras around a nodal point onto a 360° equirectangular canvas")]
#[command(version)]
struct Cli {
    /// Scene descriptor (JSON) enumerating views, poses and intrinsics.
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Output folder for the per-view rasters and the manifest.
    #[arg(long, short = 'o')]
    output: PathBuf,

    /// Panorama width in pixels; absent or ≤ 0 means estimate from the views.
    #[arg(long = "panoramaWidth", short = 'w')]
    panorama_width: Option<i64>,

    /// Verbosity level (fatal, error, warning, info, debug, trace).
    #[arg(long = "verboseLevel", short = 'v', default_value = "info")]
    verbose_level: String,
}

/// Map the CLI verbosity names onto tracing filter directives.
fn filter_directive(level: &str) -> Result<&'static str, CliError> {
    match level {
        "fatal" | "error" => Ok("error"),
        "warning" => Ok("warn"),
        "info" => Ok("info"),
        "debug" => Ok("debug"),
        "trace" => Ok("trace"),
        other => Err(format!(
            "invalid verbosity \"{}\" (expected fatal, error, warning, info, debug or trace)",
            other
        )
        .into()),
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let directive = filter_directive(&cli.verbose_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .init();

    tracing::info!("loading scene {}", cli.input.display());
    let scene = Scene::from_json_file(&cli.input)?;
    tracing::info!(
        "{} views ({} reconstructable)",
        scene.views.len(),
        scene.reconstructable_views().len()
    );

    // Non-positive widths fall through to estimation, matching absence.
    let requested = cli
        .panorama_width
        .filter(|&w| w > 0)
        .map(|w| w.min(u32::MAX as i64) as u32);

    let manifest = warp_scene(&scene, &cli.output, requested)?;
    tracing::info!(
        "done: {} views warped onto a {}x{} canvas",
        manifest.views.len(),
        manifest.panorama_width,
        manifest.panorama_height
    );

    Ok(())
}
