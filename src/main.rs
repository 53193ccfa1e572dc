use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use loom_stitch_rs::logger;
use loom_stitch_rs::stitching::{
    Interpolation,
    PixelFormat,
    RigMaps,
    SourceCoord,
    StitchConfig,
    StitchPlanner,
    SyntheticRig,
    TableSizing,
};

/// Plans warp and merge tables plus OpenCL kernels for a camera rig.
#[derive(Parser, Debug)]
#[command(name = "loom-stitch", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate tables, kernels and masks into an output directory
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Rig description (JSON) pointing at raw map files
    #[arg(long, conflicts_with = "synthetic_cameras", required_unless_present = "synthetic_cameras")]
    rig: Option<PathBuf>,

    /// Build an evenly spaced synthetic rig with this many cameras
    #[arg(long)]
    synthetic_cameras: Option<u32>,

    /// Synthetic panorama width
    #[arg(long, default_value_t = 2048)]
    width: u32,

    /// Synthetic panorama height
    #[arg(long, default_value_t = 1024)]
    height: u32,

    /// Synthetic overlap on each side of a camera strip, in pixels
    #[arg(long, default_value_t = 64)]
    overlap: u32,

    /// Warp table sizing: smallest or largest
    #[arg(long)]
    sizing: Option<TableSizing>,

    /// Camera image format: rgb, rgbx, rgb4 or rgb6
    #[arg(long)]
    input_format: Option<PixelFormat>,

    /// bilinear or bicubic
    #[arg(long)]
    interpolation: Option<Interpolation>,

    /// Output directory
    #[arg(long)]
    out: PathBuf,
}

/// On-disk rig: the stitch configuration plus raw little-endian map files,
/// resolved relative to the rig file.
#[derive(Debug, Deserialize)]
struct RigFile {
    #[serde(flatten)]
    config: StitchConfig,
    valid_map: PathBuf,
    source_map: PathBuf,
    padded_map: Option<PathBuf>,
    default_camera_map: Option<PathBuf>,
}

struct LoadedRig {
    config: StitchConfig,
    valid: Vec<u32>,
    padded: Option<Vec<u32>>,
    sources: Vec<SourceCoord>,
    default_camera: Option<Vec<u8>>,
}

impl LoadedRig {
    fn maps(&self) -> RigMaps<'_> {
        RigMaps {
            valid: &self.valid,
            padded: self.padded.as_deref(),
            sources: &self.sources,
            default_camera: self.default_camera.as_deref(),
        }
    }
}

fn read_bytes(base: &Path, path: &Path) -> Result<Vec<u8>> {
    let path = base.join(path);
    fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_u32_map(base: &Path, path: &Path) -> Result<Vec<u32>> {
    let bytes = read_bytes(base, path)?;
    if bytes.len() % 4 != 0 {
        bail!("{} is not a whole number of u32 values", path.display());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_source_map(base: &Path, path: &Path) -> Result<Vec<SourceCoord>> {
    let bytes = read_bytes(base, path)?;
    if bytes.len() % 8 != 0 {
        bail!("{} is not a whole number of (x, y) f32 pairs", path.display());
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|b| {
            SourceCoord::new(
                f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                f32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            )
        })
        .collect())
}

fn load_rig(path: &Path) -> Result<LoadedRig> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read rig {}", path.display()))?;
    let rig: RigFile = serde_json::from_str(&text).with_context(|| format!("invalid rig {}", path.display()))?;
    let base = path.parent().unwrap_or(Path::new("."));

    Ok(LoadedRig {
        valid: read_u32_map(base, &rig.valid_map)?,
        padded: rig.padded_map.as_deref().map(|p| read_u32_map(base, p)).transpose()?,
        sources: read_source_map(base, &rig.source_map)?,
        default_camera: rig.default_camera_map.as_deref().map(|p| read_bytes(base, p)).transpose()?,
        config: rig.config,
    })
}

fn synthetic_rig(args: &PlanArgs, num_cameras: u32) -> Result<LoadedRig> {
    let rig = SyntheticRig::new(num_cameras, args.width, args.height, args.overlap)
        .context("failed to build synthetic rig")?;
    Ok(LoadedRig {
        config: rig.config_builder().build(),
        valid: rig.valid,
        padded: None,
        sources: rig.sources,
        default_camera: Some(rig.default_camera),
    })
}

fn plan(args: PlanArgs) -> Result<()> {
    let mut rig = match (&args.rig, args.synthetic_cameras) {
        (Some(path), _) => load_rig(path)?,
        (None, Some(num_cameras)) => synthetic_rig(&args, num_cameras)?,
        (None, None) => bail!("either --rig or --synthetic-cameras is required"),
    };
    if let Some(sizing) = args.sizing {
        rig.config.table_sizing = sizing;
    }
    if let Some(format) = args.input_format {
        rig.config.input_format = format;
    }
    if let Some(interpolation) = args.interpolation {
        rig.config.interpolation = interpolation;
    }

    let planner = StitchPlanner::new(rig.config.clone());
    info!("Stitch planner initialized");
    info!("Sizing: {:?}", planner.config().table_sizing);

    let plan = planner.plan(&rig.maps()).context("planning failed")?;
    plan.timings.log_summary();

    let files = planner
        .export(&plan, &args.out)
        .with_context(|| format!("failed to export to {}", args.out.display()))?;
    info!(
        "Wrote {} files: {} warp entries, warp global {:?}, merge global {:?}",
        files.len(),
        plan.entry_count(),
        plan.warp_kernel.global_work,
        plan.merge_kernel.global_work
    );
    Ok(())
}

fn main() -> Result<()> {
    logger::init();
    info!("Starting loom-stitch...");

    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => plan(args),
    }
}
