//! Stitch planning pipeline
//!
//! Runs sizing, the warp and merge table fills, the default mask and kernel
//! synthesis for one rig, then exports the result to a directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, instrument, warn};

use crate::stitching::common::{
    CameraContributionMap,
    CameraSourceMap,
    Result,
    SourceCoord,
    StitchError,
    check_camera_count,
};
use crate::stitching::export::{
    MaskExportConfig,
    MaskStack,
    MaskWriter,
    TiffMaskWriter,
    dump_merge_tables,
    dump_warp_tables,
};
use crate::stitching::kernels::{
    Interpolation,
    KernelProgram,
    KernelSynthesizer,
    LumaFormat,
    MergeKernelConfig,
    MergeKernelSynthesizer,
    PixelFormat,
    WarpKernelConfig,
    WarpKernelSynthesizer,
    WeightFormat,
};
use crate::stitching::tables::{
    CameraAtlas,
    MergeTables,
    WarpTables,
    generate_default_merge_mask,
    generate_merge_tables,
    generate_warp_tables,
    largest_warp_table_size,
    smallest_warp_table_size,
};
use crate::stitching::timing::{PlanTimings, StepTiming};


pub const MASK_FILE: &str = "default_mask.tiff";
pub const PLAN_FILE: &str = "plan.json";

/// How the warp table capacity is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSizing {
    /// Exact entry count rounded up to 64
    #[default]
    Smallest,
    /// Upper bound: every block of every camera
    Largest,
}

impl FromStr for TableSizing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smallest" => Ok(TableSizing::Smallest),
            "largest" => Ok(TableSizing::Largest),
            other => Err(format!("unknown table sizing '{other}'")),
        }
    }
}

/// Rig and output description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub num_cameras: u32,
    /// Output panorama width in pixels
    pub width: u32,
    /// Output panorama height in pixels
    pub height: u32,
    /// Width of one camera tile in the input atlas; defaults to the output width
    pub camera_width: Option<u32>,
    /// Height of one camera tile in the input atlas; defaults to the output height
    pub camera_height: Option<u32>,
    pub camera_columns: u32,
    pub table_sizing: TableSizing,
    /// OR the rig's padded map into the contribution map
    pub use_padded_map: bool,
    /// Camera image format fed to the warp stage
    pub input_format: PixelFormat,
    /// Final panorama format; the merge default for the input depth when unset
    pub output_format: Option<PixelFormat>,
    pub interpolation: Interpolation,
    pub weight_format: WeightFormat,
    pub luma_output: Option<LumaFormat>,
    pub exposure_output: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            num_cameras: 2,
            width: 0,
            height: 0,
            camera_width: None,
            camera_height: None,
            camera_columns: 1,
            table_sizing: TableSizing::Smallest,
            use_padded_map: false,
            input_format: PixelFormat::Rgb,
            output_format: None,
            interpolation: Interpolation::Bilinear,
            weight_format: WeightFormat::U8,
            luma_output: None,
            exposure_output: false,
        }
    }
}

impl StitchConfig {
    pub fn builder() -> StitchConfigBuilder {
        StitchConfigBuilder::default()
    }

    pub fn camera_width(&self) -> u32 {
        self.camera_width.unwrap_or(self.width)
    }

    pub fn camera_height(&self) -> u32 {
        self.camera_height.unwrap_or(self.height)
    }

    pub fn atlas(&self) -> CameraAtlas {
        CameraAtlas::new(self.camera_columns, self.camera_width())
    }

    pub fn validate(&self) -> Result<()> {
        check_camera_count(self.num_cameras)?;
        if self.width == 0 || self.height == 0 {
            return Err(StitchError::InvalidDimensions(self.width as usize, self.height as usize));
        }
        if self.camera_columns == 0 {
            return Err(StitchError::UnsupportedConfiguration(
                "camera atlas needs at least one column".to_string(),
            ));
        }
        Ok(())
    }

    /// Warp kernel configuration for tables of `capacity` entries.
    pub fn warp_kernel_config(&self, capacity: usize) -> WarpKernelConfig {
        let rows = self.num_cameras.div_ceil(self.camera_columns.max(1));
        let mut builder = WarpKernelConfig::builder()
            .input_format(self.input_format)
            .num_cameras(self.num_cameras)
            .interpolation(self.interpolation)
            .exposure_output(self.exposure_output)
            .table_capacity(capacity)
            .input_height(self.camera_height() * rows)
            .output_height(self.height * self.num_cameras);
        if let Some(luma) = self.luma_output {
            builder = builder.luma_format(luma);
        }
        if self.camera_columns > 1 {
            builder = builder.num_camera_columns(self.camera_columns);
        }
        builder.build()
    }

    /// Merge kernel configuration reading the images `warp` produces.
    pub fn merge_kernel_config(&self, warp: &WarpKernelConfig) -> MergeKernelConfig {
        let mut builder = MergeKernelConfig::builder()
            .input_format(warp.output_format)
            .weight_format(self.weight_format)
            .dimensions(self.width, self.height);
        if let Some(output) = self.output_format {
            builder = builder.output_format(output);
        }
        builder.build()
    }
}

/// Builder for StitchConfig
#[derive(Default)]
pub struct StitchConfigBuilder {
    num_cameras: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    camera_width: Option<u32>,
    camera_height: Option<u32>,
    camera_columns: Option<u32>,
    table_sizing: Option<TableSizing>,
    use_padded_map: Option<bool>,
    input_format: Option<PixelFormat>,
    output_format: Option<PixelFormat>,
    interpolation: Option<Interpolation>,
    weight_format: Option<WeightFormat>,
    luma_output: Option<LumaFormat>,
    exposure_output: Option<bool>,
}

impl StitchConfigBuilder {
    pub fn num_cameras(mut self, num_cameras: u32) -> Self {
        self.num_cameras = Some(num_cameras);
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn camera_size(mut self, width: u32, height: u32) -> Self {
        self.camera_width = Some(width);
        self.camera_height = Some(height);
        self
    }

    pub fn camera_columns(mut self, columns: u32) -> Self {
        self.camera_columns = Some(columns);
        self
    }

    pub fn table_sizing(mut self, sizing: TableSizing) -> Self {
        self.table_sizing = Some(sizing);
        self
    }

    pub fn use_padded_map(mut self, enable: bool) -> Self {
        self.use_padded_map = Some(enable);
        self
    }

    pub fn input_format(mut self, format: PixelFormat) -> Self {
        self.input_format = Some(format);
        self
    }

    pub fn output_format(mut self, format: PixelFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = Some(interpolation);
        self
    }

    pub fn weight_format(mut self, format: WeightFormat) -> Self {
        self.weight_format = Some(format);
        self
    }

    pub fn luma_output(mut self, format: LumaFormat) -> Self {
        self.luma_output = Some(format);
        self
    }

    pub fn exposure_output(mut self, enable: bool) -> Self {
        self.exposure_output = Some(enable);
        self
    }

    pub fn build(self) -> StitchConfig {
        let default = StitchConfig::default();
        StitchConfig {
            num_cameras: self.num_cameras.unwrap_or(default.num_cameras),
            width: self.width.unwrap_or(default.width),
            height: self.height.unwrap_or(default.height),
            camera_width: self.camera_width.or(default.camera_width),
            camera_height: self.camera_height.or(default.camera_height),
            camera_columns: self.camera_columns.unwrap_or(default.camera_columns),
            table_sizing: self.table_sizing.unwrap_or(default.table_sizing),
            use_padded_map: self.use_padded_map.unwrap_or(default.use_padded_map),
            input_format: self.input_format.unwrap_or(default.input_format),
            output_format: self.output_format.or(default.output_format),
            interpolation: self.interpolation.unwrap_or(default.interpolation),
            weight_format: self.weight_format.unwrap_or(default.weight_format),
            luma_output: self.luma_output.or(default.luma_output),
            exposure_output: self.exposure_output.unwrap_or(default.exposure_output),
        }
    }
}

/// Borrowed per-pixel maps of a rig.
#[derive(Debug, Clone, Copy)]
pub struct RigMaps<'a> {
    pub valid: &'a [u32],
    pub padded: Option<&'a [u32]>,
    /// One plane of `width * height` coordinates per camera
    pub sources: &'a [SourceCoord],
    /// Default camera index per pixel, 255 for none
    pub default_camera: Option<&'a [u8]>,
}

/// Evenly spaced cameras, each covering a vertical strip of the panorama plus
/// `overlap` pixels on both sides.
#[derive(Debug, Clone)]
pub struct SyntheticRig {
    pub num_cameras: u32,
    pub width: u32,
    pub height: u32,
    pub camera_width: u32,
    pub valid: Vec<u32>,
    pub sources: Vec<SourceCoord>,
    pub default_camera: Vec<u8>,
}

impl SyntheticRig {
    pub fn new(num_cameras: u32, width: u32, height: u32, overlap: u32) -> Result<Self> {
        check_camera_count(num_cameras)?;
        if width == 0 || height == 0 {
            return Err(StitchError::InvalidDimensions(width as usize, height as usize));
        }
        let strip = width.div_ceil(num_cameras);
        let camera_width = strip + 2 * overlap;
        let (w, h) = (width as usize, height as usize);

        let covers = |camera: u32, x: u32| {
            let start = camera * strip;
            x + overlap >= start && x < start + strip + overlap
        };

        let mut valid = vec![0u32; w * h];
        let mut default_camera = vec![0u8; w * h];
        for (row_valid, row_default) in valid.chunks_exact_mut(w).zip(default_camera.chunks_exact_mut(w)) {
            for x in 0..width {
                row_valid[x as usize] = (0..num_cameras)
                    .filter(|&camera| covers(camera, x))
                    .fold(0, |mask, camera| mask | (1 << camera));
                row_default[x as usize] = (x / strip) as u8;
            }
        }

        let max_x = (camera_width - 1) as f32;
        let mut sources = Vec::with_capacity(num_cameras as usize * w * h);
        for camera in 0..num_cameras {
            let origin = (camera * strip) as f32 - overlap as f32;
            for y in 0..h {
                for x in 0..w {
                    sources.push(SourceCoord::new((x as f32 - origin).clamp(0.0, max_x), y as f32));
                }
            }
        }

        Ok(Self {
            num_cameras,
            width,
            height,
            camera_width,
            valid,
            sources,
            default_camera,
        })
    }

    /// Config builder preset with the rig geometry.
    pub fn config_builder(&self) -> StitchConfigBuilder {
        StitchConfig::builder()
            .num_cameras(self.num_cameras)
            .dimensions(self.width, self.height)
            .camera_size(self.camera_width, self.height)
    }

    pub fn maps(&self) -> RigMaps<'_> {
        RigMaps {
            valid: &self.valid,
            padded: None,
            sources: &self.sources,
            default_camera: Some(&self.default_camera),
        }
    }
}

/// Everything generated for one rig.
#[derive(Debug, Clone)]
pub struct StitchPlan {
    pub config: StitchConfig,
    pub table_capacity: usize,
    pub warp_tables: WarpTables,
    pub merge_tables: MergeTables,
    /// `num_cameras` planes of `width * height` bytes
    pub default_mask: Option<Vec<u8>>,
    pub warp_kernel: KernelProgram,
    pub merge_kernel: KernelProgram,
    pub timings: PlanTimings,
}

impl StitchPlan {
    pub fn entry_count(&self) -> usize {
        self.warp_tables.entry_count
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            num_cameras: self.config.num_cameras,
            width: self.config.width,
            height: self.config.height,
            table_capacity: self.table_capacity,
            entry_count: self.entry_count(),
            blend_blocks: self
                .merge_tables
                .cam_id
                .iter()
                .filter(|entry| entry.blend_count().is_some())
                .count(),
            warp_global_work: self.warp_kernel.global_work.clone(),
            merge_global_work: self.merge_kernel.global_work.clone(),
            timings: self.timings.steps().to_vec(),
        }
    }
}

/// Serializable overview written next to the exported tables.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub num_cameras: u32,
    pub width: u32,
    pub height: u32,
    pub table_capacity: usize,
    pub entry_count: usize,
    pub blend_blocks: usize,
    pub warp_global_work: Vec<usize>,
    pub merge_global_work: Vec<usize>,
    pub timings: Vec<StepTiming>,
}

pub struct StitchPlanner<W: MaskWriter> {
    writer: W,
    config: StitchConfig,
    export_config: MaskExportConfig,
}

impl StitchPlanner<TiffMaskWriter> {
    pub fn new(config: StitchConfig) -> Self {
        Self {
            writer: TiffMaskWriter,
            config,
            export_config: MaskExportConfig::default(),
        }
    }
}

impl<W: MaskWriter> StitchPlanner<W> {
    pub fn with_custom(writer: W, config: StitchConfig, export_config: MaskExportConfig) -> Self {
        Self {
            writer,
            config,
            export_config,
        }
    }

    #[instrument(skip_all, fields(num_cameras = self.config.num_cameras, width = self.config.width, height = self.config.height))]
    pub fn plan(&self, rig: &RigMaps<'_>) -> Result<StitchPlan> {
        self.config.validate()?;
        let config = &self.config;
        let num_cameras = config.num_cameras;
        let (width, height) = (config.width as usize, config.height as usize);
        let mut timings = PlanTimings::new();
        info!("Planning {}-camera rig at {}x{}", num_cameras, width, height);

        let mut map = CameraContributionMap::new(width, height, rig.valid)?;
        match (config.use_padded_map, rig.padded) {
            (true, Some(padded)) => map = map.with_padded(padded)?,
            (true, None) => warn!("Padded map requested but the rig has none"),
            _ => {}
        }
        debug!(padded = map.has_padding(), blocks_per_row = map.blocks_per_row(), "Contribution map ready");
        let sources = CameraSourceMap::new(width, height, num_cameras, rig.sources)?;

        let capacity = {
            let _span = info_span!("table_sizing").entered();
            timings.measure("table_sizing", || match config.table_sizing {
                TableSizing::Smallest => smallest_warp_table_size(num_cameras, &map),
                TableSizing::Largest => largest_warp_table_size(num_cameras, width, height),
            })?
        };

        let warp_tables = {
            let _span = info_span!("warp_tables", capacity).entered();
            timings.measure("warp_tables", || {
                generate_warp_tables(num_cameras, &map, &sources, config.atlas(), capacity)
            })?
        };

        let merge_tables = {
            let _span = info_span!("merge_tables").entered();
            timings.measure("merge_tables", || generate_merge_tables(num_cameras, &map))?
        };

        let default_mask = match rig.default_camera {
            Some(owners) => {
                let _span = info_span!("default_mask").entered();
                Some(timings.measure("default_mask", || {
                    generate_default_merge_mask(num_cameras, width, height, owners)
                })?)
            }
            None => None,
        };

        let warp_config = config.warp_kernel_config(capacity);
        let merge_config = config.merge_kernel_config(&warp_config);
        let (warp_kernel, merge_kernel) = {
            let _span = info_span!("kernel_synthesis").entered();
            let warp = timings.measure("warp_kernel", || WarpKernelSynthesizer::new().synthesize(&warp_config))?;
            let merge = timings.measure("merge_kernel", || MergeKernelSynthesizer::new().synthesize(&merge_config))?;
            (warp, merge)
        };

        info!(
            "Plan complete: {} warp entries in a table of {} in {:.3}ms",
            warp_tables.entry_count,
            capacity,
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(StitchPlan {
            config: config.clone(),
            table_capacity: capacity,
            warp_tables,
            merge_tables,
            default_mask,
            warp_kernel,
            merge_kernel,
            timings,
        })
    }

    /// Write tables, kernel sources, the default mask and a JSON summary to `dir`.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn export(&self, plan: &StitchPlan, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut written = dump_warp_tables(&plan.warp_tables, dir)?;
        written.extend(dump_merge_tables(&plan.merge_tables, plan.merge_tables.blocks_per_row, dir)?);

        for program in [&plan.warp_kernel, &plan.merge_kernel] {
            let path = dir.join(format!("{}.cl", program.name));
            fs::write(&path, &program.source)?;
            written.push(path);
        }

        if let Some(mask) = &plan.default_mask {
            let stack = MaskStack::new(
                plan.config.width as usize,
                plan.config.height as usize,
                plan.config.num_cameras,
                mask,
            )?;
            let path = dir.join(MASK_FILE);
            let mut file = fs::File::create(&path)?;
            self.writer.write_masks(&stack, &mut file, &self.export_config)?;
            written.push(path);
        }

        let path = dir.join(PLAN_FILE);
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &plan.summary()).map_err(std::io::Error::from)?;
        written.push(path);

        info!("Exported {} files to {}", written.len(), dir.display());
        Ok(written)
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }
}
