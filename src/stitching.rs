//! Panoramic stitching table and kernel synthesis
//!
//! This module turns per-pixel camera contribution maps into the lookup tables
//! consumed by the warp and merge stages, and generates the OpenCL source for
//! both stages from a pixel-format configuration.

pub mod common;
pub mod tables;
pub mod kernels;
pub mod export;
pub mod planner;
pub mod timing;

pub use common::{
    StitchError,
    Result,
    CameraContributionMap,
    CameraSourceMap,
    SourceCoord,
};

pub use tables::{
    BlockClass,
    classify_block,
    largest_warp_table_size,
    smallest_warp_table_size,
    generate_warp_tables,
    generate_merge_tables,
    generate_default_merge_mask,
    ValidPixelEntry,
    WarpRemapEntry,
    CamIdEntry,
    CamGroupEntry,
    WarpTables,
    MergeTables,
};

pub use kernels::{
    PixelFormat,
    WeightFormat,
    LumaFormat,
    Interpolation,
    GrayscaleMethod,
    WarpKernelConfig,
    WarpKernelConfigBuilder,
    MergeKernelConfig,
    MergeKernelConfigBuilder,
    KernelProgram,
    KernelSynthesizer,
    WarpKernelSynthesizer,
    MergeKernelSynthesizer,
};

pub use export::{
    MaskWriter,
    TiffMaskWriter,
    MaskCompression,
    MaskExportConfig,
    MaskExportConfigBuilder,
    MaskStack,
};

pub use planner::{
    StitchConfig,
    StitchConfigBuilder,
    TableSizing,
    StitchPlan,
    StitchPlanner,
    RigMaps,
    SyntheticRig,
    PlanSummary,
};

pub use timing::{PlanTimings, StepTiming, Timer};
