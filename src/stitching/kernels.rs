//! OpenCL kernel synthesis for the warp and merge stages
//!
//! Synthesizers are pure: the same configuration always yields byte-identical
//! source text and work sizes.

pub mod types;
pub mod helpers;
mod warp_fragments;
pub mod warp_kernel;
pub mod merge_kernel;


pub use types::{
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
};
pub use warp_kernel::{WARP_KERNEL_NAME, WARP_LOCAL_WORK, WarpKernelSynthesizer};
pub use merge_kernel::{MERGE_KERNEL_NAME, MERGE_LOCAL_WORK, MERGE_PIXELS_PER_ITEM, MergeKernelSynthesizer};
