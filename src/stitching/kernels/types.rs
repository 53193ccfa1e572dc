//! Kernel synthesis configuration types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stitching::common::Result;

/// Packed image pixel formats understood by the generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel
    Rgb,
    /// 8-bit RGBX, 4 bytes per pixel
    Rgbx,
    /// 15-bit RGB in 16-bit words, 6 bytes per pixel
    Rgb4,
    /// 15-bit RGBX in 16-bit words, 8 bytes per pixel
    Rgb6,
}

impl PixelFormat {
    pub fn is_15bit(self) -> bool {
        matches!(self, PixelFormat::Rgb4 | PixelFormat::Rgb6)
    }

    /// Whether the format carries a fourth channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgbx | PixelFormat::Rgb6)
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgbx => 4,
            PixelFormat::Rgb4 => 6,
            PixelFormat::Rgb6 => 8,
        }
    }

    /// Whether a pixel may start at a non word-aligned byte offset.
    pub fn is_unaligned(self) -> bool {
        matches!(self, PixelFormat::Rgb | PixelFormat::Rgb4)
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb => "RGB",
            PixelFormat::Rgbx => "RGBX",
            PixelFormat::Rgb4 => "RGB4",
            PixelFormat::Rgb6 => "RGB6",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(PixelFormat::Rgb),
            "rgbx" => Ok(PixelFormat::Rgbx),
            "rgb4" => Ok(PixelFormat::Rgb4),
            "rgb6" => Ok(PixelFormat::Rgb6),
            other => Err(format!("unknown pixel format '{other}'")),
        }
    }
}

/// Merge weight-map pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightFormat {
    #[default]
    U8,
    /// 15-bit weights in 16-bit words
    S16,
}

impl WeightFormat {
    /// Normalization applied to raw weights.
    pub fn mul_factor(self) -> f32 {
        match self {
            WeightFormat::U8 => 1.0 / 255.0,
            WeightFormat::S16 => 1.0 / 32767.0,
        }
    }
}

/// Format of the optional warp luma output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LumaFormat {
    U8,
    S16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Bicubic,
}

impl Interpolation {
    /// Bit 0 of the warp `flags` scalar selects bicubic sampling.
    pub fn from_flags(flags: u8) -> Self {
        if flags & 1 != 0 { Interpolation::Bicubic } else { Interpolation::Bilinear }
    }

    pub fn flag_bits(self) -> u8 {
        match self {
            Interpolation::Bilinear => 0,
            Interpolation::Bicubic => 1,
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" => Ok(Interpolation::Bilinear),
            "bicubic" => Ok(Interpolation::Bicubic),
            other => Err(format!("unknown interpolation '{other}'")),
        }
    }
}

/// Reduction used for the synthesized fourth channel of 3-channel inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrayscaleMethod {
    #[default]
    Average,
    /// Root mean square of the three channels
    Rms,
}

impl FromStr for GrayscaleMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "average" => Ok(GrayscaleMethod::Average),
            "rms" => Ok(GrayscaleMethod::Rms),
            other => Err(format!("unknown grayscale method '{other}'")),
        }
    }
}

/// Configuration of the warp kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpKernelConfig {
    pub input_format: PixelFormat,
    pub output_format: PixelFormat,
    /// Optional luma image written next to the warped pixels
    pub luma_output: Option<LumaFormat>,
    /// Optional S16 exposure-compensation image
    pub exposure_output: bool,
    pub grayscale_method: GrayscaleMethod,
    pub num_cameras: u32,
    /// Present when the input is a multi-column camera atlas
    pub num_camera_columns: Option<u32>,
    /// Fixed fourth-channel value, only meaningful for RGB input
    pub alpha: Option<u8>,
    /// Raw flags scalar; bit 0 selects bicubic interpolation
    pub flags: Option<u8>,
    /// Warp table capacity in entries
    pub table_capacity: usize,
    /// Height of the whole input atlas
    pub input_height: u32,
    /// Height of the whole output image stack
    pub output_height: u32,
}

impl Default for WarpKernelConfig {
    fn default() -> Self {
        Self {
            input_format: PixelFormat::Rgb,
            output_format: PixelFormat::Rgbx,
            luma_output: None,
            exposure_output: false,
            grayscale_method: GrayscaleMethod::Average,
            num_cameras: 1,
            num_camera_columns: None,
            alpha: None,
            flags: None,
            table_capacity: 0,
            input_height: 0,
            output_height: 0,
        }
    }
}

impl WarpKernelConfig {
    pub fn builder() -> WarpKernelConfigBuilder {
        WarpKernelConfigBuilder::default()
    }

    pub fn interpolation(&self) -> Interpolation {
        Interpolation::from_flags(self.flags.unwrap_or(0))
    }

    pub fn camera_columns(&self) -> u32 {
        self.num_camera_columns.unwrap_or(1)
    }

    /// Output pixels handled by one work item.
    ///
    /// 15-bit inputs under bicubic sampling load eight words per pixel, so each
    /// item covers two pixels instead of four.
    pub fn pixels_per_item(&self) -> usize {
        if self.input_format.is_15bit() && self.interpolation() == Interpolation::Bicubic {
            2
        } else {
            4
        }
    }
}

/// Builder for WarpKernelConfig
#[derive(Default)]
pub struct WarpKernelConfigBuilder {
    input_format: Option<PixelFormat>,
    output_format: Option<PixelFormat>,
    luma_output: Option<Option<LumaFormat>>,
    exposure_output: Option<bool>,
    grayscale_method: Option<GrayscaleMethod>,
    num_cameras: Option<u32>,
    num_camera_columns: Option<u32>,
    alpha: Option<u8>,
    flags: Option<u8>,
    table_capacity: Option<usize>,
    input_height: Option<u32>,
    output_height: Option<u32>,
}

impl WarpKernelConfigBuilder {
    pub fn input_format(mut self, format: PixelFormat) -> Self {
        self.input_format = Some(format);
        self
    }

    pub fn output_format(mut self, format: PixelFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Request a luma output in the default format for the output depth.
    pub fn with_luma(mut self) -> Self {
        self.luma_output = Some(None);
        self
    }

    pub fn luma_format(mut self, format: LumaFormat) -> Self {
        self.luma_output = Some(Some(format));
        self
    }

    pub fn exposure_output(mut self, enable: bool) -> Self {
        self.exposure_output = Some(enable);
        self
    }

    pub fn grayscale_method(mut self, method: GrayscaleMethod) -> Self {
        self.grayscale_method = Some(method);
        self
    }

    pub fn num_cameras(mut self, num_cameras: u32) -> Self {
        self.num_cameras = Some(num_cameras);
        self
    }

    pub fn num_camera_columns(mut self, columns: u32) -> Self {
        self.num_camera_columns = Some(columns);
        self
    }

    pub fn alpha(mut self, alpha: u8) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        let other_bits = self.flags.unwrap_or(0) & !1;
        self.flags = Some(other_bits | interpolation.flag_bits());
        self
    }

    pub fn table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = Some(capacity);
        self
    }

    pub fn input_height(mut self, height: u32) -> Self {
        self.input_height = Some(height);
        self
    }

    pub fn output_height(mut self, height: u32) -> Self {
        self.output_height = Some(height);
        self
    }

    pub fn build(self) -> WarpKernelConfig {
        let default = WarpKernelConfig::default();
        let input_format = self.input_format.unwrap_or(default.input_format);
        let output_format = self.output_format.unwrap_or(if input_format.is_15bit() {
            PixelFormat::Rgb6
        } else {
            PixelFormat::Rgbx
        });
        let luma_output = self.luma_output.map(|format| {
            format.unwrap_or(if output_format.is_15bit() { LumaFormat::S16 } else { LumaFormat::U8 })
        });
        WarpKernelConfig {
            input_format,
            output_format,
            luma_output,
            exposure_output: self.exposure_output.unwrap_or(default.exposure_output),
            grayscale_method: self.grayscale_method.unwrap_or(default.grayscale_method),
            num_cameras: self.num_cameras.unwrap_or(default.num_cameras),
            num_camera_columns: self.num_camera_columns,
            alpha: self.alpha,
            flags: self.flags,
            table_capacity: self.table_capacity.unwrap_or(default.table_capacity),
            input_height: self.input_height.unwrap_or(default.input_height),
            output_height: self.output_height.unwrap_or(default.output_height),
        }
    }
}

/// Configuration of the merge kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeKernelConfig {
    pub input_format: PixelFormat,
    pub output_format: PixelFormat,
    pub weight_format: WeightFormat,
    /// Output image width in pixels
    pub width: u32,
    /// Output image height in pixels
    pub height: u32,
}

impl Default for MergeKernelConfig {
    fn default() -> Self {
        Self {
            input_format: PixelFormat::Rgbx,
            output_format: PixelFormat::Rgb,
            weight_format: WeightFormat::U8,
            width: 0,
            height: 0,
        }
    }
}

impl MergeKernelConfig {
    pub fn builder() -> MergeKernelConfigBuilder {
        MergeKernelConfigBuilder::default()
    }
}

/// Builder for MergeKernelConfig
#[derive(Default)]
pub struct MergeKernelConfigBuilder {
    input_format: Option<PixelFormat>,
    output_format: Option<PixelFormat>,
    weight_format: Option<WeightFormat>,
    width: Option<u32>,
    height: Option<u32>,
}

impl MergeKernelConfigBuilder {
    pub fn input_format(mut self, format: PixelFormat) -> Self {
        self.input_format = Some(format);
        self
    }

    pub fn output_format(mut self, format: PixelFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn weight_format(mut self, format: WeightFormat) -> Self {
        self.weight_format = Some(format);
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn build(self) -> MergeKernelConfig {
        let default = MergeKernelConfig::default();
        let input_format = self.input_format.unwrap_or(default.input_format);
        let output_format = self.output_format.unwrap_or(if input_format.is_15bit() {
            PixelFormat::Rgb4
        } else {
            PixelFormat::Rgb
        });
        MergeKernelConfig {
            input_format,
            output_format,
            weight_format: self.weight_format.unwrap_or(default.weight_format),
            width: self.width.unwrap_or(default.width),
            height: self.height.unwrap_or(default.height),
        }
    }
}

/// Everything the execution side needs to compile and dispatch a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelProgram {
    pub name: String,
    pub source: String,
    pub build_options: String,
    pub work_dim: u32,
    pub global_work: Vec<usize>,
    pub local_work: Vec<usize>,
}

/// Pure generator of kernel source from a configuration.
pub trait KernelSynthesizer {
    type Config;

    fn synthesize(&self, config: &Self::Config) -> Result<KernelProgram>;
}
