//! Mask export configuration types

use serde::{Deserialize, Serialize};

use crate::stitching::common::{Result, StitchError};

/// TIFF compression methods for mask images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression
    Lzw,
    /// Deflate compression - fast level
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// Configuration for mask image export
#[derive(Debug, Clone, PartialEq)]
pub struct MaskExportConfig {
    /// Compression method to use
    pub compression: MaskCompression,
    /// Predictor value for compression (2 for horizontal differencing)
    pub predictor: Option<u16>,
}

impl Default for MaskExportConfig {
    fn default() -> Self {
        Self {
            compression: MaskCompression::Lzw,
            predictor: None,
        }
    }
}

impl MaskExportConfig {
    pub fn builder() -> MaskExportConfigBuilder {
        MaskExportConfigBuilder::default()
    }
}

/// Builder for MaskExportConfig
#[derive(Default)]
pub struct MaskExportConfigBuilder {
    compression: Option<MaskCompression>,
    predictor: Option<Option<u16>>,
}

impl MaskExportConfigBuilder {
    pub fn compression(mut self, compression: MaskCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> MaskExportConfig {
        let default = MaskExportConfig::default();
        MaskExportConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}

/// A stack of per-camera 8-bit mask planes, each `stride * height` bytes.
#[derive(Debug, Clone, Copy)]
pub struct MaskStack<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub num_cameras: u32,
    pub data: &'a [u8],
}

impl<'a> MaskStack<'a> {
    pub fn new(width: usize, height: usize, num_cameras: u32, data: &'a [u8]) -> Result<Self> {
        Self::with_stride(width, height, width, num_cameras, data)
    }

    pub fn with_stride(width: usize, height: usize, stride: usize, num_cameras: u32, data: &'a [u8]) -> Result<Self> {
        if width == 0 || height == 0 || stride < width {
            return Err(StitchError::InvalidDimensions(width, height));
        }
        let expected = stride * height * num_cameras as usize;
        if data.len() != expected {
            return Err(StitchError::ShapeMismatch {
                what: "mask stack",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            num_cameras,
            data,
        })
    }

    /// Tightly packed pixels of one camera plane.
    pub fn plane(&self, camera: u32) -> Vec<u8> {
        let plane_len = self.stride * self.height;
        let start = camera as usize * plane_len;
        self.data[start..start + plane_len]
            .chunks_exact(self.stride)
            .flat_map(|row| &row[..self.width])
            .copied()
            .collect()
    }
}
