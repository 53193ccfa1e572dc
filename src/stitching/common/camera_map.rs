use bytemuck::{Pod, Zeroable};

use super::error::{Result, StitchError};

/// Number of horizontally consecutive output pixels covered by one table entry.
pub const BLOCK_WIDTH: usize = 8;

/// Camera id 31 is reserved as the "no camera" marker, so a rig holds at most 31 cameras.
pub const MAX_CAMERAS: u32 = 31;

/// Per-output-pixel camera bitmasks.
///
/// Bit `i` of a pixel is set when camera `i` projects onto it. The optional padded
/// map marks pixels kept for seam blending; it is OR'ed into the valid map wherever
/// a pixel mask is read.
#[derive(Debug, Clone, Copy)]
pub struct CameraContributionMap<'a> {
    width: usize,
    height: usize,
    valid: &'a [u32],
    padded: Option<&'a [u32]>,
}

impl<'a> CameraContributionMap<'a> {
    pub fn new(width: usize, height: usize, valid: &'a [u32]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StitchError::InvalidDimensions(width, height));
        }
        check_len("valid pixel map", width * height, valid.len())?;
        Ok(Self {
            width,
            height,
            valid,
            padded: None,
        })
    }

    pub fn with_padded(mut self, padded: &'a [u32]) -> Result<Self> {
        check_len("padded pixel map", self.width * self.height, padded.len())?;
        self.padded = Some(padded);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn has_padding(&self) -> bool {
        self.padded.is_some()
    }

    /// Number of 8-pixel blocks per row; a trailing partial block counts as one.
    pub fn blocks_per_row(&self) -> usize {
        self.width.div_ceil(BLOCK_WIDTH)
    }

    /// Combined (valid | padded) mask of one pixel.
    pub fn pixel_mask(&self, x: usize, y: usize) -> u32 {
        let idx = y * self.width + x;
        let padded = self.padded.map_or(0, |p| p[idx]);
        self.valid[idx] | padded
    }

    /// Combined masks of the 8 pixels of a block, restricted to `camera_mask`.
    ///
    /// Pixels past the right edge of the image read as 0.
    pub fn block_masks(&self, block_x: usize, y: usize, camera_mask: u32) -> [u32; BLOCK_WIDTH] {
        let mut masks = [0u32; BLOCK_WIDTH];
        let x0 = block_x * BLOCK_WIDTH;
        for (i, mask) in masks.iter_mut().enumerate() {
            let x = x0 + i;
            if x < self.width {
                *mask = self.pixel_mask(x, y) & camera_mask;
            }
        }
        masks
    }
}

/// Source-camera pixel coordinate of an output pixel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SourceCoord {
    pub x: f32,
    pub y: f32,
}

impl SourceCoord {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Per-camera source coordinates, one plane of `width * height` per camera.
#[derive(Debug, Clone, Copy)]
pub struct CameraSourceMap<'a> {
    width: usize,
    height: usize,
    num_cameras: u32,
    coords: &'a [SourceCoord],
}

impl<'a> CameraSourceMap<'a> {
    pub fn new(width: usize, height: usize, num_cameras: u32, coords: &'a [SourceCoord]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StitchError::InvalidDimensions(width, height));
        }
        check_camera_count(num_cameras)?;
        check_len(
            "camera source map",
            num_cameras as usize * width * height,
            coords.len(),
        )?;
        Ok(Self {
            width,
            height,
            num_cameras,
            coords,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_cameras(&self) -> u32 {
        self.num_cameras
    }

    pub fn coord(&self, camera: u32, x: usize, y: usize) -> SourceCoord {
        let plane = camera as usize * self.width * self.height;
        self.coords[plane + y * self.width + x]
    }
}

/// Bits of the cameras present in a rig of `num_cameras`.
pub fn camera_mask(num_cameras: u32) -> u32 {
    if num_cameras >= 32 {
        u32::MAX
    } else {
        (1u32 << num_cameras) - 1
    }
}

pub fn check_camera_count(num_cameras: u32) -> Result<()> {
    if num_cameras == 0 || num_cameras > MAX_CAMERAS {
        return Err(StitchError::InvalidCameraCount(num_cameras));
    }
    Ok(())
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(StitchError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
