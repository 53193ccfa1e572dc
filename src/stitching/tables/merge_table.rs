use bytemuck::Pod;
use tracing::{debug, instrument};

use crate::stitching::common::{
    CameraContributionMap,
    Result,
    StitchError,
    camera_mask,
    check_camera_count,
};

use super::classifier::classify_map_block;
use super::types::{CamGroupEntry, CamIdEntry};

/// Default camera index meaning no camera owns the pixel.
pub const NO_DEFAULT_CAMERA: u8 = 255;

/// Merge tables, one record per 8-pixel block, stored densely row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeTables {
    pub blocks_per_row: usize,
    pub height: usize,
    pub cam_id: Vec<CamIdEntry>,
    pub group1: Vec<CamGroupEntry>,
    pub group2: Vec<CamGroupEntry>,
}

impl MergeTables {
    pub fn at(&self, block_x: usize, y: usize) -> (CamIdEntry, CamGroupEntry, CamGroupEntry) {
        let idx = y * self.blocks_per_row + block_x;
        (self.cam_id[idx], self.group1[idx], self.group2[idx])
    }

    /// Camera ids of a block: one id for a single camera, the blend list otherwise.
    /// Unused blend slots are skipped.
    pub fn cameras_at(&self, block_x: usize, y: usize) -> Vec<u8> {
        let (cam_id, g1, g2) = self.at(block_x, y);
        if let Some(cam) = cam_id.single_camera() {
            return vec![cam as u8];
        }
        match cam_id.blend_count() {
            Some(n) => g1
                .ids()
                .into_iter()
                .chain(g2.ids())
                .take(n)
                .filter(|&id| id < 31)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Camera id plane with a row stride of `stride` bytes.
    pub fn cam_id_plane(&self, stride: usize) -> Result<Vec<u8>> {
        strided_plane("camId table", &self.cam_id, self.blocks_per_row, self.height, stride)
    }

    pub fn group1_plane(&self, stride: usize) -> Result<Vec<u8>> {
        strided_plane("camGroup1 table", &self.group1, self.blocks_per_row, self.height, stride)
    }

    pub fn group2_plane(&self, stride: usize) -> Result<Vec<u8>> {
        strided_plane("camGroup2 table", &self.group2, self.blocks_per_row, self.height, stride)
    }
}

/// Build the merge camera selection tables.
///
/// A lone camera that only partly covers its block is encoded as a two-camera
/// blend with the second slot unused, so the kernel takes the per-pixel weighted path.
#[instrument(skip(map), fields(width = map.width(), height = map.height()))]
pub fn generate_merge_tables(num_cameras: u32, map: &CameraContributionMap<'_>) -> Result<MergeTables> {
    check_camera_count(num_cameras)?;
    let cameras = camera_mask(num_cameras);
    let blocks_per_row = map.blocks_per_row();
    let total = blocks_per_row * map.height();

    let mut cam_id = Vec::with_capacity(total);
    let mut group1 = Vec::with_capacity(total);
    let mut group2 = Vec::with_capacity(total);
    let mut escalated = 0usize;

    for y in 0..map.height() {
        for block_x in 0..blocks_per_row {
            let class = classify_map_block(map, block_x, y, cameras);
            let mut ids = [31u8; CamIdEntry::MAX_BLEND];
            let entry = match class.effective_count() {
                0 => CamIdEntry::NONE,
                1 => CamIdEntry::single(class.or_mask.trailing_zeros())?,
                n => {
                    if class.is_escalated() {
                        escalated += 1;
                    }
                    for (slot, id) in ids.iter_mut().zip(class.blend_ids()) {
                        *slot = id as u8;
                    }
                    CamIdEntry::blend((n as usize).min(CamIdEntry::MAX_BLEND))?
                }
            };
            cam_id.push(entry);
            group1.push(CamGroupEntry::new([ids[0], ids[1], ids[2]])?);
            group2.push(CamGroupEntry::new([ids[3], ids[4], ids[5]])?);
        }
    }

    debug!(blocks = total, escalated, "Generated merge tables");
    Ok(MergeTables {
        blocks_per_row,
        height: map.height(),
        cam_id,
        group1,
        group2,
    })
}

/// Per-camera binary seed masks from a default-owner index map.
///
/// Returns `num_cameras` planes of `width * height` bytes: 255 where the camera is
/// the default owner of the pixel, 0 elsewhere.
pub fn generate_default_merge_mask(
    num_cameras: u32,
    width: usize,
    height: usize,
    default_camera: &[u8],
) -> Result<Vec<u8>> {
    generate_default_merge_mask_strided(num_cameras, width, height, default_camera, width)
}

/// Same as [`generate_default_merge_mask`] with a row stride of `stride` bytes.
pub fn generate_default_merge_mask_strided(
    num_cameras: u32,
    width: usize,
    height: usize,
    default_camera: &[u8],
    stride: usize,
) -> Result<Vec<u8>> {
    check_camera_count(num_cameras)?;
    if width == 0 || height == 0 {
        return Err(StitchError::InvalidDimensions(width, height));
    }
    if default_camera.len() != width * height {
        return Err(StitchError::ShapeMismatch {
            what: "default camera index map",
            expected: width * height,
            actual: default_camera.len(),
        });
    }
    check_stride("merge mask image", width, stride)?;

    let mut mask = vec![0u8; stride * height * num_cameras as usize];
    for (camera, plane) in mask.chunks_exact_mut(stride * height).enumerate() {
        for (row, src) in plane.chunks_exact_mut(stride).zip(default_camera.chunks_exact(width)) {
            for (dst, &owner) in row.iter_mut().zip(src) {
                *dst = if usize::from(owner) == camera { 255 } else { 0 };
            }
        }
    }
    Ok(mask)
}

fn strided_plane<T: Pod>(
    what: &'static str,
    entries: &[T],
    per_row: usize,
    height: usize,
    stride: usize,
) -> Result<Vec<u8>> {
    let row_bytes = per_row * size_of::<T>();
    check_stride(what, row_bytes, stride)?;
    let mut plane = vec![0u8; stride * height];
    for (dst, src) in plane.chunks_exact_mut(stride).zip(entries.chunks_exact(per_row)) {
        dst[..row_bytes].copy_from_slice(bytemuck::cast_slice(src));
    }
    Ok(plane)
}

fn check_stride(what: &'static str, row_bytes: usize, stride: usize) -> Result<()> {
    if stride < row_bytes {
        return Err(StitchError::ShapeMismatch {
            what,
            expected: row_bytes,
            actual: stride,
        });
    }
    Ok(())
}
