use tracing::{debug, instrument};

use crate::stitching::common::{
    BLOCK_WIDTH,
    CameraContributionMap,
    Result,
    StitchError,
    camera_mask,
    check_camera_count,
};

use super::classifier::classify_map_block;

/// Allocation granularity of the tight warp table size.
pub const TABLE_SIZE_ALIGNMENT: usize = 64;

/// Upper bound on warp table entries: every block may need an entry for every camera.
pub fn largest_warp_table_size(num_cameras: u32, width: usize, height: usize) -> Result<usize> {
    check_camera_count(num_cameras)?;
    if width == 0 || height == 0 {
        return Err(StitchError::InvalidDimensions(width, height));
    }
    Ok(width.div_ceil(BLOCK_WIDTH) * height * num_cameras as usize)
}

/// Tight warp table size: one entry per (block, camera) pair that actually touches,
/// rounded up to a multiple of [`TABLE_SIZE_ALIGNMENT`].
#[instrument(skip(map), fields(width = map.width(), height = map.height()))]
pub fn smallest_warp_table_size(num_cameras: u32, map: &CameraContributionMap<'_>) -> Result<usize> {
    check_camera_count(num_cameras)?;
    let cameras = camera_mask(num_cameras);

    let mut entries = 0usize;
    for y in 0..map.height() {
        for block_x in 0..map.blocks_per_row() {
            entries += classify_map_block(map, block_x, y, cameras).count as usize;
        }
    }

    let size = align_up(entries);
    debug!(entries, size, "Computed smallest warp table size");
    Ok(size)
}

fn align_up(n: usize) -> usize {
    (n + TABLE_SIZE_ALIGNMENT - 1) & !(TABLE_SIZE_ALIGNMENT - 1)
}
