use tracing::{debug, instrument, warn};

use crate::stitching::common::{
    BLOCK_WIDTH,
    CameraContributionMap,
    CameraSourceMap,
    Result,
    StitchError,
    camera_mask,
    check_camera_count,
};

use super::classifier::classify_block;
use super::types::{INVALID_COORD, ValidPixelEntry, WarpRemapEntry};

/// Fixed-point scale of remap coordinates (3 fractional bits).
pub const COORD_SCALE: f32 = 8.0;

const MAX_BLOCK_COLUMNS: usize = 1 << 11;
const MAX_ROWS: usize = 1 << 13;

/// Layout of the camera images inside the warp input atlas.
///
/// Camera `i` sits in column `i % columns` and row `i / columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraAtlas {
    pub columns: u32,
    pub camera_width: u32,
}

impl CameraAtlas {
    pub fn new(columns: u32, camera_width: u32) -> Self {
        Self { columns, camera_width }
    }

    /// Source x offset of a camera tile, already in Q3 units.
    fn x_offset(&self, camera: u32) -> f32 {
        ((camera % self.columns) * self.camera_width) as f32 * COORD_SCALE
    }
}

impl Default for CameraAtlas {
    fn default() -> Self {
        Self {
            columns: 1,
            camera_width: 0,
        }
    }
}

/// Paired warp tables of a fixed capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpTables {
    pub valid: Vec<ValidPixelEntry>,
    pub remap: Vec<WarpRemapEntry>,
    /// Number of real (non-sentinel) entries at the front of both tables.
    pub entry_count: usize,
}

impl WarpTables {
    pub fn capacity(&self) -> usize {
        self.valid.len()
    }

    /// Real entries, in fill order.
    pub fn entries(&self) -> impl Iterator<Item = (&ValidPixelEntry, &WarpRemapEntry)> {
        self.valid
            .iter()
            .zip(self.remap.iter())
            .take(self.entry_count)
    }

    pub fn valid_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.valid)
    }

    pub fn remap_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.remap)
    }
}

/// Allocate tables of `capacity` entries and fill them.
pub fn generate_warp_tables(
    num_cameras: u32,
    map: &CameraContributionMap<'_>,
    sources: &CameraSourceMap<'_>,
    atlas: CameraAtlas,
    capacity: usize,
) -> Result<WarpTables> {
    let mut valid = vec![ValidPixelEntry::SENTINEL; capacity];
    let mut remap = vec![WarpRemapEntry::SENTINEL; capacity];
    let entry_count = fill_warp_tables(num_cameras, map, sources, atlas, &mut valid, &mut remap)?;
    Ok(WarpTables {
        valid,
        remap,
        entry_count,
    })
}

/// Fill caller-owned warp tables and return the number of real entries.
///
/// Cameras are visited in the outer loop, then rows, then blocks. Slots past the
/// last real entry are stamped with sentinels. When the tables are too small the
/// pass keeps counting so the error reports the size actually required.
#[instrument(skip_all, fields(num_cameras = num_cameras, capacity = valid.len()))]
pub fn fill_warp_tables(
    num_cameras: u32,
    map: &CameraContributionMap<'_>,
    sources: &CameraSourceMap<'_>,
    atlas: CameraAtlas,
    valid: &mut [ValidPixelEntry],
    remap: &mut [WarpRemapEntry],
) -> Result<usize> {
    check_camera_count(num_cameras)?;
    check_inputs(num_cameras, map, sources, atlas, valid.len(), remap.len())?;

    let capacity = valid.len();
    let cameras = camera_mask(num_cameras);
    let mut count = 0usize;

    for camera in 0..num_cameras {
        let bit = 1u32 << camera;
        let x_offset = atlas.x_offset(camera);
        for y in 0..map.height() {
            for block_x in 0..map.blocks_per_row() {
                let masks = map.block_masks(block_x, y, cameras);
                let class = classify_block(&masks);
                if class.or_mask & bit == 0 {
                    continue;
                }
                if count < capacity {
                    let entry = remap_entry(sources, camera, block_x, y, &masks, bit, x_offset);
                    let all_valid = class.common_mask & bit != 0 && (0..BLOCK_WIDTH).all(|i| entry.is_pixel_valid(i));
                    valid[count] = ValidPixelEntry::new(camera, all_valid, block_x as u32, y as u32)?;
                    remap[count] = entry;
                }
                count += 1;
            }
        }
    }

    if count > capacity {
        warn!(required = count, capacity, "Warp table capacity exceeded");
        return Err(StitchError::CapacityExceeded {
            required: count,
            capacity,
        });
    }

    valid[count..].fill(ValidPixelEntry::SENTINEL);
    remap[count..].fill(WarpRemapEntry::SENTINEL);
    debug!(entries = count, padding = capacity - count, "Filled warp tables");
    Ok(count)
}

fn remap_entry(
    sources: &CameraSourceMap<'_>,
    camera: u32,
    block_x: usize,
    y: usize,
    masks: &[u32; BLOCK_WIDTH],
    bit: u32,
    x_offset: f32,
) -> WarpRemapEntry {
    let mut coords = [(INVALID_COORD, INVALID_COORD); BLOCK_WIDTH];
    for (i, coord) in coords.iter_mut().enumerate() {
        if masks[i] & bit == 0 {
            continue;
        }
        let src = sources.coord(camera, block_x * BLOCK_WIDTH + i, y);
        let x = quantize(src.x * COORD_SCALE + 0.5 + x_offset);
        let y = quantize(src.y * COORD_SCALE + 0.5);
        if let (Some(x), Some(y)) = (x, y) {
            *coord = (x, y);
        }
    }
    WarpRemapEntry::from_coords(coords)
}

/// Truncate a biased Q3 value to u16. Values outside `0..INVALID_COORD`
/// (and NaN) have no representation and leave the sub-pixel invalid.
fn quantize(value: f32) -> Option<u16> {
    (value >= 0.0 && value < INVALID_COORD as f32).then(|| value as u16)
}

fn check_inputs(
    num_cameras: u32,
    map: &CameraContributionMap<'_>,
    sources: &CameraSourceMap<'_>,
    atlas: CameraAtlas,
    valid_len: usize,
    remap_len: usize,
) -> Result<()> {
    if map.blocks_per_row() > MAX_BLOCK_COLUMNS || map.height() > MAX_ROWS {
        return Err(StitchError::InvalidDimensions(map.width(), map.height()));
    }
    if atlas.columns == 0 {
        return Err(StitchError::UnsupportedConfiguration(
            "camera atlas needs at least one column".to_string(),
        ));
    }
    let shape_checks = [
        ("source map width", map.width(), sources.width()),
        ("source map height", map.height(), sources.height()),
        ("source map cameras", num_cameras as usize, sources.num_cameras() as usize),
        ("warp remap table", valid_len, remap_len),
    ];
    for (what, expected, actual) in shape_checks {
        if expected != actual {
            return Err(StitchError::ShapeMismatch {
                what,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
