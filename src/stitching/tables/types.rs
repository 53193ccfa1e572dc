//! Table record types handed to the warp and merge kernels

use bytemuck::{Pod, Zeroable};

use crate::stitching::common::{MAX_CAMERAS, Result, StitchError};

/// Coordinate value marking a sub-pixel without a valid source.
pub const INVALID_COORD: u16 = 0xFFFF;

const DST_X_MAX: u32 = (1 << 11) - 1;
const DST_Y_MAX: u32 = (1 << 13) - 1;

/// Warp-stage block record, packed little-endian into one `u32`:
/// bits 0-4 camera id, bit 5 all-valid flag, bits 8-18 block column, bits 19-31 row.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ValidPixelEntry(u32);

impl ValidPixelEntry {
    pub const SENTINEL: Self = Self(0xFFFF_FFFF);

    pub fn new(camera_id: u32, all_valid: bool, dst_x: u32, dst_y: u32) -> Result<Self> {
        if camera_id >= MAX_CAMERAS {
            return Err(StitchError::FieldOutOfRange {
                field: "camId",
                value: camera_id,
                max: MAX_CAMERAS - 1,
            });
        }
        if dst_x > DST_X_MAX {
            return Err(StitchError::FieldOutOfRange {
                field: "dstX",
                value: dst_x,
                max: DST_X_MAX,
            });
        }
        if dst_y > DST_Y_MAX {
            return Err(StitchError::FieldOutOfRange {
                field: "dstY",
                value: dst_y,
                max: DST_Y_MAX,
            });
        }
        Ok(Self(camera_id | (u32::from(all_valid) << 5) | (dst_x << 8) | (dst_y << 19)))
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    pub fn camera_id(&self) -> u32 {
        self.0 & 0x1f
    }

    pub fn all_valid(&self) -> bool {
        (self.0 >> 5) & 1 == 1
    }

    pub fn dst_x(&self) -> u32 {
        (self.0 >> 8) & DST_X_MAX
    }

    pub fn dst_y(&self) -> u32 {
        (self.0 >> 19) & DST_Y_MAX
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for ValidPixelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_sentinel() {
            return f.write_str("ValidPixelEntry(SENTINEL)");
        }
        f.debug_struct("ValidPixelEntry")
            .field("camera_id", &self.camera_id())
            .field("all_valid", &self.all_valid())
            .field("dst_x", &self.dst_x())
            .field("dst_y", &self.dst_y())
            .finish()
    }
}

/// Eight Q3 fixed-point `(x, y)` source coordinates, stored interleaved as
/// `[x0, y0, x1, y1, ...]` so the kernel reads pixel `i` as one `uint`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct WarpRemapEntry([u16; 16]);

impl WarpRemapEntry {
    pub const SENTINEL: Self = Self([INVALID_COORD; 16]);

    pub fn from_coords(coords: [(u16, u16); 8]) -> Self {
        let mut values = [0u16; 16];
        for (i, (x, y)) in coords.into_iter().enumerate() {
            values[2 * i] = x;
            values[2 * i + 1] = y;
        }
        Self(values)
    }

    pub fn coord(&self, pixel: usize) -> (u16, u16) {
        (self.0[2 * pixel], self.0[2 * pixel + 1])
    }

    pub fn is_pixel_valid(&self, pixel: usize) -> bool {
        self.coord(pixel) != (INVALID_COORD, INVALID_COORD)
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

/// Merge-stage per-block camera selection byte.
///
/// `0..=30` is a single camera, 31 is no camera, `126 + n` is a blend of `n` cameras
/// listed in the paired group entries.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct CamIdEntry(u8);

impl CamIdEntry {
    pub const NONE: Self = Self(31);
    pub const BLEND_BASE: u8 = 126;
    pub const MAX_BLEND: usize = 6;

    pub fn single(camera_id: u32) -> Result<Self> {
        if camera_id >= MAX_CAMERAS {
            return Err(StitchError::FieldOutOfRange {
                field: "camId",
                value: camera_id,
                max: MAX_CAMERAS - 1,
            });
        }
        Ok(Self(camera_id as u8))
    }

    pub fn blend(count: usize) -> Result<Self> {
        if !(2..=Self::MAX_BLEND).contains(&count) {
            return Err(StitchError::FieldOutOfRange {
                field: "blendCount",
                value: count as u32,
                max: Self::MAX_BLEND as u32,
            });
        }
        Ok(Self(Self::BLEND_BASE + count as u8))
    }

    pub fn raw(&self) -> u8 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Camera id when a single camera owns the block.
    pub fn single_camera(&self) -> Option<u32> {
        (self.0 < 31).then_some(u32::from(self.0))
    }

    /// Number of blended cameras, if this is a blend record.
    pub fn blend_count(&self) -> Option<usize> {
        (self.0 > Self::BLEND_BASE + 1 && self.0 <= Self::BLEND_BASE + Self::MAX_BLEND as u8)
            .then(|| usize::from(self.0 - Self::BLEND_BASE))
    }
}

impl std::fmt::Debug for CamIdEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.single_camera(), self.blend_count()) {
            (Some(cam), _) => write!(f, "CamIdEntry::Single({cam})"),
            (None, Some(n)) => write!(f, "CamIdEntry::Blend({n})"),
            _ if self.is_none() => f.write_str("CamIdEntry::None"),
            _ => write!(f, "CamIdEntry({})", self.0),
        }
    }
}

/// Three blend camera ids plus one pad byte. Unused slots hold 31.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct CamGroupEntry([u8; 4]);

impl CamGroupEntry {
    pub const EMPTY: Self = Self([31, 31, 31, 0]);

    pub fn new(ids: [u8; 3]) -> Result<Self> {
        for &id in &ids {
            if u32::from(id) > MAX_CAMERAS {
                return Err(StitchError::FieldOutOfRange {
                    field: "groupCamId",
                    value: u32::from(id),
                    max: MAX_CAMERAS,
                });
            }
        }
        Ok(Self([ids[0], ids[1], ids[2], 0]))
    }

    pub fn ids(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl Default for CamGroupEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pixel_entry_bit_layout() {
        let entry = ValidPixelEntry::new(5, true, 3, 7).unwrap();
        assert_eq!(entry.raw(), 5 | (1 << 5) | (3 << 8) | (7 << 19));
        assert_eq!(entry.camera_id(), 5);
        assert!(entry.all_valid());
        assert_eq!(entry.dst_x(), 3);
        assert_eq!(entry.dst_y(), 7);
        assert!(!entry.is_sentinel());
    }

    #[test]
    fn test_valid_pixel_entry_rejects_out_of_range_fields() {
        assert!(matches!(
            ValidPixelEntry::new(31, false, 0, 0),
            Err(StitchError::FieldOutOfRange { field: "camId", .. })
        ));
        assert!(matches!(
            ValidPixelEntry::new(0, false, 2048, 0),
            Err(StitchError::FieldOutOfRange { field: "dstX", .. })
        ));
        assert!(matches!(
            ValidPixelEntry::new(0, false, 0, 8192),
            Err(StitchError::FieldOutOfRange { field: "dstY", .. })
        ));
        let max = ValidPixelEntry::new(30, true, 2047, 8191).unwrap();
        assert_eq!(max.dst_x(), 2047);
        assert_eq!(max.dst_y(), 8191);
    }

    #[test]
    fn test_record_sizes_match_kernel_layout() {
        assert_eq!(std::mem::size_of::<ValidPixelEntry>(), 4);
        assert_eq!(std::mem::size_of::<WarpRemapEntry>(), 32);
        assert_eq!(std::mem::size_of::<CamIdEntry>(), 1);
        assert_eq!(std::mem::size_of::<CamGroupEntry>(), 4);
    }

    #[test]
    fn test_remap_entry_interleaves_pairs() {
        let mut coords = [(INVALID_COORD, INVALID_COORD); 8];
        coords[0] = (10, 20);
        coords[1] = (11, 21);
        let entry = WarpRemapEntry::from_coords(coords);
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&entry));
        assert_eq!(words[0], 10 | (20 << 16));
        assert_eq!(words[1], 11 | (21 << 16));
        assert!(entry.is_pixel_valid(1));
        assert!(!entry.is_pixel_valid(2));
    }

    #[test]
    fn test_cam_id_entry_encodings() {
        assert_eq!(CamIdEntry::single(4).unwrap().single_camera(), Some(4));
        assert!(CamIdEntry::single(31).is_err());
        let blend = CamIdEntry::blend(6).unwrap();
        assert_eq!(blend.raw(), 132);
        assert_eq!(blend.blend_count(), Some(6));
        assert!(CamIdEntry::blend(1).is_err());
        assert!(CamIdEntry::blend(7).is_err());
        assert!(CamIdEntry::NONE.is_none());
        assert_eq!(CamIdEntry::NONE.single_camera(), None);
    }

    #[test]
    fn test_cam_group_entry_pad_byte() {
        let group = CamGroupEntry::new([1, 2, 31]).unwrap();
        assert_eq!(bytemuck::bytes_of(&group), &[1, 2, 31, 0]);
        assert!(CamGroupEntry::new([32, 0, 0]).is_err());
    }
}
