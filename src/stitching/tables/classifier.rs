use crate::stitching::common::{BLOCK_WIDTH, CameraContributionMap};

use super::types::CamIdEntry;

/// Reduction of the eight pixel masks of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockClass {
    /// Cameras touching at least one pixel of the block.
    pub or_mask: u32,
    /// Cameras covering every pixel of the block.
    pub common_mask: u32,
    /// Population count of `or_mask`.
    pub count: u32,
}

impl BlockClass {
    /// A lone camera that does not cover the whole block.
    pub fn is_escalated(&self) -> bool {
        self.count == 1 && self.common_mask == 0
    }

    /// Camera count used for the single/blend decision.
    ///
    /// The single-camera fast path assumes full coverage, so a partially covered
    /// lone camera is promoted to the two-camera blend path.
    pub fn effective_count(&self) -> u32 {
        if self.is_escalated() { 2 } else { self.count }
    }

    /// Contributing camera ids in ascending order, at most six.
    pub fn blend_ids(&self) -> impl Iterator<Item = u32> {
        let mask = self.or_mask;
        (0..32u32)
            .filter(move |bit| mask & (1u32 << *bit) != 0)
            .take(CamIdEntry::MAX_BLEND)
    }
}

/// Classify a block from its (valid | padded) pixel masks.
pub fn classify_block(masks: &[u32; BLOCK_WIDTH]) -> BlockClass {
    let or_mask = masks.iter().fold(0, |acc, m| acc | m);
    let common_mask = masks.iter().fold(u32::MAX, |acc, m| acc & m);
    BlockClass {
        or_mask,
        common_mask,
        count: or_mask.count_ones(),
    }
}

/// Classify block `block_x` of row `y`, ignoring cameras outside `camera_mask`.
pub fn classify_map_block(
    map: &CameraContributionMap<'_>,
    block_x: usize,
    y: usize,
    camera_mask: u32,
) -> BlockClass {
    classify_block(&map.block_masks(block_x, y, camera_mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block() {
        let class = classify_block(&[0; 8]);
        assert_eq!(class.count, 0);
        assert_eq!(class.effective_count(), 0);
        assert_eq!(class.blend_ids().count(), 0);
    }

    #[test]
    fn test_fully_covered_single_camera() {
        let class = classify_block(&[0b100; 8]);
        assert_eq!(class.count, 1);
        assert_eq!(class.common_mask, 0b100);
        assert!(!class.is_escalated());
        assert_eq!(class.effective_count(), 1);
    }

    #[test]
    fn test_partially_covered_single_camera_escalates() {
        let class = classify_block(&[1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(class.count, 1);
        assert_eq!(class.common_mask, 0);
        assert!(class.is_escalated());
        assert_eq!(class.effective_count(), 2);
    }

    #[test]
    fn test_split_block_has_no_common_camera() {
        let class = classify_block(&[1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(class.count, 2);
        assert_eq!(class.common_mask, 0);
        assert_eq!(class.blend_ids().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_blend_ids_keep_six_lowest() {
        let class = classify_block(&[0b1_1111_1111; 8]);
        assert_eq!(class.count, 9);
        assert_eq!(class.blend_ids().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }
}
