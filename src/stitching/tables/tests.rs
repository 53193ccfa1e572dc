#[cfg(test)]
mod tests {
    use crate::stitching::common::{CameraContributionMap, CameraSourceMap, SourceCoord, StitchError};
    use crate::stitching::tables::{
        CamIdEntry,
        CameraAtlas,
        INVALID_COORD,
        ValidPixelEntry,
        WarpRemapEntry,
        classify_map_block,
        fill_warp_tables,
        generate_default_merge_mask,
        generate_default_merge_mask_strided,
        generate_merge_tables,
        generate_warp_tables,
        largest_warp_table_size,
        smallest_warp_table_size,
    };

    /// Source coordinates equal to the output position plus a per-camera shift.
    fn identity_sources(num_cameras: u32, width: usize, height: usize) -> Vec<SourceCoord> {
        let mut coords = Vec::with_capacity(num_cameras as usize * width * height);
        for cam in 0..num_cameras {
            for y in 0..height {
                for x in 0..width {
                    coords.push(SourceCoord::new(x as f32 + cam as f32, y as f32));
                }
            }
        }
        coords
    }

    /// Deterministic pseudo-random camera masks.
    fn scrambled_masks(width: usize, height: usize, num_cameras: u32) -> Vec<u32> {
        let mut state = 0x2545_f491u32;
        (0..width * height)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state & ((1 << num_cameras) - 1)
            })
            .collect()
    }

    #[test]
    fn test_single_camera_full_coverage() {
        let (w, h) = (16, 8);
        let valid = vec![1u32; w * h];
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords = identity_sources(1, w, h);
        let sources = CameraSourceMap::new(w, h, 1, &coords).unwrap();

        let size = smallest_warp_table_size(1, &map).unwrap();
        assert_eq!(size, 64);

        let tables = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), size).unwrap();
        // one entry per block: 2 blocks per row, 8 rows
        assert_eq!(tables.entry_count, 16);
        assert!(tables.entries().all(|(v, _)| v.all_valid() && v.camera_id() == 0));
        assert!(tables.valid[16..].iter().all(ValidPixelEntry::is_sentinel));
        assert!(tables.remap[16..].iter().all(WarpRemapEntry::is_sentinel));
    }

    #[test]
    fn test_single_row_two_blocks() {
        let (w, h) = (16, 1);
        let valid = vec![1u32; w * h];
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords = identity_sources(1, w, h);
        let sources = CameraSourceMap::new(w, h, 1, &coords).unwrap();

        let size = smallest_warp_table_size(1, &map).unwrap();
        let tables = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), size).unwrap();
        assert_eq!(size, 64);
        assert_eq!(tables.entry_count, 2);
        assert_eq!(tables.valid.iter().filter(|v| v.is_sentinel()).count(), 62);
        let (first, remap) = tables.entries().next().unwrap();
        assert_eq!((first.dst_x(), first.dst_y()), (0, 0));
        // x = 3 -> 3 * 8 + 0.5 truncated
        assert_eq!(remap.coord(3), (24, 0));
        let (second, _) = tables.entries().nth(1).unwrap();
        assert_eq!(second.dst_x(), 1);
    }

    #[test]
    fn test_split_block_mirrors_invalid_pixels() {
        let valid = [1u32, 1, 1, 1, 2, 2, 2, 2];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let class = classify_map_block(&map, 0, 0, 0b11);
        assert_eq!(class.count, 2);
        assert_eq!(class.common_mask, 0);

        let coords = identity_sources(2, 8, 1);
        let sources = CameraSourceMap::new(8, 1, 2, &coords).unwrap();
        let tables = generate_warp_tables(2, &map, &sources, CameraAtlas::default(), 64).unwrap();
        assert_eq!(tables.entry_count, 2);

        let (cam0, remap0) = (tables.valid[0], tables.remap[0]);
        let (cam1, remap1) = (tables.valid[1], tables.remap[1]);
        assert_eq!(cam0.camera_id(), 0);
        assert_eq!(cam1.camera_id(), 1);
        assert!(!cam0.all_valid());
        assert!(!cam1.all_valid());
        for px in 0..4 {
            assert!(remap0.is_pixel_valid(px));
            assert_eq!(remap1.coord(px), (INVALID_COORD, INVALID_COORD));
        }
        for px in 4..8 {
            assert_eq!(remap0.coord(px), (INVALID_COORD, INVALID_COORD));
            assert!(remap1.is_pixel_valid(px));
        }
    }

    #[test]
    fn test_remap_beyond_q3_range_is_invalid() {
        let valid = [1u32; 8];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let mut coords = identity_sources(1, 8, 1);
        coords[0] = SourceCoord::new(8191.9, 0.0);
        coords[1] = SourceCoord::new(2.0, 8200.0);
        let sources = CameraSourceMap::new(8, 1, 1, &coords).unwrap();

        let tables = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), 64).unwrap();
        let (entry, remap) = (tables.valid[0], tables.remap[0]);
        assert_eq!(tables.entry_count, 1);
        assert!(!entry.all_valid());
        assert_eq!(remap.coord(0), (INVALID_COORD, INVALID_COORD));
        assert_eq!(remap.coord(1), (INVALID_COORD, INVALID_COORD));
        assert_eq!(remap.coord(2), (16, 0));
    }

    #[test]
    fn test_remap_negative_source_is_invalid() {
        let valid = [1u32; 8];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let mut coords = identity_sources(1, 8, 1);
        coords[0] = SourceCoord::new(-3.0, 0.0);
        coords[1] = SourceCoord::new(f32::NAN, 0.0);
        coords[2] = SourceCoord::new(-0.05, 0.0);
        let sources = CameraSourceMap::new(8, 1, 1, &coords).unwrap();

        let tables = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), 64).unwrap();
        let (entry, remap) = (tables.valid[0], tables.remap[0]);
        assert!(!entry.all_valid());
        assert!(!remap.is_pixel_valid(0));
        assert!(!remap.is_pixel_valid(1));
        // -0.05 * 8 + 0.5 = 0.1 still rounds onto the first texel
        assert_eq!(remap.coord(2), (0, 0));
        assert_eq!(remap.coord(3), (24, 0));
    }

    #[test]
    fn test_warp_fill_is_deterministic() {
        let (w, h, cams) = (40, 12, 4);
        let valid = scrambled_masks(w, h, cams);
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords = identity_sources(cams, w, h);
        let sources = CameraSourceMap::new(w, h, cams, &coords).unwrap();
        let size = smallest_warp_table_size(cams, &map).unwrap();

        let first = generate_warp_tables(cams, &map, &sources, CameraAtlas::new(2, 64), size).unwrap();
        let second = generate_warp_tables(cams, &map, &sources, CameraAtlas::new(2, 64), size).unwrap();
        assert_eq!(first.valid_bytes(), second.valid_bytes());
        assert_eq!(first.remap_bytes(), second.remap_bytes());
    }

    #[test]
    fn test_sizing_bounds_hold_for_random_maps() {
        for (w, h, cams) in [(8, 1, 1), (24, 5, 3), (33, 7, 6), (64, 16, 31)] {
            let valid = scrambled_masks(w, h, cams.min(16));
            let map = CameraContributionMap::new(w, h, &valid).unwrap();
            let smallest = smallest_warp_table_size(cams, &map).unwrap();
            let largest = largest_warp_table_size(cams, w, h).unwrap();
            assert_eq!(smallest % 64, 0);
            assert!(smallest <= largest.div_ceil(64) * 64);
        }
    }

    #[test]
    fn test_exact_size_fills_without_overflow() {
        let (w, h, cams) = (48, 9, 5);
        let valid = scrambled_masks(w, h, cams);
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords = identity_sources(cams, w, h);
        let sources = CameraSourceMap::new(w, h, cams, &coords).unwrap();
        let size = smallest_warp_table_size(cams, &map).unwrap();

        let tables = generate_warp_tables(cams, &map, &sources, CameraAtlas::default(), size).unwrap();
        assert!(tables.entry_count <= size);
        assert!(size - tables.entry_count < 64);
        assert!(tables.valid[..tables.entry_count].iter().all(|v| !v.is_sentinel()));
        assert!(tables.valid[tables.entry_count..].iter().all(ValidPixelEntry::is_sentinel));
    }

    #[test]
    fn test_capacity_exceeded_reports_required_size() {
        let (w, h) = (64, 4);
        let valid = vec![0b11u32; w * h];
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords = identity_sources(2, w, h);
        let sources = CameraSourceMap::new(w, h, 2, &coords).unwrap();

        let result = generate_warp_tables(2, &map, &sources, CameraAtlas::default(), 10);
        assert!(matches!(
            result.unwrap_err(),
            StitchError::CapacityExceeded { required: 64, capacity: 10 }
        ));
    }

    #[test]
    fn test_fill_into_caller_buffers() {
        let valid_map = vec![1u32; 8];
        let map = CameraContributionMap::new(8, 1, &valid_map).unwrap();
        let coords = identity_sources(1, 8, 1);
        let sources = CameraSourceMap::new(8, 1, 1, &coords).unwrap();

        let mut valid = vec![ValidPixelEntry::new(3, false, 9, 9).unwrap(); 4];
        let mut remap = vec![WarpRemapEntry::from_coords([(1, 1); 8]); 4];
        let count = fill_warp_tables(1, &map, &sources, CameraAtlas::default(), &mut valid, &mut remap).unwrap();
        assert_eq!(count, 1);
        assert!(valid[1..].iter().all(ValidPixelEntry::is_sentinel));
        assert!(remap[1..].iter().all(WarpRemapEntry::is_sentinel));

        let mut short_remap = vec![WarpRemapEntry::SENTINEL; 3];
        let result = fill_warp_tables(1, &map, &sources, CameraAtlas::default(), &mut valid, &mut short_remap);
        assert!(matches!(result.unwrap_err(), StitchError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_atlas_column_offset() {
        let valid = vec![0b10u32; 8];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let coords = vec![SourceCoord::new(1.0, 2.0); 16];
        let sources = CameraSourceMap::new(8, 1, 2, &coords).unwrap();

        let tables = generate_warp_tables(2, &map, &sources, CameraAtlas::new(2, 100), 64).unwrap();
        let (entry, remap) = tables.entries().next().unwrap();
        assert_eq!(entry.camera_id(), 1);
        // camera 1 sits in the second column: (1 * 100) * 8 added to x
        assert_eq!(remap.coord(0), (8 + 800, 16));
    }

    #[test]
    fn test_padded_pixels_count_as_covered() {
        let valid = [1u32, 1, 1, 1, 0, 0, 0, 0];
        let padded = [0u32, 0, 0, 0, 1, 1, 1, 1];
        let map = CameraContributionMap::new(8, 1, &valid)
            .unwrap()
            .with_padded(&padded)
            .unwrap();
        let coords = identity_sources(1, 8, 1);
        let sources = CameraSourceMap::new(8, 1, 1, &coords).unwrap();
        let tables = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), 64).unwrap();
        assert!(tables.valid[0].all_valid());

        let merge = generate_merge_tables(1, &map).unwrap();
        assert_eq!(merge.cam_id[0].single_camera(), Some(0));
    }

    #[test]
    fn test_merge_single_and_empty_blocks() {
        let mut valid = vec![0u32; 16];
        valid[..8].fill(0b100);
        let map = CameraContributionMap::new(16, 1, &valid).unwrap();
        let merge = generate_merge_tables(3, &map).unwrap();
        assert_eq!(merge.blocks_per_row, 2);
        assert_eq!(merge.cam_id[0].single_camera(), Some(2));
        assert!(merge.cam_id[1].is_none());
        assert_eq!(merge.cameras_at(0, 0), vec![2]);
        assert!(merge.cameras_at(1, 0).is_empty());
    }

    #[test]
    fn test_merge_partial_single_camera_uses_blend_path() {
        let valid = [0u32, 0, 2, 2, 2, 2, 2, 2];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let merge = generate_merge_tables(2, &map).unwrap();
        let (cam_id, g1, g2) = merge.at(0, 0);
        assert_eq!(cam_id.raw(), 128);
        assert_eq!(g1.ids(), [1, 31, 31]);
        assert_eq!(g2.ids(), [31, 31, 31]);
        assert_eq!(merge.cameras_at(0, 0), vec![1]);
    }

    #[test]
    fn test_merge_blend_truncates_to_six_lowest() {
        let valid = vec![0b11_1111_1111u32; 8];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let merge = generate_merge_tables(10, &map).unwrap();
        let (cam_id, g1, g2) = merge.at(0, 0);
        assert_eq!(cam_id.blend_count(), Some(6));
        assert_eq!(cam_id.raw(), CamIdEntry::BLEND_BASE + 6);
        assert_eq!(g1.ids(), [0, 1, 2]);
        assert_eq!(g2.ids(), [3, 4, 5]);
    }

    #[test]
    fn test_merge_three_camera_blend() {
        let valid = [0b1001u32, 0b1001, 0b0011, 0b0011, 0b1000, 0b1000, 0b1000, 0b1000];
        let map = CameraContributionMap::new(8, 1, &valid).unwrap();
        let merge = generate_merge_tables(4, &map).unwrap();
        let (cam_id, g1, g2) = merge.at(0, 0);
        assert_eq!(cam_id.blend_count(), Some(3));
        assert_eq!(g1.ids(), [0, 1, 3]);
        assert_eq!(g2.ids(), [31, 31, 31]);
    }

    #[test]
    fn test_merge_strided_planes() {
        let valid = vec![1u32; 16 * 2];
        let map = CameraContributionMap::new(16, 2, &valid).unwrap();
        let merge = generate_merge_tables(1, &map).unwrap();

        let cam_plane = merge.cam_id_plane(4).unwrap();
        assert_eq!(cam_plane, vec![0, 0, 0, 0, 0, 0, 0, 0]);
        let group_plane = merge.group1_plane(8).unwrap();
        assert_eq!(&group_plane[..8], &[31, 31, 31, 0, 31, 31, 31, 0]);
        assert!(matches!(
            merge.group2_plane(4).unwrap_err(),
            StitchError::ShapeMismatch { expected: 8, actual: 4, .. }
        ));
    }

    #[test]
    fn test_default_merge_mask() {
        let owners = [0u8, 1, 255, 1];
        let mask = generate_default_merge_mask(2, 2, 2, &owners).unwrap();
        assert_eq!(mask, vec![255, 0, 0, 0, 0, 255, 0, 255]);

        let strided = generate_default_merge_mask_strided(2, 2, 2, &owners, 3).unwrap();
        assert_eq!(strided.len(), 12);
        assert_eq!(&strided[..6], &[255, 0, 0, 0, 0, 0]);
        assert_eq!(&strided[6..], &[0, 255, 0, 0, 255, 0]);
    }

    #[test]
    fn test_default_merge_mask_shape_errors() {
        assert!(matches!(
            generate_default_merge_mask(2, 2, 2, &[0u8; 3]).unwrap_err(),
            StitchError::ShapeMismatch { .. }
        ));
        assert!(matches!(
            generate_default_merge_mask(0, 2, 2, &[0u8; 4]).unwrap_err(),
            StitchError::InvalidCameraCount(0)
        ));
    }
}
