#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tiff::decoder::{Decoder, DecodingResult};

    use crate::stitching::common::{CameraContributionMap, CameraSourceMap, SourceCoord, StitchError};
    use crate::stitching::export::table_dump::{
        CAM_GROUP1_FILE,
        CAM_ID_FILE,
        VALID_PIX_FILE,
        WARP_REMAP_FILE,
    };
    use crate::stitching::export::{
        MaskCompression,
        MaskExportConfig,
        MaskStack,
        MaskWriter,
        TiffMaskWriter,
        dump_merge_tables,
        dump_warp_tables,
        remap_table_bytes,
        valid_table_bytes,
    };
    use crate::stitching::tables::{CameraAtlas, generate_merge_tables, generate_warp_tables};

    fn two_camera_masks() -> Vec<u8> {
        // 4x2 planes, camera 0 owns the left half
        let mut data = vec![255, 255, 0, 0, 255, 255, 0, 0];
        data.extend([0, 0, 255, 255, 0, 0, 255, 255]);
        data
    }

    #[test]
    fn test_export_config_builder() {
        let config = MaskExportConfig::builder()
            .compression(MaskCompression::DeflateBest)
            .predictor(Some(2))
            .build();

        assert!(matches!(config.compression, MaskCompression::DeflateBest));
        assert_eq!(config.predictor, Some(2));

        let default = MaskExportConfig::builder().build();
        assert_eq!(default, MaskExportConfig::default());
    }

    #[test]
    fn test_mask_stack_shape() {
        let data = two_camera_masks();
        assert!(MaskStack::new(4, 2, 2, &data).is_ok());
        assert!(matches!(
            MaskStack::new(4, 2, 3, &data),
            Err(StitchError::ShapeMismatch { expected: 24, actual: 16, .. })
        ));
        assert!(matches!(
            MaskStack::with_stride(4, 2, 3, 2, &data),
            Err(StitchError::InvalidDimensions(4, 2))
        ));
    }

    #[test]
    fn test_mask_stack_strips_stride_padding() {
        let data = [1u8, 2, 9, 3, 4, 9, 5, 6, 9, 7, 8, 9];
        let stack = MaskStack::with_stride(2, 2, 3, 2, &data).unwrap();
        assert_eq!(stack.plane(0), vec![1, 2, 3, 4]);
        assert_eq!(stack.plane(1), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_tiff_writer_one_page_per_camera() {
        let data = two_camera_masks();
        let stack = MaskStack::new(4, 2, 2, &data).unwrap();
        let mut output = Vec::new();
        TiffMaskWriter
            .write_masks(&stack, &mut output, &MaskExportConfig::default())
            .unwrap();

        let mut decoder = Decoder::new(Cursor::new(output)).unwrap();
        let mut pages = Vec::new();
        loop {
            assert_eq!(decoder.dimensions().unwrap(), (4, 2));
            match decoder.read_image().unwrap() {
                DecodingResult::U8(pixels) => pages.push(pixels),
                _ => panic!("expected 8-bit pages"),
            }
            if !decoder.more_images() {
                break;
            }
            decoder.next_image().unwrap();
        }
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], data[..8]);
        assert_eq!(pages[1], data[8..]);
    }

    #[test]
    fn test_tiff_writer_compression_methods() {
        let data = vec![255u8; 64 * 64 * 2];
        let stack = MaskStack::new(64, 64, 2, &data).unwrap();

        let mut raw = Vec::new();
        let uncompressed = MaskExportConfig::builder().compression(MaskCompression::None).build();
        TiffMaskWriter.write_masks(&stack, &mut raw, &uncompressed).unwrap();

        for compression in [MaskCompression::Lzw, MaskCompression::DeflateFast, MaskCompression::DeflateBalanced] {
            let mut packed = Vec::new();
            let config = MaskExportConfig::builder().compression(compression).predictor(Some(2)).build();
            TiffMaskWriter.write_masks(&stack, &mut packed, &config).unwrap();
            assert!(packed.len() < raw.len(), "{compression:?}");
        }
    }

    #[test]
    fn test_table_dumps() {
        let (w, h) = (16, 1);
        let valid = vec![1u32; w * h];
        let map = CameraContributionMap::new(w, h, &valid).unwrap();
        let coords: Vec<SourceCoord> = (0..w).map(|x| SourceCoord::new(x as f32, 0.0)).collect();
        let sources = CameraSourceMap::new(w, h, 1, &coords).unwrap();
        let warp = generate_warp_tables(1, &map, &sources, CameraAtlas::default(), 64).unwrap();
        let merge = generate_merge_tables(1, &map).unwrap();

        let valid_bytes = valid_table_bytes(&warp);
        assert_eq!(valid_bytes.len(), 64 * 4);
        // second block: dstX = 1 in bits 8-18, all-valid bit set
        assert_eq!(valid_bytes[4..8], [0x20, 0x01, 0x00, 0x00]);
        assert!(valid_bytes[8..].iter().all(|&b| b == 0xFF));

        let remap_bytes = remap_table_bytes(&warp);
        assert_eq!(remap_bytes.len(), 64 * 32);
        // pixel 1 of block 0 samples x = 1.0 -> 8 + 0.5 truncated
        assert_eq!(remap_bytes[4..8], [8, 0, 0, 0]);

        let dir = tempfile::tempdir().unwrap();
        let warp_files = dump_warp_tables(&warp, dir.path()).unwrap();
        assert_eq!(warp_files, vec![dir.path().join(VALID_PIX_FILE), dir.path().join(WARP_REMAP_FILE)]);
        assert_eq!(std::fs::read(&warp_files[0]).unwrap(), valid_bytes);

        let merge_files = dump_merge_tables(&merge, 4, dir.path()).unwrap();
        assert_eq!(merge_files[0], dir.path().join(CAM_ID_FILE));
        assert_eq!(std::fs::read(&merge_files[0]).unwrap(), vec![0, 0, 0, 0]);
        let group1 = std::fs::read(dir.path().join(CAM_GROUP1_FILE)).unwrap();
        assert_eq!(group1.len(), 16);
        assert_eq!(group1[..4], [31, 31, 31, 0]);
    }

    #[test]
    fn test_merge_dump_rejects_narrow_stride() {
        let valid = vec![1u32; 32];
        let map = CameraContributionMap::new(32, 1, &valid).unwrap();
        let merge = generate_merge_tables(1, &map).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(dump_merge_tables(&merge, 2, dir.path()).is_err());
    }
}
