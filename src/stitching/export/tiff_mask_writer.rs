use std::io::Write;

use tiff::encoder::colortype::Gray8;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::stitching::common::{Result, StitchError};
use crate::stitching::export::mask_writer::MaskWriter;
use crate::stitching::export::types::{MaskCompression, MaskExportConfig, MaskStack};

/// Writes one grayscale TIFF page per camera.
pub struct TiffMaskWriter;

impl MaskWriter for TiffMaskWriter {
    fn write_masks(&self, masks: &MaskStack<'_>, output: &mut dyn Write, config: &MaskExportConfig) -> Result<()> {
        debug!(
            "Encoding mask TIFF: {} pages of {}x{}",
            masks.num_cameras, masks.width, masks.height
        );

        let mut buffer = Vec::new();

        let compression = match config.compression {
            MaskCompression::None => Compression::Uncompressed,
            MaskCompression::Lzw => Compression::Lzw,
            MaskCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            MaskCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            MaskCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut encoder = TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| StitchError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        for camera in 0..masks.num_cameras {
            let plane = masks.plane(camera);
            encoder
                .write_image::<Gray8>(masks.width as u32, masks.height as u32, &plane)
                .map_err(|e| StitchError::EncodeError(e.to_string()))?;
        }

        output.write_all(&buffer)?;

        debug!(bytes = buffer.len(), "Mask TIFF encoding complete");
        Ok(())
    }
}
