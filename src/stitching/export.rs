//! Export module
//!
//! Mask images go through a [`MaskWriter`] (TIFF by default); tables are dumped
//! as raw little-endian files.

mod mask_writer;
mod tiff_mask_writer;
pub mod types;
pub mod table_dump;

#[cfg(test)]
mod tests;

pub use mask_writer::MaskWriter;
pub use tiff_mask_writer::TiffMaskWriter;
pub use types::{MaskCompression, MaskExportConfig, MaskExportConfigBuilder, MaskStack};
pub use table_dump::{dump_merge_tables, dump_warp_tables, remap_table_bytes, valid_table_bytes};
