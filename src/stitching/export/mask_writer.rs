use std::io::Write;

use crate::stitching::common::Result;
use crate::stitching::export::types::{MaskExportConfig, MaskStack};

pub trait MaskWriter {
    fn write_masks(&self, masks: &MaskStack<'_>, output: &mut dyn Write, config: &MaskExportConfig) -> Result<()>;
}
