use tracing::{debug, instrument};

use crate::stitching::common::{Result, StitchError, check_camera_count};

use super::helpers::{MEDIA_OPS_PRAGMAS, bicubic_helpers};
use super::types::{Interpolation, KernelProgram, KernelSynthesizer, LumaFormat, PixelFormat, WarpKernelConfig};
use super::warp_fragments::WarpBody;

pub const WARP_KERNEL_NAME: &str = "warp";
pub const WARP_LOCAL_WORK: usize = 64;

const PARAM_SEPARATOR: &str = ",\n        ";

/// Generates the warp kernel, which resamples every camera image into the
/// output projection one table entry at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct WarpKernelSynthesizer;

impl WarpKernelSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Global work size for a table holding `num_items` entries.
    ///
    /// Two work items cover one entry, four when each item only handles two pixels.
    pub fn update_global_work(&self, config: &WarpKernelConfig, num_items: usize) -> usize {
        let global = ((num_items << 1) + WARP_LOCAL_WORK - 1) & !(WARP_LOCAL_WORK - 1);
        if config.pixels_per_item() == 2 { 2 * global } else { global }
    }

    fn validate(&self, config: &WarpKernelConfig) -> Result<()> {
        check_camera_count(config.num_cameras)?;
        let input = config.input_format;
        let output = config.output_format;
        let unsupported = |reason: String| Err(StitchError::UnsupportedConfiguration(reason));

        if input.is_15bit() != output.is_15bit() {
            return unsupported(format!("warp cannot convert {input} input to {output} output"));
        }
        if config.alpha.is_some() && input != PixelFormat::Rgb {
            return unsupported(format!("fixed alpha needs RGB input, got {input}"));
        }
        if config.luma_output == Some(LumaFormat::S16) && !output.is_15bit() {
            return unsupported(format!("S16 luma output needs a 15-bit output, got {output}"));
        }
        if config.exposure_output && !output.is_15bit() {
            return unsupported(format!("exposure output needs a 15-bit output, got {output}"));
        }
        if config.num_camera_columns == Some(0) {
            return unsupported("camera atlas needs at least one column".to_string());
        }
        Ok(())
    }

    fn signature(&self, config: &WarpKernelConfig) -> String {
        let mut code = format!(
            "__kernel __attribute__((reqd_work_group_size({WARP_LOCAL_WORK}, 1, 1)))\n\
             void {WARP_KERNEL_NAME}(uint grayscale_compute_method,\n\
             \x20       uint num_cameras,\n\
             \x20       __global char * valid_pix_buf, uint valid_pix_buf_offset, uint valid_pix_num_items,\n\
             \x20       __global char * warp_remap_buf, uint warp_remap_buf_offset, uint warp_remap_num_items,\n\
             \x20       uint ip_width, uint ip_height, __global uchar * ip_buf, uint ip_stride, uint ip_offset,\n\
             \x20       uint op_width, uint op_height, __global uchar * op_buf, uint op_stride, uint op_offset"
        );
        let optional = [
            (
                config.luma_output.is_some(),
                "uint op_u8_width, uint op_u8_height, __global uchar * op_u8_buf, uint op_u8_stride, uint op_u8_offset",
            ),
            (config.num_camera_columns.is_some(), "uint num_camera_columns"),
            (config.alpha.is_some(), "uint alpha"),
            (config.flags.is_some(), "uint flags"),
            (
                config.exposure_output,
                "uint op_s16_width, uint op_s16_height, __global uchar * op_s16_buf, uint op_s16_stride, uint op_s16_offset",
            ),
        ];
        for (_, param) in optional.iter().filter(|(present, _)| *present) {
            code.push_str(PARAM_SEPARATOR);
            code.push_str(param);
        }
        code
    }

    fn prologue(&self, config: &WarpKernelConfig) -> String {
        let rows = config.num_cameras.div_ceil(config.camera_columns());
        let ip_height_offset = config.input_height / rows;
        let op_height_offset = config.output_height / config.num_cameras;

        let mut code = format!(
            ")\n{{\n\
             \x20 int gid = get_global_id(0);\n\
             \x20 float4 f, mf; uint sx, sy, offset; uint4 outpix; float y; uint2 row_offset;\n\
             \x20 uint QF = 3;\n\
             \x20 uint QFB = (1 << QF) - 1; float QFM = 1.0f / (1 << QF);\n\
             \x20 uint ip_image_height_offset = {ip_height_offset};\n\
             \x20 uint op_image_height_offset = {op_height_offset};\n"
        );
        if config.luma_output.is_some() {
            code.push_str(&format!("  uint op_u8_image_height_offset = {op_height_offset};\n"));
        }
        if config.exposure_output {
            code.push_str(&format!("  uint op_s16_image_height_offset = {op_height_offset};\n"));
        }

        // a 2-pixel item is a quarter of an entry, a 4-pixel item half of one
        let (remap_shift, entry_shift) = if config.pixels_per_item() == 4 {
            ("(gid << 4)", "(gid >> 1)")
        } else {
            ("((gid >> 1) << 4)", "(gid >> 2)")
        };
        code.push_str(&format!(
            "  warp_remap_buf += warp_remap_buf_offset + {remap_shift};\n\
             \x20 valid_pix_buf += valid_pix_buf_offset + ({entry_shift} << 2);\n\
             \x20 if (({entry_shift} < valid_pix_num_items)) {{\n\
             \x20   uint pixelEntry = *(__global uint*) valid_pix_buf;\n\
             \x20   if(pixelEntry == 0xffffffff) return;\n\
             \x20   uint4 map = *(__global uint4 *) warp_remap_buf;\n\
             \x20   uint camera_id = pixelEntry & 0x1f; uint op_x = (pixelEntry >> 8) & 0x7ff; uint op_y = (pixelEntry >> 19) & 0x1fff;\n"
        ));
        code.push_str(&camera_row_addressing(config.camera_columns()));
        code
    }
}

impl KernelSynthesizer for WarpKernelSynthesizer {
    type Config = WarpKernelConfig;

    #[instrument(skip_all, fields(input = %config.input_format, output = %config.output_format))]
    fn synthesize(&self, config: &WarpKernelConfig) -> Result<KernelProgram> {
        self.validate(config)?;
        let body = WarpBody::new(config);

        let mut source = String::from(MEDIA_OPS_PRAGMAS);
        source.push('\n');
        if config.interpolation() == Interpolation::Bicubic {
            source.push_str(&bicubic_helpers(config.input_format));
        }
        source.push_str(&self.signature(config));
        source.push_str(&self.prologue(config));
        source.push_str(&body.declarations());
        for index in 0..config.pixels_per_item() {
            source.push_str(&body.pixel(index));
        }
        source.push_str(&body.pack());
        source.push_str(body.write_output());
        source.push_str(&body.write_exposure());
        source.push_str(body.write_luma());
        source.push_str("  }\n}\n");

        let global = self.update_global_work(config, config.table_capacity);
        debug!(
            pixels_per_item = config.pixels_per_item(),
            global,
            bytes = source.len(),
            "Synthesized warp kernel"
        );
        Ok(KernelProgram {
            name: WARP_KERNEL_NAME.to_string(),
            source,
            build_options: String::new(),
            work_dim: 1,
            global_work: vec![global],
            local_work: vec![WARP_LOCAL_WORK],
        })
    }
}

/// Offset of the camera's row inside the input atlas.
fn camera_row_addressing(columns: u32) -> String {
    if columns == 1 {
        return "    ip_buf += ip_offset + (camera_id * ip_image_height_offset * ip_stride);\n".to_string();
    }
    match (1..6).find(|&shift| columns == 1 << shift) {
        Some(shift) => {
            format!("    ip_buf += ip_offset + ((camera_id >> {shift}) * ip_image_height_offset * ip_stride);\n")
        }
        None => format!("    ip_buf += ip_offset + ((camera_id / {columns}) * ip_image_height_offset * ip_stride);\n"),
    }
}
