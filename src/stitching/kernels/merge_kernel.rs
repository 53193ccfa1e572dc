use tracing::{debug, instrument};

use crate::stitching::common::{Result, StitchError};
use crate::stitching::tables::CamIdEntry;

use super::helpers::{MEDIA_OPS_PRAGMAS, MERGE_UNPACK_RGB4, MERGE_UNPACK_RGB6, UNPACK_U8X4};
use super::types::{KernelProgram, KernelSynthesizer, MergeKernelConfig, PixelFormat, WeightFormat};

pub const MERGE_KERNEL_NAME: &str = "merge";
pub const MERGE_LOCAL_WORK: [usize; 2] = [8, 8];

/// Output pixels handled by one merge work item.
pub const MERGE_PIXELS_PER_ITEM: u32 = 4;

const DIRECT_8BIT: &str = "    fa.s0123 += amd_unpack(pRGBX_in.s0);\n\
    fa.s4567 += amd_unpack(pRGBX_in.s1);\n\
    fa.s89AB += amd_unpack(pRGBX_in.s2);\n\
    fa.sCDEF += amd_unpack(pRGBX_in.s3);\n";

const WEIGHTED_8BIT: &str = "fa.s0123 = mad((float4)weights.s0, amd_unpack(pRGBX_in.s0), fa.s0123); \
fa.s4567 = mad((float4)weights.s1, amd_unpack(pRGBX_in.s1), fa.s4567); \
fa.s89AB = mad((float4)weights.s2, amd_unpack(pRGBX_in.s2), fa.s89AB); \
fa.sCDEF = mad((float4)weights.s3, amd_unpack(pRGBX_in.s3), fa.sCDEF);\n";

/// Generates the merge kernel, which blends the warped camera images into the
/// final output using the camera selection tables and the weight maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeKernelSynthesizer;

impl MergeKernelSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Global work size covering a `width` x `height` output.
    pub fn global_work(&self, width: u32, height: u32) -> Vec<usize> {
        let items = work_items(width, height);
        items
            .iter()
            .zip(MERGE_LOCAL_WORK)
            .map(|(&n, local)| (n as usize + local - 1) & !(local - 1))
            .collect()
    }

    fn validate(&self, config: &MergeKernelConfig) -> Result<()> {
        let input = config.input_format;
        let output = config.output_format;
        if config.width == 0 || config.height == 0 {
            return Err(StitchError::InvalidDimensions(config.width as usize, config.height as usize));
        }
        let supported = match input {
            PixelFormat::Rgbx => !output.is_15bit(),
            PixelFormat::Rgb4 | PixelFormat::Rgb6 => output.is_15bit(),
            PixelFormat::Rgb => false,
        };
        if !supported {
            return Err(StitchError::UnsupportedConfiguration(format!(
                "merge cannot blend {input} input into {output} output"
            )));
        }
        if config.weight_format == WeightFormat::S16 && !output.is_15bit() {
            return Err(StitchError::UnsupportedConfiguration(format!(
                "S16 weight maps need a 15-bit output, got {output}"
            )));
        }
        Ok(())
    }

    fn signature(&self, config: &MergeKernelConfig) -> String {
        let [items_x, items_y] = work_items(config.width, config.height);
        let [local_x, local_y] = MERGE_LOCAL_WORK;
        format!(
            "__kernel __attribute__((reqd_work_group_size({local_x}, {local_y}, 1)))\n\
             void {MERGE_KERNEL_NAME}(uint camID0_img_width, uint camID0_img_height, __global uchar * camID0_img_buf, uint camID0_img_stride, uint camID0_img_offset,\n\
             \x20       uint camID1_img_width, uint camID1_img_height, __global uchar * camID1_img_buf, uint camID1_img_stride, uint camID1_img_offset,\n\
             \x20       uint camID2_img_width, uint camID2_img_height, __global uchar * camID2_img_buf, uint camID2_img_stride, uint camID2_img_offset,\n\
             \x20       uint ip_width, uint ip_height, __global uchar * ip_buf, uint ip_stride, uint ip_offset,\n\
             \x20       uint wt_width, uint wt_height, __global uchar * wt_buf, uint wt_stride, uint wt_offset,\n\
             \x20       uint op_width, uint op_height, __global uchar * op_buf, uint op_stride, uint op_offset)\n\
             {{\n\
             \x20 int gx = get_global_id(0);\n\
             \x20 int gy = get_global_id(1);\n\
             \x20 float weight_mul_factor = {:.10};\n\
             \x20 if ((gx < {items_x}) && (gy < {items_y})) {{\n\
             \x20 camID0_img_buf += camID0_img_offset + gy * camID0_img_stride + (gx >> 1);\n\
             \x20 uchar camIdSelect = *(__global uchar *)camID0_img_buf;\n\
             \x20 float4 weights;\n",
            config.weight_format.mul_factor()
        )
    }
}

impl KernelSynthesizer for MergeKernelSynthesizer {
    type Config = MergeKernelConfig;

    #[instrument(skip_all, fields(input = %config.input_format, output = %config.output_format))]
    fn synthesize(&self, config: &MergeKernelConfig) -> Result<KernelProgram> {
        self.validate(config)?;
        let reader = BlendReader {
            input: config.input_format,
            weights: config.weight_format,
        };

        let mut source = String::from(MEDIA_OPS_PRAGMAS);
        source.push_str(match (config.output_format.is_15bit(), config.input_format) {
            (false, _) => UNPACK_U8X4,
            (true, PixelFormat::Rgb6) => MERGE_UNPACK_RGB6,
            (true, _) => MERGE_UNPACK_RGB4,
        });
        if !config.output_format.is_15bit() {
            source.push('\n');
        }
        source.push_str(&self.signature(config));
        source.push_str(&reader.declarations());
        source.push_str(&reader.direct());
        source.push_str(&reader.blend());
        source.push_str(store(config.output_format));

        let global_work = self.global_work(config.width, config.height);
        debug!(?global_work, bytes = source.len(), "Synthesized merge kernel");
        Ok(KernelProgram {
            name: MERGE_KERNEL_NAME.to_string(),
            source,
            build_options: String::new(),
            work_dim: 2,
            global_work,
            local_work: MERGE_LOCAL_WORK.to_vec(),
        })
    }
}

fn work_items(width: u32, height: u32) -> [u32; 2] {
    [width.div_ceil(MERGE_PIXELS_PER_ITEM), height]
}

/// Reads and accumulates the four input pixels of a work item.
struct BlendReader {
    input: PixelFormat,
    weights: WeightFormat,
}

impl BlendReader {
    fn declarations(&self) -> String {
        let mut code = String::new();
        match self.input {
            PixelFormat::Rgb6 | PixelFormat::Rgb4 => {
                code.push_str("  float8 fa1 = (float8)0; float4 fa2 = (float4)0;\n");
                if self.weights == WeightFormat::S16 {
                    code.push_str("  uint2 weights_in;\n");
                }
                code.push_str(if self.input == PixelFormat::Rgb6 {
                    "  uint8 pRGBX_in;\n"
                } else {
                    "  uint4 pRGB_in0; uint2 pRGB_in1;\n"
                });
            }
            _ => code.push_str("  float16 fa = 0;\n  uint4 pRGB_out; uint4 pRGBX_in;\n"),
        }
        code
    }

    fn load(&self, camera: &str, indent: &str) -> String {
        let row = format!("(ip_buf + ip_offset + ((gy + op_height * {camera}) * ip_stride)");
        match self.input {
            PixelFormat::Rgb6 => format!("{indent}pRGBX_in = *(__global uint8 *) {row} + (gx << 5));\n"),
            PixelFormat::Rgb4 => format!(
                "{indent}pRGB_in0 = *(__global uint4 *) {row} + (gx * 24));\n\
                 {indent}pRGB_in1 = *(__global uint2 *) {row} + (gx * 24) + 16);\n"
            ),
            _ => format!("{indent}pRGBX_in = *(__global uint4 *) {row} + (gx << 4));\n"),
        }
    }

    fn clear(&self) -> &'static str {
        match self.input {
            PixelFormat::Rgb6 => "pRGBX_in = (uint8)0;",
            PixelFormat::Rgb4 => "pRGB_in0 = (uint4)0; pRGB_in1 = (uint2)0;",
            _ => "pRGBX_in = (uint4)0;",
        }
    }

    fn load_weights(&self, indent: &str) -> String {
        let row = "(wt_buf + wt_offset + ((gy + op_height * camId) * wt_stride)";
        let read = match self.weights {
            WeightFormat::U8 => format!("{indent}weights = convert_float4(*(__global uchar4 *) {row} + (gx << 2)));\n"),
            WeightFormat::S16 => format!(
                "{indent}weights_in = *(__global uint2 *) {row} + (gx << 3));\n\
                 {indent}weights = (float4)((weights_in.s0 & 0x7fff), ((weights_in.s0 >> 16) & 0x7fff), \
                 (weights_in.s1 & 0x7fff), ((weights_in.s1 >> 16) & 0x7fff));\n"
            ),
        };
        read + &format!("{indent}weights *= weight_mul_factor;\n")
    }

    /// Lanes of the four pixels as (accumulator, value) pairs in channel order.
    fn lanes(&self) -> [(&'static str, String); 5] {
        let (a, b, c, d, e, f) = match self.input {
            PixelFormat::Rgb6 => ("pRGBX_in.s0", "pRGBX_in.s1", "pRGBX_in.s2", "pRGBX_in.s3", "pRGBX_in.s4", "pRGBX_in.s5"),
            _ => ("pRGB_in0.s0", "pRGB_in0.s1", "pRGB_in0.s1", "pRGB_in0.s2", "pRGB_in0.s3", "pRGB_in1.s0"),
        };
        let (first, second, last) = match self.input {
            PixelFormat::Rgb6 => ("amd_unpack", "amd_unpack", "amd_unpack(pRGBX_in.s6,pRGBX_in.s7)".to_string()),
            _ => ("amd_unpackA", "amd_unpackB", "amd_unpackB(pRGB_in1.s0,pRGB_in1.s1)".to_string()),
        };
        [
            ("fa1.s012", format!("{first}({a},{b})")),
            ("fa1.s345", format!("{second}({c},{d})")),
            (
                "fa1.s67",
                format!("(float2)(clamp((float)({e} & 0x7fff),0.0f,32767.0f), clamp((float)(({e} >> 16) & 0x7fff),0.0f,32767.0f))"),
            ),
            ("fa2.s0", format!("clamp((float)({f} & 0x7fff),0.0f,32767.0f)")),
            ("fa2.s123", last),
        ]
    }

    fn accumulate_direct(&self) -> String {
        if !self.input.is_15bit() {
            return DIRECT_8BIT.to_string();
        }
        self.lanes()
            .iter()
            .map(|(acc, value)| format!("    {acc:<8} += {value};\n"))
            .collect()
    }

    fn accumulate_weighted(&self, indent: &str) -> String {
        if !self.input.is_15bit() {
            return format!("{indent}{WEIGHTED_8BIT}");
        }
        // weights.sN scales pixel N; pixel 2 straddles fa1.s67 and fa2.s0
        let scales = ["(float3)weights.s0", "(float3)weights.s1", "(float2)weights.s2", "weights.s2", "(float3)weights.s3"];
        self.lanes()
            .iter()
            .zip(scales)
            .map(|((acc, value), scale)| format!("{indent}{acc:<8} = mad({scale}, {value}, {acc});\n"))
            .collect()
    }

    fn direct(&self) -> String {
        format!(
            "  if(camIdSelect < 31) {{\n{}{}  }}\n",
            self.load("camIdSelect", "    "),
            self.accumulate_direct()
        )
    }

    /// Weighted sum over the camera ids of the two group tables.
    fn blend(&self) -> String {
        let mut code = String::from(
            "  else if(camIdSelect > 31) {\n\
             \x20   camID1_img_buf += camID1_img_offset + gy * camID1_img_stride + ((gx >> 1) << 2);\n\
             \x20   uchar4 camGroup = *(__global uchar4 *)camID1_img_buf;\n\
             \x20   uchar camId;\n",
        );
        for slot in 0..CamIdEntry::MAX_BLEND {
            let lane = slot % 3;
            let gated = slot >= 2;
            let indent = if gated { "      " } else { "    " };
            if gated {
                code.push_str(&format!(
                    "    if(camIdSelect > {}) {{\n",
                    CamIdEntry::BLEND_BASE as usize + slot
                ));
            }
            if slot == 3 {
                code.push_str(
                    "      camID2_img_buf += camID2_img_offset + gy * camID2_img_stride + ((gx >> 1) << 2);\n\
                     \x20     camGroup = *(__global uchar4 *)camID2_img_buf;\n",
                );
            }
            code.push_str(&format!("{indent}camId = camGroup.s{lane};\n"));
            if slot == 0 {
                code.push_str(&format!("{indent}{} weights = (float4)0;\n", self.clear()));
            } else {
                code.push_str(&format!("{indent}weights = (float4)0;\n"));
            }
            let inner = format!("{indent}  ");
            code.push_str(&format!("{indent}if (camId < 31) {{\n"));
            code.push_str(&self.load("camId", &inner));
            code.push_str(&self.load_weights(&inner));
            code.push_str(&format!("{indent}}}\n"));
            code.push_str(&self.accumulate_weighted(indent));
            if gated {
                code.push_str("    }\n");
            }
        }
        code.push_str("  }\n\n");
        code
    }
}

fn store(output: PixelFormat) -> &'static str {
    match output {
        PixelFormat::Rgb => concat!(
            "  pRGB_out.s0 = amd_pack(fa.s0124); pRGB_out.s1 = amd_pack(fa.s5689); pRGB_out.s2 = amd_pack(fa.sACDE);\n",
            "  if(camIdSelect != 31) {\n",
            "    op_buf += op_offset + gy * op_stride + gx * 12;\n",
            "    vstore3(pRGB_out.s012, 0, (__global uint *) op_buf);\n",
            "    }\n",
            "  }\n",
            "}"
        ),
        PixelFormat::Rgbx => concat!(
            "  uint Xmask = 0xff000000;\n",
            "  pRGB_out.s0 = amd_pack(fa.s0123); pRGB_out.s0 |= Xmask;\n",
            "  pRGB_out.s1 = amd_pack(fa.s4567); pRGB_out.s1 |= Xmask;\n",
            "  pRGB_out.s2 = amd_pack(fa.s89AB); pRGB_out.s2 |= Xmask;\n",
            "  pRGB_out.s3 = amd_pack(fa.sCDEF); pRGB_out.s3 |= Xmask;\n",
            "  if(camIdSelect != 31) {\n",
            "    op_buf += op_offset + gy * op_stride + (gx << 4);\n",
            "    *(__global uint4 *) op_buf = pRGB_out;\n",
            "    }\n",
            "  }\n",
            "}"
        ),
        PixelFormat::Rgb4 => concat!(
            "  uint4 pRGB_out0; uint2 pRGB_out1;\n",
            "  pRGB_out0.s0 = (( (uint) clamp(fa1.s1,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s0,0.0f,32767.0f);\n",
            "  pRGB_out0.s1 = (( (uint) clamp(fa1.s3,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s2,0.0f,32767.0f);\n",
            "  pRGB_out0.s2 = (( (uint) clamp(fa1.s5,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s4,0.0f,32767.0f);\n",
            "  pRGB_out0.s3 = (( (uint) clamp(fa1.s7,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s6,0.0f,32767.0f);\n",
            "  pRGB_out1.s0 = (( (uint) clamp(fa2.s1,0.0f,32767.0f))<<16)+ (uint) clamp(fa2.s0,0.0f,32767.0f);\n",
            "  pRGB_out1.s1 = (( (uint) clamp(fa2.s3,0.0f,32767.0f))<<16)+ (uint) clamp(fa2.s2,0.0f,32767.0f);\n",
            "  if(camIdSelect != 31) {\n",
            "    op_buf += op_offset + gy * op_stride + gx * 24;\n",
            "    vstore4(pRGB_out0, 0, (__global uint *) op_buf);\n",
            "    vstore2(pRGB_out1, 0, (__global uint *) (op_buf+16));\n",
            "    }\n",
            "  }\n",
            "}"
        ),
        PixelFormat::Rgb6 => concat!(
            "  uint8 pRGB_out;\n",
            "  uint Xmask = 0x7fff0000;\n",
            "  pRGB_out.s0 = (( (uint) clamp(fa1.s1,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s0,0.0f,32767.0f);\n",
            "  pRGB_out.s1 = Xmask | (uint) clamp(fa1.s2,0.0f,32767.0f);\n",
            "  pRGB_out.s2 = (( (uint) clamp(fa1.s4,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s3,0.0f,32767.0f);\n",
            "  pRGB_out.s3 = Xmask | (uint) clamp(fa1.s5,0.0f,32767.0f);\n",
            "  pRGB_out.s4 = (( (uint) clamp(fa1.s7,0.0f,32767.0f))<<16)+ (uint) clamp(fa1.s6,0.0f,32767.0f);\n",
            "  pRGB_out.s5 = Xmask | (uint) clamp(fa2.s0,0.0f,32767.0f);\n",
            "  pRGB_out.s6 = (( (uint) clamp(fa2.s2,0.0f,32767.0f))<<16)+ (uint) clamp(fa2.s1,0.0f,32767.0f);\n",
            "  pRGB_out.s7 = Xmask | (uint) clamp(fa2.s3,0.0f,32767.0f);\n",
            "  if(camIdSelect != 31) {\n",
            "    op_buf += op_offset + gy * op_stride + (gx << 5);\n",
            "    *(__global uint8 *) op_buf = pRGB_out;\n",
            "    }\n",
            "  }\n",
            "}"
        ),
    }
}
