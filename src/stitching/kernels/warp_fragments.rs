//! Per-pixel fragments of the warp kernel body
//!
//! Every output sub-pixel goes through the same stages: fetch the remap
//! coordinate, test for the invalid sentinel, sample, clamp, synthesize the
//! fourth channel, compute luma and stage the packed result. Each stage only
//! branches on format tags, so the generated text is fully determined by the
//! configuration.

use super::helpers::cubic_row_fn;
use super::types::{GrayscaleMethod, Interpolation, LumaFormat, PixelFormat, WarpKernelConfig};

const VERTICAL_WEIGHTS: [&str; 4] = [
    "(-0.5f*y + y*y - 0.5f*y*y*y)",
    "(1.0f - 2.5f*y*y + 1.5f*y*y*y)",
    "(0.5f*y + 2.0f*y*y - 1.5f*y*y*y)",
    "(-0.5f*y*y + 0.5f*y*y*y)",
];

const CUBIC_ROWS: [&str; 4] = [
    "pt - row_offset.s0 * ip_stride",
    "pt",
    "pt + ip_stride",
    "pt + row_offset.s1*ip_stride",
];

pub(super) struct WarpBody<'a> {
    config: &'a WarpKernelConfig,
    pixels: usize,
    bicubic: bool,
    with_luma: bool,
}

impl<'a> WarpBody<'a> {
    pub(super) fn new(config: &'a WarpKernelConfig) -> Self {
        Self {
            config,
            pixels: config.pixels_per_item(),
            bicubic: config.interpolation() == Interpolation::Bicubic,
            with_luma: config.luma_output.is_some() || config.exposure_output,
        }
    }

    fn input(&self) -> PixelFormat {
        self.config.input_format
    }

    fn output(&self) -> PixelFormat {
        self.config.output_format
    }

    /// Locals shared by all sub-pixels of a work item.
    pub(super) fn declarations(&self) -> String {
        let mut code = String::new();
        if self.with_luma {
            code.push_str(if self.pixels == 4 { "    float4 Yval;\n" } else { "    float2 Yval;\n" });
            code.push_str("    float3 RGBToY = (float3)(0.2126f, 0.7152f, 0.0722f);\n");
        }
        let sampler = match (self.bicubic, self.input()) {
            (false, PixelFormat::Rgb) => "    uint3 px0, px1;\n",
            (false, PixelFormat::Rgbx) => "    uint2 px0, px1;\n",
            (false, _) => "    uint4 px0, px1;\n",
            (true, PixelFormat::Rgb | PixelFormat::Rgbx) => "    uint4 px;\n",
            (true, _) => "    uint8 px;\n",
        };
        code.push_str(sampler);
        code.push_str("    __global uchar * pt;\n");
        code.push_str("    bool isSrcInvalid;\n");
        if self.pixels == 2 {
            code.push_str("    uint remap;\n");
        }
        match self.output() {
            PixelFormat::Rgbx => {
                code.push_str("    uint invalidPix = amd_pack((float4)(0.0f, 0.0f, 0.0f, 128.0f));\n")
            }
            PixelFormat::Rgb => code.push_str("    float4 pk0, pk1, pk2;\n"),
            PixelFormat::Rgb4 => code.push_str("    float4 pk0, pk1, pk2;\n    uint4 outpix1;\n"),
            PixelFormat::Rgb6 => code.push_str(
                "    uint4 outpix1;\n    uint invalidPix0 = 0;\n    uint invalidPix1 = ((uint)16384) << 16;\n",
            ),
        }
        code
    }

    /// All stages for sub-pixel `index` of the work item.
    pub(super) fn pixel(&self, index: usize) -> String {
        let mut code = format!("    // pixel[{index}]\n");
        code.push_str(&self.fetch(index));
        code.push_str(&self.sample());
        if self.output().is_15bit() {
            code.push_str("    f = clamp(f, 0.0f, 32767.0f);\n");
        }
        code.push_str(&self.fourth_channel());
        if self.with_luma {
            let invalid = if self.input().is_15bit() { "-10.0f" } else { "0.0f" };
            code.push_str(&format!(
                "    Yval.s{index} = select(mad(f.s0, RGBToY.s0, mad(f.s1, RGBToY.s1, f.s2 * RGBToY.s2)), {invalid}, isSrcInvalid);\n"
            ));
        }
        code.push_str(&self.stage(index));
        code
    }

    /// Packs staged channels into output words once all sub-pixels are sampled.
    pub(super) fn pack(&self) -> String {
        match self.output() {
            PixelFormat::Rgbx | PixelFormat::Rgb6 => String::new(),
            PixelFormat::Rgb => (0..3).map(|w| format!("    outpix.s{w} = amd_pack(pk{w});\n")).collect(),
            PixelFormat::Rgb4 => {
                let words = 3 * self.pixels / 2;
                (0..words)
                    .map(|w| {
                        let lo = channel_slot(2 * w);
                        let hi = channel_slot(2 * w + 1);
                        format!("    {} = (((uint){hi}) << 16) + (uint){lo};\n", self.word(w))
                    })
                    .collect()
            }
        }
    }

    fn fetch(&self, index: usize) -> String {
        let reset = if self.bicubic { "sx = 1 << QF; sy = 1 << QF;" } else { "sx = 0; sy = 0;" };
        let mut code = String::new();
        let word = if self.pixels == 4 {
            format!("map.s{index}")
        } else {
            // odd items take the upper half of the shared remap vector
            let (odd, even) = if index == 0 { (2, 0) } else { (3, 1) };
            code.push_str(&format!("    remap = (gid & 1) ? map.s{odd} : map.s{even};\n"));
            "remap".to_string()
        };
        code.push_str(&format!(
            "    sx = {word} & 0xffff; sy = ({word} >> 16) & 0xffff; isSrcInvalid = false;\n\
             \x20   if(sx == 0xffff && sy == 0xffff) {{ isSrcInvalid = true; {reset} }}\n"
        ));
        code
    }

    fn sample(&self) -> String {
        if self.bicubic { self.sample_bicubic() } else { self.sample_bilinear() }
    }

    fn sample_bilinear(&self) -> String {
        let bpp = self.input().bytes_per_pixel();
        let base = if self.input().is_unaligned() { "ip_buf + (offset & ~3)" } else { "ip_buf + offset" };
        let load = match self.input() {
            PixelFormat::Rgb => "vload3",
            PixelFormat::Rgbx => "vload2",
            _ => "vload4",
        };
        let mut code = format!(
            "    offset = (sy >> QF) * ip_stride + (sx >> QF) * {bpp}; pt = {base}; \
             px0 = {load}(0, (__global uint *)pt); px1 = {load}(0, (__global uint *)(pt + ip_stride));\n"
        );
        let aligned_words = match self.input() {
            PixelFormat::Rgb => 2,
            PixelFormat::Rgb4 => 3,
            _ => 0,
        };
        if aligned_words > 0 {
            for row in ["px0", "px1"] {
                code.push_str("   ");
                for w in 0..aligned_words {
                    code.push_str(&format!(" {row}.s{w} = amd_bytealign({row}.s{}, {row}.s{w}, offset);", w + 1));
                }
                code.push('\n');
            }
        }
        code.push_str(
            "    mf.s0 = (sx & QFB) * QFM; mf.s1 = (sy & QFB) * QFM; mf.s2 = 1.0f - mf.s0; mf.s3 = 1.0f - mf.s1;\n",
        );
        for (channel, &(left, right)) in bilinear_taps(self.input()).iter().enumerate() {
            code.push_str(&format!(
                "    f.s{channel} = ({} * mf.s2 + {} * mf.s0) * mf.s3 + ({} * mf.s2 + {} * mf.s0) * mf.s1;\n",
                left.replace("PX", "px0"),
                right.replace("PX", "px0"),
                left.replace("PX", "px1"),
                right.replace("PX", "px1"),
            ));
        }
        code
    }

    fn sample_bicubic(&self) -> String {
        let input = self.input();
        let bpp = input.bytes_per_pixel();
        let base = if input.is_unaligned() { "ip_buf + (offset & ~3)" } else { "ip_buf + offset" };
        let mut code = format!(
            "    mf = compute_bicubic_coeffs((sx & QFB) * QFM); y = (sy & QFB) * QFM;\n\
             \x20   offset = ((sy >> QF)) * ip_stride + clamp((int)((sx >> QF) - 1) * {bpp}, (int) 0, (int)ip_width*{bpp}); pt = {base};\n\
             \x20   if( (sy >> QF)==0){{row_offset.s0=0;}} else{{row_offset.s0=1;}}\n\
             \x20   if( (sy >> QF)>(ip_image_height_offset-3)){{row_offset.s1=1;}} else{{row_offset.s1=2;}}\n"
        );
        let (load, align, target) = match input {
            PixelFormat::Rgb => (
                "vload4",
                " px.s0 = amd_bytealign(px.s1, px.s0, offset); px.s1 = amd_bytealign(px.s2, px.s1, offset); \
                 px.s2 = amd_bytealign(px.s3, px.s2, offset);",
                "f.s012",
            ),
            PixelFormat::Rgbx => ("vload4", "", "f"),
            PixelFormat::Rgb4 => ("vload8", " px = amd_bytealign(px.s12345677, px, offset);", "f.s012"),
            PixelFormat::Rgb6 => ("vload8", "", "f"),
        };
        let row_fn = cubic_row_fn(input);
        for (row, (address, weight)) in CUBIC_ROWS.iter().zip(VERTICAL_WEIGHTS).enumerate() {
            let op = if row == 0 { "=" } else { "+=" };
            code.push_str(&format!(
                "    px = {load}(0, (__global uint *)({address}));{align}\n\
                 \x20   {target} {op} ({row_fn}(px, mf) * {weight});\n"
            ));
        }
        code
    }

    fn fourth_channel(&self) -> String {
        if self.input().has_alpha() || !self.output().has_alpha() {
            return String::new();
        }
        if self.config.alpha.is_some() {
            return "    f.s3 = (float) alpha;\n".to_string();
        }
        match self.config.grayscale_method {
            GrayscaleMethod::Average => "    f.s3 = (f.s0 + f.s1 + f.s2) * 0.3333333333f;\n".to_string(),
            GrayscaleMethod::Rms => "    f.s3 = mad(f.s0, f.s0, mad(f.s1, f.s1, f.s2 * f.s2));\n\
                 \x20   f.s3 = sqrt(f.s3 * 0.3333333333f);\n"
                .to_string(),
        }
    }

    fn stage(&self, index: usize) -> String {
        match self.output() {
            PixelFormat::Rgbx => format!("    outpix.s{index} = select(amd_pack(f), invalidPix, isSrcInvalid);\n"),
            PixelFormat::Rgb6 => {
                let first = self.word(2 * index);
                let second = self.word(2 * index + 1);
                format!(
                    "    {first} = select((((uint)f.s1) << 16) + (uint)f.s0, invalidPix0, isSrcInvalid);\n\
                     \x20   {second} = select((((uint)f.s3) << 16) + (uint)f.s2, invalidPix1, isSrcInvalid);\n"
                )
            }
            PixelFormat::Rgb | PixelFormat::Rgb4 => {
                let mut code = if self.output() == PixelFormat::Rgb {
                    "    if(isSrcInvalid) { f = (float4)0.0f; }\n".to_string()
                } else {
                    "    if(isSrcInvalid) { f.s012 = (float3)(32768.0f); }\n".to_string()
                };
                for channel in 0..3 {
                    code.push_str(&format!("    {} = f.s{channel};\n", channel_slot(3 * index + channel)));
                }
                code
            }
        }
    }

    /// Output word `w` of the work item: the first four live in `outpix`, the rest in `outpix1`.
    fn word(&self, w: usize) -> String {
        if w < 4 { format!("outpix.s{w}") } else { format!("outpix1.s{}", w - 4) }
    }

    /// Store of the staged pixels to the warped image.
    pub(super) fn write_output(&self) -> &'static str {
        match (self.output(), self.pixels) {
            (PixelFormat::Rgbx, _) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x << 5) + ((gid & 1) << 4);\n",
                "    *(__global uint4 *) op_buf = outpix;\n"
            ),
            (PixelFormat::Rgb, _) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x * 24) + ((gid & 1) * 12);\n",
                "    *(__global uint3 *) (op_buf) = outpix.s012;\n"
            ),
            (PixelFormat::Rgb4, 4) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x * 48) + ((gid & 1) *24);\n",
                "    *(__global uint4 *) op_buf = outpix.s0123;\n",
                "    *(__global uint2 *) &op_buf[16] = outpix1.s01;\n"
            ),
            (PixelFormat::Rgb4, _) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x * 48) + (((gid>>1) & 1) *24) + ((gid & 1) *12);\n",
                "    *(__global uint2 *) op_buf = outpix.s01;\n",
                "    *(__global uint *)&op_buf[8] = outpix.s2;\n"
            ),
            (PixelFormat::Rgb6, 4) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x << 6) + (((gid) & 1) << 5);\n",
                "    *(__global uint4 *) op_buf = outpix;\n",
                "    *(__global uint4 *) (op_buf+16) = outpix1;\n"
            ),
            (PixelFormat::Rgb6, _) => concat!(
                "    op_buf += op_offset + ((camera_id * op_image_height_offset + op_y) * op_stride) + (op_x << 6) + (((gid>>1) & 1) << 5) + ((gid & 1) << 4);\n",
                "    *(__global uint4 *) op_buf = outpix;\n"
            ),
        }
    }

    /// Store of the exposure-compensation image, if requested.
    pub(super) fn write_exposure(&self) -> String {
        if !self.config.exposure_output {
            return String::new();
        }
        let mut code = String::from("    float2 output;\n");
        code.push_str(&exposure_pair(0, 1));
        if self.pixels == 4 {
            code.push_str(
                "    op_s16_buf += op_s16_offset + ((camera_id * op_s16_image_height_offset + op_y) * op_s16_stride) + (op_x << 4) + (((gid) & 1) << 3);\n\
                 \x20   *(__global uint *) op_s16_buf = (((uint)output.s1) << 16) + (uint)output.s0;\n",
            );
            code.push_str(&exposure_pair(2, 3));
            code.push_str("    *(__global uint *) (op_s16_buf+4) = (((uint)output.s1) << 16) + (uint)output.s0;\n");
        } else {
            code.push_str(
                "    op_s16_buf += op_s16_offset + ((camera_id * op_s16_image_height_offset + op_y) * op_s16_stride) + (op_x << 4) + (((gid>>1) & 1) << 3) + ((gid & 1) << 2);\n\
                 \x20   *(__global uint *) op_s16_buf = (((uint)output.s1) << 16) + (uint)output.s0;\n",
            );
        }
        code
    }

    /// Store of the luma image, if requested.
    pub(super) fn write_luma(&self) -> &'static str {
        let Some(format) = self.config.luma_output else {
            return "";
        };
        match (format, self.input().is_15bit(), self.pixels) {
            (LumaFormat::U8, false, _) => concat!(
                "    op_u8_buf += op_u8_offset + ((camera_id * op_u8_image_height_offset + op_y) * op_u8_stride) + (op_x << 3) + ((gid & 1) << 2);\n",
                "    *(__global uint *) op_u8_buf = amd_pack(Yval.s0123);\n"
            ),
            (LumaFormat::U8, true, 4) => concat!(
                "    Yval = clamp(Yval, 0.0f, 32767.0f);\n",
                "    Yval = Yval * 0.007782219916379f;\n",
                "    op_u8_buf += op_u8_offset + ((camera_id * op_u8_image_height_offset + op_y) * op_u8_stride) + (op_x << 3) + ((gid & 1) << 2);\n",
                "    *(__global uint *) op_u8_buf = amd_pack(Yval.s0123);\n"
            ),
            (LumaFormat::U8, true, _) => concat!(
                "    Yval = clamp(Yval, 0.0f, 32767.0f);\n",
                "    Yval = Yval * 0.007782219916379f;\n",
                "    op_u8_buf += op_u8_offset + ((camera_id * op_u8_image_height_offset + op_y) * op_u8_stride) + (op_x << 3) + (((gid>>1) & 1) << 2) + ((gid & 1) << 1);\n",
                "    *(__global short *) op_u8_buf = (((short)Yval.s1) << 8) + (short)Yval.s0;\n"
            ),
            (LumaFormat::S16, _, 4) => concat!(
                "    Yval = clamp(Yval, 0.0f, 32767.0f);\n",
                "    op_u8_buf += op_u8_offset + ((camera_id * op_u8_image_height_offset + op_y) * op_u8_stride) + (op_x << 4) + (((gid) & 1) << 3);\n",
                "    *(__global uint *) op_u8_buf = (((uint)Yval.s1) << 16) + (uint)Yval.s0;\n",
                "    *(__global uint *) (op_u8_buf+4) = (((uint)Yval.s3) << 16) + (uint)Yval.s2;\n"
            ),
            (LumaFormat::S16, _, _) => concat!(
                "    Yval = clamp(Yval, 0.0f, 32767.0f);\n",
                "    op_u8_buf += op_u8_offset + ((camera_id * op_u8_image_height_offset + op_y) * op_u8_stride) + (op_x << 4) + (((gid>>1) & 1) << 3) + ((gid & 1) << 2);\n",
                "    *(__global uint *) op_u8_buf = (((uint)Yval.s1) << 16) + (uint)Yval.s0;\n"
            ),
        }
    }
}

/// Staging slot of the `n`th color channel of the work item.
fn channel_slot(n: usize) -> String {
    format!("pk{}.s{}", n / 4, n % 4)
}

fn exposure_pair(first: usize, second: usize) -> String {
    format!(
        "    if(Yval.s{first} == -10.0f){{output.s0 = 32768;}}\n\
         \x20   else{{output.s0 = clamp(Yval.s{first}, 0.0f, 32767.0f);}}\n\
         \x20   if(Yval.s{second} == -10.0f){{output.s1 = 32768;}}\n\
         \x20   else{{output.s1 = clamp(Yval.s{second}, 0.0f, 32767.0f);}}\n"
    )
}

/// Left and right tap expressions of each channel, with `PX` standing for the row vector.
fn bilinear_taps(input: PixelFormat) -> &'static [(&'static str, &'static str)] {
    match input {
        PixelFormat::Rgb => &[
            ("amd_unpack0(PX.s0)", "amd_unpack3(PX.s0)"),
            ("amd_unpack1(PX.s0)", "amd_unpack0(PX.s1)"),
            ("amd_unpack2(PX.s0)", "amd_unpack1(PX.s1)"),
        ],
        PixelFormat::Rgbx => &[
            ("amd_unpack0(PX.s0)", "amd_unpack0(PX.s1)"),
            ("amd_unpack1(PX.s0)", "amd_unpack1(PX.s1)"),
            ("amd_unpack2(PX.s0)", "amd_unpack2(PX.s1)"),
            ("amd_unpack3(PX.s0)", "amd_unpack3(PX.s1)"),
        ],
        PixelFormat::Rgb4 => &[
            ("(PX.s0 & 0x7fff)", "((PX.s1 >> 16) & 0x7fff)"),
            ("((PX.s0 >> 16) & 0x7fff)", "(PX.s2 & 0x7fff)"),
            ("(PX.s1 & 0x7fff)", "((PX.s2 >> 16) & 0x7fff)"),
        ],
        PixelFormat::Rgb6 => &[
            ("(PX.s0 & 0x7fff)", "(PX.s2 & 0x7fff)"),
            ("((PX.s0 >> 16) & 0x7fff)", "((PX.s2 >> 16) & 0x7fff)"),
            ("(PX.s1 & 0x7fff)", "(PX.s3 & 0x7fff)"),
            ("((PX.s1 >> 16) & 0x7fff)", "((PX.s3 >> 16) & 0x7fff)"),
        ],
    }
}
