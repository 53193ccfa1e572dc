//! OpenCL helper functions prepended to generated kernels

use super::types::PixelFormat;

pub const MEDIA_OPS_PRAGMAS: &str = "#pragma OPENCL EXTENSION cl_amd_media_ops : enable\n\
#pragma OPENCL EXTENSION cl_amd_media_ops2 : enable\n";

/// Catmull-Rom weights of the four taps around fractional position `x`.
pub const BICUBIC_COEFFS: &str = "float4 compute_bicubic_coeffs(float x)\n\
{\n\
\x20 float4 mf;\n\
\x20 mf.s0 = -0.5f*x + x*x - 0.5f*x*x*x;\n\
\x20 mf.s1 = 1.0f - 2.5f*x*x + 1.5f*x*x*x;\n\
\x20 mf.s2 = 0.5f*x + 2.0f*x*x - 1.5f*x*x*x;\n\
\x20 mf.s3 = 0.5f*(-x*x + x*x*x);\n\
\x20 return(mf);\n\
}\n";

/// Four 8-bit channels of a packed word as floats.
pub const UNPACK_U8X4: &str = "float4 amd_unpack(uint src)\n\
{\n\
\x20 return (float4)(amd_unpack0(src), amd_unpack1(src), amd_unpack2(src), amd_unpack3(src));\n\
}\n";

/// Four 15-bit channels spread over two words.
pub const UNPACK_15X4: &str = "float4 amd_unpack15(uint src0, uint src1)\n\
{\n\
\x20 return (float4)((src0 & 0x7fff), (src0 >> 16), (src1 & 0x7fff), (src1 >> 16));\n\
}\n";

const CUBIC_ROW_RGB: &str = "float3 interpolate_cubic_rgb(uint4 pix, float4 mf)\n\
{\n\
\x20 float3 res;\n\
\x20 res  = ((float3)(amd_unpack0(pix.s0), amd_unpack1(pix.s0), amd_unpack2(pix.s0))) * mf.s0;\n\
\x20 res += ((float3)(amd_unpack3(pix.s0), amd_unpack0(pix.s1), amd_unpack1(pix.s1))) * mf.s1;\n\
\x20 res += ((float3)(amd_unpack2(pix.s1), amd_unpack3(pix.s1), amd_unpack0(pix.s2))) * mf.s2;\n\
\x20 res += ((float3)(amd_unpack1(pix.s2), amd_unpack2(pix.s2), amd_unpack3(pix.s2))) * mf.s3;\n\
\x20 return(res);\n\
}\n";

const CUBIC_ROW_RGBX: &str = "float4 interpolate_cubic_rgbx(uint4 pix, float4 mf)\n\
{\n\
\x20 return(mad(amd_unpack(pix.s0), (float4)mf.s0, mad(amd_unpack(pix.s1), (float4)mf.s1, \
mad(amd_unpack(pix.s2), (float4)mf.s2, amd_unpack(pix.s3) * mf.s3))));\n\
}\n\n";

const CUBIC_ROW_RGB4: &str = "float3 interpolate_cubic_rgb4(uint8 pix, float4 mf)\n\
{\n\
\x20 float3 res;\n\
\x20 res  = ((float3)((pix.s0 & 0x7fff), ((pix.s0 >> 16) & 0x7fff), (pix.s1 & 0x7fff))) * mf.s0;\n\
\x20 res += ((float3)(((pix.s1 >> 16) & 0x7fff), (pix.s2 & 0x7fff), ((pix.s2 >> 16) & 0x7fff))) * mf.s1;\n\
\x20 res += ((float3)((pix.s3 & 0x7fff), ((pix.s3 >> 16) & 0x7fff), (pix.s4 & 0x7fff))) * mf.s2;\n\
\x20 res += ((float3)(((pix.s4 >> 16) & 0x7fff), (pix.s5 & 0x7fff), ((pix.s5 >> 16) & 0x7fff))) * mf.s3;\n\
\x20 return(res);\n\
}\n";

const CUBIC_ROW_RGB6: &str = "float4 interpolate_cubic_rgb6(uint8 pix, float4 mf)\n\
{\n\
\x20 return(mad(amd_unpack15(pix.s0,pix.s1), (float4)mf.s0, mad(amd_unpack15(pix.s2,pix.s3), (float4)mf.s1, \
mad(amd_unpack15(pix.s4,pix.s5), (float4)mf.s2, amd_unpack15(pix.s6,pix.s7) * mf.s3))));\n\
}\n\n";

/// Three 15-bit channels of one RGB6 pixel.
pub const MERGE_UNPACK_RGB6: &str = "float3 amd_unpack(uint src0, uint src1)\n\
{\n\
\x20 return (float3)((float)(src0 & 0x7fff), (float)((src0 >> 16) & 0x7fff), (float)(src1 & 0x7fff));\n\
}\n\n";

/// RGB4 pixels start either on a word boundary (A) or half-way into one (B).
pub const MERGE_UNPACK_RGB4: &str = "float3 amd_unpackA(uint src0, uint src1)\n\
{\n\
\x20 return (float3)((float)(src0 & 0x7fff),(float)((src0 >> 16) & 0x7fff), (float)(src1 & 0x7fff));\n\
}\n\
float3 amd_unpackB(uint src0, uint src1)\n\
{\n\
\x20 return (float3)((float)((src0 >> 16) & 0x7fff), (float)(src1 & 0x7fff), (float)((src1 >> 16) & 0x7fff));\n\
}\n\n";

/// Helpers needed by the bicubic sampler of `input`.
pub fn bicubic_helpers(input: PixelFormat) -> String {
    let mut code = String::from(BICUBIC_COEFFS);
    match input {
        PixelFormat::Rgb => code.push_str(CUBIC_ROW_RGB),
        PixelFormat::Rgbx => {
            code.push_str(UNPACK_U8X4);
            code.push_str(CUBIC_ROW_RGBX);
        }
        PixelFormat::Rgb4 => code.push_str(CUBIC_ROW_RGB4),
        PixelFormat::Rgb6 => {
            code.push_str(UNPACK_15X4);
            code.push_str(CUBIC_ROW_RGB6);
        }
    }
    code
}

/// Name of the per-row cubic interpolation helper for `input`.
pub fn cubic_row_fn(input: PixelFormat) -> &'static str {
    match input {
        PixelFormat::Rgb => "interpolate_cubic_rgb",
        PixelFormat::Rgbx => "interpolate_cubic_rgbx",
        PixelFormat::Rgb4 => "interpolate_cubic_rgb4",
        PixelFormat::Rgb6 => "interpolate_cubic_rgb6",
    }
}
