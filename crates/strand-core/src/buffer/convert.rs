//! Format conversion matrix
//!
//! Copying between buffers is a mix operation: samples are summed into
//! the destination, which is what lets several voices land in one
//! soundcard buffer without an intermediate mix bus. The conversion pair
//! is resolved once into a [`CopyMode`]; the per-sample loops are free of
//! format branches.
//!
//! Integer-to-integer conversions shift by the bit-depth difference.
//! Integer/float conversions scale against the integer full scale and
//! clamp to the target range. Same-format copies onto a cleared
//! destination are bit-exact; cross-format copies are lossy by design.

use super::AudioBuffer;
use crate::types::SampleFormat;

/// Conversion selector, computed once per (destination, source) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    S8ToS8,
    S8ToS16,
    S8ToS24,
    S8ToS32,
    S8ToS64,
    S8ToFloat,
    S8ToDouble,

    S16ToS8,
    S16ToS16,
    S16ToS24,
    S16ToS32,
    S16ToS64,
    S16ToFloat,
    S16ToDouble,

    S24ToS8,
    S24ToS16,
    S24ToS24,
    S24ToS32,
    S24ToS64,
    S24ToFloat,
    S24ToDouble,

    S32ToS8,
    S32ToS16,
    S32ToS24,
    S32ToS32,
    S32ToS64,
    S32ToFloat,
    S32ToDouble,

    S64ToS8,
    S64ToS16,
    S64ToS24,
    S64ToS32,
    S64ToS64,
    S64ToFloat,
    S64ToDouble,

    FloatToS8,
    FloatToS16,
    FloatToS24,
    FloatToS32,
    FloatToS64,
    FloatToFloat,
    FloatToDouble,

    DoubleToS8,
    DoubleToS16,
    DoubleToS24,
    DoubleToS32,
    DoubleToS64,
    DoubleToFloat,
    DoubleToDouble,
}

impl CopyMode {
    /// Resolve the conversion for copying `src` samples into `dst`
    pub fn new(dst: SampleFormat, src: SampleFormat) -> Self {
        use SampleFormat::*;
        match (src, dst) {
            (S8, S8) => CopyMode::S8ToS8,
            (S8, S16) => CopyMode::S8ToS16,
            (S8, S24) => CopyMode::S8ToS24,
            (S8, S32) => CopyMode::S8ToS32,
            (S8, S64) => CopyMode::S8ToS64,
            (S8, Float) => CopyMode::S8ToFloat,
            (S8, Double) => CopyMode::S8ToDouble,

            (S16, S8) => CopyMode::S16ToS8,
            (S16, S16) => CopyMode::S16ToS16,
            (S16, S24) => CopyMode::S16ToS24,
            (S16, S32) => CopyMode::S16ToS32,
            (S16, S64) => CopyMode::S16ToS64,
            (S16, Float) => CopyMode::S16ToFloat,
            (S16, Double) => CopyMode::S16ToDouble,

            (S24, S8) => CopyMode::S24ToS8,
            (S24, S16) => CopyMode::S24ToS16,
            (S24, S24) => CopyMode::S24ToS24,
            (S24, S32) => CopyMode::S24ToS32,
            (S24, S64) => CopyMode::S24ToS64,
            (S24, Float) => CopyMode::S24ToFloat,
            (S24, Double) => CopyMode::S24ToDouble,

            (S32, S8) => CopyMode::S32ToS8,
            (S32, S16) => CopyMode::S32ToS16,
            (S32, S24) => CopyMode::S32ToS24,
            (S32, S32) => CopyMode::S32ToS32,
            (S32, S64) => CopyMode::S32ToS64,
            (S32, Float) => CopyMode::S32ToFloat,
            (S32, Double) => CopyMode::S32ToDouble,

            (S64, S8) => CopyMode::S64ToS8,
            (S64, S16) => CopyMode::S64ToS16,
            (S64, S24) => CopyMode::S64ToS24,
            (S64, S32) => CopyMode::S64ToS32,
            (S64, S64) => CopyMode::S64ToS64,
            (S64, Float) => CopyMode::S64ToFloat,
            (S64, Double) => CopyMode::S64ToDouble,

            (Float, S8) => CopyMode::FloatToS8,
            (Float, S16) => CopyMode::FloatToS16,
            (Float, S24) => CopyMode::FloatToS24,
            (Float, S32) => CopyMode::FloatToS32,
            (Float, S64) => CopyMode::FloatToS64,
            (Float, Float) => CopyMode::FloatToFloat,
            (Float, Double) => CopyMode::FloatToDouble,

            (Double, S8) => CopyMode::DoubleToS8,
            (Double, S16) => CopyMode::DoubleToS16,
            (Double, S24) => CopyMode::DoubleToS24,
            (Double, S32) => CopyMode::DoubleToS32,
            (Double, S64) => CopyMode::DoubleToS64,
            (Double, Float) => CopyMode::DoubleToFloat,
            (Double, Double) => CopyMode::DoubleToDouble,
        }
    }
}

/// Accumulate integer samples, converting each through `$conv`
macro_rules! mix_int {
    ($dst:expr, $src:expr, $doff:expr, $soff:expr, $count:expr, $conv:expr) => {{
        for i in 0..$count {
            let v = $conv($src[$soff + i]);
            $dst[$doff + i] = $dst[$doff + i].wrapping_add(v);
        }
    }};
}

/// Accumulate float samples, converting each through `$conv`
macro_rules! mix_float {
    ($dst:expr, $src:expr, $doff:expr, $soff:expr, $count:expr, $conv:expr) => {{
        for i in 0..$count {
            $dst[$doff + i] += $conv($src[$soff + i]);
        }
    }};
}

/// Mix `count` samples of `src` starting at `src_offset` into `dst`
/// starting at `dst_offset`, converting according to `mode`
///
/// The count is clipped to both buffers' bounds; a mode that does not
/// match the buffer formats logs and leaves the destination untouched.
pub fn copy_buffer_to_buffer(
    dst: &mut AudioBuffer,
    dst_offset: usize,
    src: &AudioBuffer,
    src_offset: usize,
    count: usize,
    mode: CopyMode,
) {
    let dst_avail = dst.len().saturating_sub(dst_offset);
    let src_avail = src.len().saturating_sub(src_offset);
    let count = count.min(dst_avail).min(src_avail);
    if count == 0 {
        return;
    }

    use AudioBuffer as B;
    use CopyMode as M;

    let (dst_format, src_format) = (dst.format(), src.format());

    match (mode, &mut *dst, src) {
        // signed 8 bit source
        (M::S8ToS8, B::S8(d), B::S8(s)) => mix_int!(d, s, dst_offset, src_offset, count, |v: i8| v),
        (M::S8ToS16, B::S16(d), B::S8(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i8| (v as i16) << 8)
        }
        (M::S8ToS24, B::S24(d), B::S8(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i8| (v as i32) << 16)
        }
        (M::S8ToS32, B::S32(d), B::S8(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i8| (v as i32) << 24)
        }
        (M::S8ToS64, B::S64(d), B::S8(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i8| (v as i64) << 56)
        }
        (M::S8ToFloat, B::Float(d), B::S8(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i8| v as f32 / 128.0)
        }
        (M::S8ToDouble, B::Double(d), B::S8(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i8| v as f64 / 128.0)
        }

        // signed 16 bit source
        (M::S16ToS8, B::S8(d), B::S16(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i16| (v >> 8) as i8)
        }
        (M::S16ToS16, B::S16(d), B::S16(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i16| v)
        }
        (M::S16ToS24, B::S24(d), B::S16(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i16| (v as i32) << 8)
        }
        (M::S16ToS32, B::S32(d), B::S16(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i16| (v as i32) << 16)
        }
        (M::S16ToS64, B::S64(d), B::S16(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i16| (v as i64) << 48)
        }
        (M::S16ToFloat, B::Float(d), B::S16(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i16| v as f32 / 32768.0)
        }
        (M::S16ToDouble, B::Double(d), B::S16(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i16| v as f64 / 32768.0)
        }

        // signed 24 bit source
        (M::S24ToS8, B::S8(d), B::S24(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v >> 16) as i8)
        }
        (M::S24ToS16, B::S16(d), B::S24(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v >> 8) as i16)
        }
        (M::S24ToS24, B::S24(d), B::S24(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| v)
        }
        (M::S24ToS32, B::S32(d), B::S24(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| v << 8)
        }
        (M::S24ToS64, B::S64(d), B::S24(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v as i64) << 40)
        }
        (M::S24ToFloat, B::Float(d), B::S24(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i32| v as f32 / 8388608.0)
        }
        (M::S24ToDouble, B::Double(d), B::S24(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i32| v as f64 / 8388608.0)
        }

        // signed 32 bit source
        (M::S32ToS8, B::S8(d), B::S32(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v >> 24) as i8)
        }
        (M::S32ToS16, B::S16(d), B::S32(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v >> 16) as i16)
        }
        (M::S32ToS24, B::S24(d), B::S32(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| v >> 8)
        }
        (M::S32ToS32, B::S32(d), B::S32(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| v)
        }
        (M::S32ToS64, B::S64(d), B::S32(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i32| (v as i64) << 32)
        }
        (M::S32ToFloat, B::Float(d), B::S32(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i32| {
                (v as f64 / 2147483648.0) as f32
            })
        }
        (M::S32ToDouble, B::Double(d), B::S32(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i32| v as f64
                / 2147483648.0)
        }

        // signed 64 bit source
        (M::S64ToS8, B::S8(d), B::S64(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i64| (v >> 56) as i8)
        }
        (M::S64ToS16, B::S16(d), B::S64(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i64| (v >> 48) as i16)
        }
        (M::S64ToS24, B::S24(d), B::S64(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i64| (v >> 40) as i32)
        }
        (M::S64ToS32, B::S32(d), B::S64(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i64| (v >> 32) as i32)
        }
        (M::S64ToS64, B::S64(d), B::S64(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: i64| v)
        }
        (M::S64ToFloat, B::Float(d), B::S64(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i64| {
                (v as f64 / 9223372036854775808.0) as f32
            })
        }
        (M::S64ToDouble, B::Double(d), B::S64(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: i64| v as f64
                / 9223372036854775808.0)
        }

        // float source
        (M::FloatToS8, B::S8(d), B::Float(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f32| {
                ((v as f64).clamp(-1.0, 1.0) * 127.0) as i8
            })
        }
        (M::FloatToS16, B::S16(d), B::Float(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f32| {
                ((v as f64).clamp(-1.0, 1.0) * 32767.0) as i16
            })
        }
        (M::FloatToS24, B::S24(d), B::Float(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f32| {
                ((v as f64).clamp(-1.0, 1.0) * 8388607.0) as i32
            })
        }
        (M::FloatToS32, B::S32(d), B::Float(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f32| {
                ((v as f64).clamp(-1.0, 1.0) * 2147483647.0) as i32
            })
        }
        (M::FloatToS64, B::S64(d), B::Float(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f32| {
                ((v as f64).clamp(-1.0, 1.0) * 9223372036854775807.0) as i64
            })
        }
        (M::FloatToFloat, B::Float(d), B::Float(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: f32| v)
        }
        (M::FloatToDouble, B::Double(d), B::Float(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: f32| v as f64)
        }

        // double source
        (M::DoubleToS8, B::S8(d), B::Double(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f64| {
                (v.clamp(-1.0, 1.0) * 127.0) as i8
            })
        }
        (M::DoubleToS16, B::S16(d), B::Double(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f64| {
                (v.clamp(-1.0, 1.0) * 32767.0) as i16
            })
        }
        (M::DoubleToS24, B::S24(d), B::Double(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f64| {
                (v.clamp(-1.0, 1.0) * 8388607.0) as i32
            })
        }
        (M::DoubleToS32, B::S32(d), B::Double(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f64| {
                (v.clamp(-1.0, 1.0) * 2147483647.0) as i32
            })
        }
        (M::DoubleToS64, B::S64(d), B::Double(s)) => {
            mix_int!(d, s, dst_offset, src_offset, count, |v: f64| {
                (v.clamp(-1.0, 1.0) * 9223372036854775807.0) as i64
            })
        }
        (M::DoubleToFloat, B::Float(d), B::Double(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: f64| v as f32)
        }
        (M::DoubleToDouble, B::Double(d), B::Double(s)) => {
            mix_float!(d, s, dst_offset, src_offset, count, |v: f64| v)
        }

        _ => {
            log::warn!(
                "copy_buffer_to_buffer: mode {:?} does not match formats {:?} -> {:?}",
                mode,
                src_format,
                dst_format
            );
        }
    }
}
