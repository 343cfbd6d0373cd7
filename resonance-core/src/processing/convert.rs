//! Conversions between device sample layouts and `f32` signals.
//!
//! Input scaling divides by the full negative range (`128`, `32768`); output
//! clamps to `[-1.0, 1.0]` and scales by the positive maximum, so `-1.0`
//! maps to `-127` / `-32767`.

use crate::models::samples::{SamplesMut, StereoF32, StereoI16, StereoI8};

/// Unsigned device bytes to signed samples, in place (offset by 128).
pub fn unsigned_to_signed(bytes: &mut [u8]) -> &mut [i8] {
    for b in bytes.iter_mut() {
        *b = b.wrapping_sub(128);
    }
    bytemuck::cast_slice_mut(bytes)
}

/// Signed samples back to unsigned device bytes, in place.
pub fn signed_to_unsigned(samples: &mut [i8]) -> &mut [u8] {
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(samples);
    for b in bytes.iter_mut() {
        *b = b.wrapping_add(128);
    }
    bytes
}

#[inline]
fn from_i8(s: i8) -> f32 {
    s as f32 / 128.0
}

#[inline]
fn from_i16(s: i16) -> f32 {
    s as f32 / 32_768.0
}

#[inline]
fn to_i8(s: f32) -> i8 {
    (s.clamp(-1.0, 1.0) * i8::MAX as f32) as i8
}

#[inline]
fn to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Downmixes any layout to mono `f32` by averaging channels.
///
/// `out` is cleared first and ends up with one sample per frame.
pub fn downmix_to_mono(samples: &SamplesMut<'_>, out: &mut Vec<f32>) {
    out.clear();
    match samples {
        SamplesMut::Mono8(s) => out.extend(s.iter().map(|&v| from_i8(v))),
        SamplesMut::Stereo8(s) => out.extend(
            s.iter()
                .map(|f| (from_i8(f.left) + from_i8(f.right)) * 0.5),
        ),
        SamplesMut::Mono16(s) => out.extend(s.iter().map(|&v| from_i16(v))),
        SamplesMut::Stereo16(s) => out.extend(
            s.iter()
                .map(|f| (from_i16(f.left) + from_i16(f.right)) * 0.5),
        ),
        SamplesMut::StereoFloat32(s) => out.extend(s.iter().map(|f| (f.left + f.right) * 0.5)),
    }
}

/// Writes a mono `f32` signal into every channel of `samples`.
///
/// Frames past the end of `mono` are filled with silence.
pub fn fill_from_mono(samples: &mut SamplesMut<'_>, mono: &[f32]) {
    let source = |i: usize| mono.get(i).copied().unwrap_or(0.0);
    match samples {
        SamplesMut::Mono8(s) => {
            for (i, v) in s.iter_mut().enumerate() {
                *v = to_i8(source(i));
            }
        }
        SamplesMut::Stereo8(s) => {
            for (i, f) in s.iter_mut().enumerate() {
                let v = to_i8(source(i));
                *f = StereoI8 { left: v, right: v };
            }
        }
        SamplesMut::Mono16(s) => {
            for (i, v) in s.iter_mut().enumerate() {
                *v = to_i16(source(i));
            }
        }
        SamplesMut::Stereo16(s) => {
            for (i, f) in s.iter_mut().enumerate() {
                let v = to_i16(source(i));
                *f = StereoI16 { left: v, right: v };
            }
        }
        SamplesMut::StereoFloat32(s) => {
            for (i, f) in s.iter_mut().enumerate() {
                let v = source(i).clamp(-1.0, 1.0);
                *f = StereoF32 { left: v, right: v };
            }
        }
    }
}

/// Root-mean-square level of a mono signal.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
