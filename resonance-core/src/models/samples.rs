use bytemuck::{Pod, PodCastError, Zeroable};

use super::format::BufferLayout;

/// Signed 8-bit stereo frame, as seen by callbacks.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct StereoI8 {
    pub left: i8,
    pub right: i8,
}

/// Signed 16-bit stereo frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct StereoI16 {
    pub left: i16,
    pub right: i16,
}

/// 32-bit float stereo frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct StereoF32 {
    pub left: f32,
    pub right: f32,
}

/// Mutable view over one buffer's frames in the negotiated layout.
///
/// 8-bit layouts are always signed here; the engine converts from and to the
/// unsigned device representation around each callback.
#[derive(Debug)]
pub enum SamplesMut<'a> {
    Mono8(&'a mut [i8]),
    Stereo8(&'a mut [StereoI8]),
    Mono16(&'a mut [i16]),
    Stereo16(&'a mut [StereoI16]),
    StereoFloat32(&'a mut [StereoF32]),
}

impl<'a> SamplesMut<'a> {
    /// Reinterprets raw device bytes as `layout` frames.
    ///
    /// 8-bit data is viewed as signed without applying the 128 offset. Fails
    /// if `bytes` is misaligned or not a whole number of frames.
    pub fn from_bytes(layout: BufferLayout, bytes: &'a mut [u8]) -> Result<Self, PodCastError> {
        Ok(match layout {
            BufferLayout::Mono8 => Self::Mono8(bytemuck::try_cast_slice_mut(bytes)?),
            BufferLayout::Stereo8 => Self::Stereo8(bytemuck::try_cast_slice_mut(bytes)?),
            BufferLayout::Mono16 => Self::Mono16(bytemuck::try_cast_slice_mut(bytes)?),
            BufferLayout::Stereo16 => Self::Stereo16(bytemuck::try_cast_slice_mut(bytes)?),
            BufferLayout::StereoFloat32 => Self::StereoFloat32(bytemuck::try_cast_slice_mut(bytes)?),
        })
    }

    pub fn layout(&self) -> BufferLayout {
        match self {
            Self::Mono8(_) => BufferLayout::Mono8,
            Self::Stereo8(_) => BufferLayout::Stereo8,
            Self::Mono16(_) => BufferLayout::Mono16,
            Self::Stereo16(_) => BufferLayout::Stereo16,
            Self::StereoFloat32(_) => BufferLayout::StereoFloat32,
        }
    }

    /// Number of frames in the view.
    pub fn frames(&self) -> usize {
        match self {
            Self::Mono8(s) => s.len(),
            Self::Stereo8(s) => s.len(),
            Self::Mono16(s) => s.len(),
            Self::Stereo16(s) => s.len(),
            Self::StereoFloat32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}
