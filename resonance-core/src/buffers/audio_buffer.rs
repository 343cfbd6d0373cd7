use crate::models::error::StreamError;
use crate::models::format::{BufferLayout, StreamDirection};
use crate::models::samples::{SamplesMut, StereoF32, StereoI16, StereoI8};
use crate::processing::convert;
use crate::traits::wave_driver::{DeviceHeader, WaveDriver};

/// Owned sample storage, typed per layout so 16-bit and float data is
/// naturally aligned for the device.
///
/// 8-bit storage holds the unsigned device representation.
#[derive(Debug)]
enum Storage {
    Mono8(Box<[u8]>),
    Stereo8(Box<[u8]>),
    Mono16(Box<[i16]>),
    Stereo16(Box<[StereoI16]>),
    StereoFloat32(Box<[StereoF32]>),
}

impl Storage {
    fn new(layout: BufferLayout, frames: usize) -> Self {
        match layout {
            // Unsigned silence.
            BufferLayout::Mono8 => Self::Mono8(vec![128u8; frames].into_boxed_slice()),
            BufferLayout::Stereo8 => Self::Stereo8(vec![128u8; 2 * frames].into_boxed_slice()),
            BufferLayout::Mono16 => Self::Mono16(vec![0i16; frames].into_boxed_slice()),
            BufferLayout::Stereo16 => {
                Self::Stereo16(vec![StereoI16::default(); frames].into_boxed_slice())
            }
            BufferLayout::StereoFloat32 => {
                Self::StereoFloat32(vec![StereoF32::default(); frames].into_boxed_slice())
            }
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Mono8(s) | Self::Stereo8(s) => &mut s[..],
            Self::Mono16(s) => bytemuck::cast_slice_mut(s),
            Self::Stereo16(s) => bytemuck::cast_slice_mut(s),
            Self::StereoFloat32(s) => bytemuck::cast_slice_mut(s),
        }
    }

    /// Signed view of the first `frames` frames. 8-bit data is reinterpreted
    /// as-is; the caller owns the offset conversion.
    fn view(&mut self, frames: usize) -> SamplesMut<'_> {
        match self {
            Self::Mono8(s) => SamplesMut::Mono8(bytemuck::cast_slice_mut(&mut s[..frames])),
            Self::Stereo8(s) => {
                SamplesMut::Stereo8(bytemuck::cast_slice_mut::<u8, StereoI8>(&mut s[..2 * frames]))
            }
            Self::Mono16(s) => SamplesMut::Mono16(&mut s[..frames]),
            Self::Stereo16(s) => SamplesMut::Stereo16(&mut s[..frames]),
            Self::StereoFloat32(s) => SamplesMut::StereoFloat32(&mut s[..frames]),
        }
    }
}

/// One sample buffer plus the device descriptor that wraps it.
///
/// Buffers cycle `free → prepared/active → done → free`; the pool drives the
/// transitions, the device only ever flips the done flag.
#[derive(Debug)]
pub struct AudioBuffer<H> {
    index: usize,
    layout: BufferLayout,
    frames: usize,
    storage: Storage,
    header: H,
    prepared: bool,
    recorded_frames: usize,
}

impl<H: DeviceHeader> AudioBuffer<H> {
    pub fn new(index: usize, layout: BufferLayout, frames: usize) -> Self {
        Self {
            index,
            layout,
            frames,
            storage: Storage::new(layout, frames),
            header: H::default(),
            prepared: false,
            recorded_frames: 0,
        }
    }

    /// Position of this buffer within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    /// Capacity in frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn byte_len(&self) -> usize {
        self.frames * self.layout.frame_bytes()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_done(&self) -> bool {
        self.header.is_done()
    }

    /// Frames captured in the last completed cycle.
    pub fn recorded_frames(&self) -> usize {
        self.recorded_frames
    }

    pub fn header(&self) -> &H {
        &self.header
    }

    pub fn prepare<D>(&mut self, driver: &mut D) -> Result<(), StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        self.recorded_frames = 0;
        driver.prepare(&mut self.header, self.storage.bytes_mut())?;
        self.prepared = true;
        Ok(())
    }

    pub fn unprepare<D>(&mut self, driver: &mut D) -> Result<(), StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        if self.prepared {
            driver.unprepare(&mut self.header)?;
            self.prepared = false;
        }
        Ok(())
    }

    /// Drops the prepared flag without telling the device, for a device
    /// that no longer exists.
    pub(crate) fn forget_registration(&mut self) {
        self.prepared = false;
    }

    /// Converts the device's byte count into whole frames (capture only).
    pub fn mark_recorded_samples(&mut self) {
        let frames = self.header.bytes_recorded() / self.layout.frame_bytes();
        self.recorded_frames = frames.min(self.frames);
    }

    pub fn submit<D>(&mut self, driver: &mut D) -> Result<(), StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        if !self.prepared {
            return Err(StreamError::InvalidState(format!(
                "buffer {} submitted without being prepared",
                self.index
            )));
        }
        driver.submit(&mut self.header, self.storage.bytes_mut())
    }

    /// Hands the buffer's samples to `f` in signed form.
    ///
    /// Capture exposes the recorded frames; playback exposes the whole buffer
    /// zeroed, and converts 8-bit data back to unsigned afterwards. Returns
    /// the number of frames exposed.
    pub fn exchange<F>(&mut self, direction: StreamDirection, f: F) -> usize
    where
        F: FnOnce(SamplesMut<'_>),
    {
        match direction {
            StreamDirection::Capture => {
                let frames = self.recorded_frames;
                let bytes = frames * self.layout.frame_bytes();
                if let Storage::Mono8(s) | Storage::Stereo8(s) = &mut self.storage {
                    convert::unsigned_to_signed(&mut s[..bytes]);
                }
                f(self.storage.view(frames));
                frames
            }
            StreamDirection::Playback => {
                let frames = self.frames;
                let eight_bit = matches!(self.storage, Storage::Mono8(_) | Storage::Stereo8(_));
                self.storage.bytes_mut().fill(0);
                f(self.storage.view(frames));
                if eight_bit {
                    for b in self.storage.bytes_mut() {
                        *b = b.wrapping_add(128);
                    }
                }
                frames
            }
        }
    }
}
