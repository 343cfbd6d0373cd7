use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Sample encoding exchanged with the wave device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit PCM on the device side, signed in callbacks.
    Pcm8,
    /// Signed 16-bit PCM.
    Pcm16,
    /// IEEE 32-bit float.
    Float32,
}

impl SampleFormat {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
            Self::Float32 => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm8 => f.write_str("8-bit PCM"),
            Self::Pcm16 => f.write_str("16-bit PCM"),
            Self::Float32 => f.write_str("32-bit float"),
        }
    }
}

/// Channel layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => f.write_str("mono"),
            Self::Stereo => f.write_str("stereo"),
        }
    }
}

/// Direction of a wave stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamDirection {
    /// Device fills buffers (waveIn style).
    Capture,
    /// Device drains buffers (waveOut style).
    Playback,
}

/// Wave format requested from, or applied by, a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub channels: ChannelLayout,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, sample_format: SampleFormat, channels: ChannelLayout) -> Self {
        Self {
            sample_rate,
            sample_format,
            channels,
        }
    }

    /// Bytes per interleaved frame (all channels of one sample instant).
    pub fn block_align(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels.count() as usize
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }

    /// The buffer layout implementing this format, if there is one.
    pub fn buffer_layout(&self) -> Result<BufferLayout, StreamError> {
        BufferLayout::for_format(self.sample_format, self.channels)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz {} {}", self.sample_rate, self.sample_format, self.channels)
    }
}

/// Closed set of sample layouts that have a buffer implementation.
///
/// There is no mono float layout; requesting one fails with
/// [`StreamError::UnsupportedLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferLayout {
    Mono8,
    Stereo8,
    Mono16,
    Stereo16,
    StereoFloat32,
}

impl BufferLayout {
    pub fn for_format(format: SampleFormat, channels: ChannelLayout) -> Result<Self, StreamError> {
        match (format, channels) {
            (SampleFormat::Pcm8, ChannelLayout::Mono) => Ok(Self::Mono8),
            (SampleFormat::Pcm8, ChannelLayout::Stereo) => Ok(Self::Stereo8),
            (SampleFormat::Pcm16, ChannelLayout::Mono) => Ok(Self::Mono16),
            (SampleFormat::Pcm16, ChannelLayout::Stereo) => Ok(Self::Stereo16),
            (SampleFormat::Float32, ChannelLayout::Stereo) => Ok(Self::StereoFloat32),
            (format, channels) => Err(StreamError::UnsupportedLayout { format, channels }),
        }
    }

    pub fn sample_format(self) -> SampleFormat {
        match self {
            Self::Mono8 | Self::Stereo8 => SampleFormat::Pcm8,
            Self::Mono16 | Self::Stereo16 => SampleFormat::Pcm16,
            Self::StereoFloat32 => SampleFormat::Float32,
        }
    }

    pub fn channels(self) -> ChannelLayout {
        match self {
            Self::Mono8 | Self::Mono16 => ChannelLayout::Mono,
            Self::Stereo8 | Self::Stereo16 | Self::StereoFloat32 => ChannelLayout::Stereo,
        }
    }

    /// Bytes per frame in device memory.
    pub fn frame_bytes(self) -> usize {
        self.sample_format().bytes_per_sample() * self.channels().count() as usize
    }
}
