use serde::{Deserialize, Serialize};

use super::error::StreamError;
use super::format::{BufferLayout, ChannelLayout, SampleFormat, StreamFormat};

/// Configuration for a wave stream session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Requested sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Device-side sample encoding (default: 16-bit PCM).
    pub sample_format: SampleFormat,

    /// Channel layout (default: mono).
    pub channels: ChannelLayout,

    /// Time span covered by a single buffer, in seconds (default: 10 ms).
    pub time_per_buffer_secs: f64,

    /// Number of buffers cycling between the engine and the device
    /// (default: 4, minimum 2 so one can fill while another drains).
    pub buffer_count: usize,

    /// Device index, or None for the system default device.
    pub device_id: Option<u32>,
}

impl SessionConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.buffer_count < 2 {
            return Err(format!("buffer count must be at least 2, got {}", self.buffer_count));
        }
        if !(self.time_per_buffer_secs.is_finite() && self.time_per_buffer_secs > 0.0) {
            return Err(format!(
                "time per buffer must be positive, got {}",
                self.time_per_buffer_secs
            ));
        }
        if self.samples_per_buffer() == 0 {
            return Err("time per buffer is shorter than one sample".into());
        }
        Ok(())
    }

    /// Frames per buffer: `sample_rate × time_per_buffer`, truncated.
    pub fn samples_per_buffer(&self) -> usize {
        (self.sample_rate as f64 * self.time_per_buffer_secs) as usize
    }

    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.sample_format, self.channels)
    }

    pub fn buffer_layout(&self) -> Result<BufferLayout, StreamError> {
        BufferLayout::for_format(self.sample_format, self.channels)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            sample_format: SampleFormat::Pcm16,
            channels: ChannelLayout::Mono,
            time_per_buffer_secs: 0.01,
            buffer_count: 4,
            device_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SessionConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.samples_per_buffer(), 441);
    }

    #[test]
    fn rejects_single_buffer() {
        let config = SessionConfiguration {
            buffer_count: 1,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("at least 2"));
    }

    #[test]
    fn rejects_sub_sample_buffers() {
        let config = SessionConfiguration {
            sample_rate: 8000,
            time_per_buffer_secs: 0.0001,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfiguration {
            time_per_buffer_secs: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SessionConfiguration = serde_json::from_str(
            r#"{ "sample_rate": 48000, "sample_format": "float32", "channels": "stereo" }"#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.buffer_count, 4);
        assert_eq!(config.buffer_layout().unwrap(), BufferLayout::StereoFloat32);
        assert_eq!(config.samples_per_buffer(), 480);
    }

    #[test]
    fn unsupported_layout_is_reported() {
        let config = SessionConfiguration {
            sample_format: SampleFormat::Float32,
            channels: ChannelLayout::Mono,
            ..Default::default()
        };
        // Still a valid configuration; the layout check happens at pool construction.
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.buffer_layout(),
            Err(StreamError::UnsupportedLayout { .. })
        ));
    }
}
