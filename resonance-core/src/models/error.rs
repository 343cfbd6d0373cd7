use thiserror::Error;

use super::format::{ChannelLayout, SampleFormat};

/// Errors that can occur while opening or running a wave stream.
///
/// Every variant is fatal to the session it occurs in. A buffer the device
/// has not completed yet is not an error and never surfaces here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A device call returned a non-zero status.
    #[error("driver call {operation} failed with status {code}")]
    Driver { operation: &'static str, code: u32 },

    /// The device applied a different sample rate than requested.
    #[error("sample rate mismatch: requested {requested} Hz, device applied {applied} Hz")]
    FormatMismatch { requested: u32, applied: u32 },

    /// No buffer implementation exists for the format/channel combination.
    #[error("no buffer layout for {format} {channels}")]
    UnsupportedLayout {
        format: SampleFormat,
        channels: ChannelLayout,
    },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl StreamError {
    pub fn driver(operation: &'static str, code: u32) -> Self {
        Self::Driver { operation, code }
    }
}
