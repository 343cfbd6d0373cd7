use crate::models::error::StreamError;
use crate::models::format::{StreamDirection, StreamFormat};
use crate::models::notification::{DeviceHandle, NotificationSender};

/// What a driver reports back from a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedDevice {
    pub handle: DeviceHandle,
    /// The format the device actually applied.
    pub format: StreamFormat,
}

/// Device-facing descriptor attached to one audio buffer.
///
/// The device updates it asynchronously, so every read goes back to the
/// device-visible state.
pub trait DeviceHeader: Default + Send {
    /// Completion flag set by the device once it has filled or drained the
    /// buffer.
    fn is_done(&self) -> bool;

    /// Bytes the device wrote into the buffer. Only meaningful for capture.
    fn bytes_recorded(&self) -> usize;
}

/// Capability exposed by a wave device driver (waveIn/waveOut style).
///
/// Implemented by:
/// - `SimulatedDevice` (in-process, any platform)
/// - `WinmmDriver` (Windows)
///
/// A driver serves one stream at a time. Notifications are delivered out of
/// band through the [`NotificationSender`] handed to [`open`](Self::open),
/// from whatever thread the device runs its callbacks on.
pub trait WaveDriver: Send {
    type Header: DeviceHeader;

    fn open(
        &mut self,
        direction: StreamDirection,
        format: &StreamFormat,
        device_id: Option<u32>,
        notifier: NotificationSender,
    ) -> Result<OpenedDevice, StreamError>;

    /// Resets the descriptor (length, zero bytes recorded, flags cleared) to
    /// cover `data` and registers it with the device.
    ///
    /// `data` must stay valid and untouched until the header is unprepared.
    fn prepare(&mut self, header: &mut Self::Header, data: &mut [u8]) -> Result<(), StreamError>;

    fn unprepare(&mut self, header: &mut Self::Header) -> Result<(), StreamError>;

    /// Hands a prepared buffer to the device: "add for filling" on capture,
    /// "write for draining" on playback.
    fn submit(&mut self, header: &mut Self::Header, data: &mut [u8]) -> Result<(), StreamError>;

    /// Starts capture. Playback devices start on the first submit.
    fn start(&mut self) -> Result<(), StreamError>;

    fn stop(&mut self) -> Result<(), StreamError>;

    /// Returns every pending buffer to the application marked done.
    fn reset(&mut self) -> Result<(), StreamError>;

    fn close(&mut self) -> Result<(), StreamError>;
}
