//! # resonance-core
//!
//! Platform-agnostic core of a live spectral tracker.
//!
//! Provides recursive phasor DSP (oscillator, resonator, resonator bank),
//! fixed-size double-buffered wave I/O, and the stream engine that keeps a
//! device fed or drained. Platform backends (Windows waveIn/waveOut) implement
//! the `WaveDriver` trait and plug into the generic `StreamEngine`.
//!
//! ## Architecture
//!
//! ```text
//! resonance-core (this crate)
//! ├── traits/       ← WaveDriver, DeviceHeader, CaptureHandler, RenderHandler, StreamDelegate
//! ├── models/       ← StreamError, StreamState, SessionConfiguration, formats, samples, notifications
//! ├── processing/   ← Phasor, Oscillator, Resonator, ResonatorBank + kernels, dynamics, frequencies
//! ├── buffers/      ← AudioBuffer, BufferPool
//! ├── session/      ← StreamEngine, cancellation, SpectrumCapture, ToneRenderer
//! └── devices/      ← SimulatedDevice
//! ```

pub mod buffers;
pub mod devices;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use buffers::audio_buffer::AudioBuffer;
pub use buffers::buffer_pool::{BufferPool, Serviced};
pub use devices::simulated::{SimulatedControl, SimulatedDevice, SimulatedHeader};
pub use models::config::SessionConfiguration;
pub use models::diagnostics::StreamDiagnostics;
pub use models::error::StreamError;
pub use models::format::{BufferLayout, ChannelLayout, SampleFormat, StreamDirection, StreamFormat};
pub use models::notification::{DeviceEvent, DeviceHandle, DeviceNotification, NotificationSender};
pub use models::samples::{SamplesMut, StereoF32, StereoI16, StereoI8};
pub use models::state::StreamState;
pub use processing::kernel::{
    BankCoefficients, BankKernel, BankLanes, KernelKind, ScalarKernel, Wide4Kernel, Wide8Kernel,
};
pub use processing::oscillator::Oscillator;
pub use processing::phasor::Phasor;
pub use processing::resonator::{alpha_heuristic, Resonator};
pub use processing::resonator_bank::{BankConfiguration, ResonatorBank};
pub use session::cancel::{cancel_pair, CancelHandle, CancelToken};
pub use session::spectrum::{SpectrumCapture, ToneRenderer};
pub use session::stream_engine::{RunOutcome, StreamEngine};
pub use traits::stream_delegate::StreamDelegate;
pub use traits::stream_handler::{CaptureHandler, RenderHandler};
pub use traits::wave_driver::{DeviceHeader, OpenedDevice, WaveDriver};
