//! # resonance-windows
//!
//! Windows waveIn/waveOut backend for resonance-core.
//!
//! Provides:
//! - `WinmmDriver` — a `WaveDriver` over the multimedia wave API, usable for
//!   capture and playback
//! - `WinmmHeader` — the `WAVEHDR` descriptor attached to each pool buffer
//!
//! ## Usage
//! ```ignore
//! use resonance_core::{cancel_pair, ResonatorBank, SessionConfiguration, SpectrumCapture, StreamEngine};
//! use resonance_windows::WinmmDriver;
//!
//! let mut engine = StreamEngine::capture(WinmmDriver::new(), SessionConfiguration::default());
//! engine.open()?;
//! let mut spectrum = SpectrumCapture::new(ResonatorBank::new(&[110.0, 220.0, 440.0], 44_100.0, 1.0));
//! let (cancel, token) = cancel_pair();
//! engine.run_capture(&mut spectrum, &token)?;
//! ```

#[cfg(target_os = "windows")]
pub mod winmm;

#[cfg(target_os = "windows")]
pub use winmm::{WinmmDriver, WinmmHeader};
