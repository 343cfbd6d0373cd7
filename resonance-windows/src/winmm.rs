//! waveIn / waveOut driver.
//!
//! Opens a wave device with `CALLBACK_FUNCTION`; the driver calls
//! [`wave_proc`] on its own thread, which forwards every message into the
//! engine's notification queue and does nothing else.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::mem::size_of;

use windows::core::PSTR;
use windows::Win32::Media::Audio::{
    waveInAddBuffer, waveInClose, waveInOpen, waveInPrepareHeader, waveInReset, waveInStart, waveInStop,
    waveInUnprepareHeader, waveOutClose, waveOutOpen, waveOutPause, waveOutPrepareHeader, waveOutReset,
    waveOutRestart, waveOutUnprepareHeader, waveOutWrite, CALLBACK_FUNCTION, HWAVEIN, HWAVEOUT, WAVEFORMATEX,
    WAVEHDR,
};

use resonance_core::models::error::StreamError;
use resonance_core::models::format::{SampleFormat, StreamDirection, StreamFormat};
use resonance_core::models::notification::{DeviceEvent, DeviceHandle, NotificationSender};
use resonance_core::traits::wave_driver::{DeviceHeader, OpenedDevice, WaveDriver};

const WAVE_MAPPER: u32 = u32::MAX;
const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WHDR_DONE: u32 = 0x0000_0001;
const MMSYSERR_INVALPARAM: u32 = 11;

const MM_WOM_OPEN: u32 = 0x3BB;
const MM_WOM_CLOSE: u32 = 0x3BC;
const MM_WOM_DONE: u32 = 0x3BD;
const MM_WIM_OPEN: u32 = 0x3BE;
const MM_WIM_CLOSE: u32 = 0x3BF;
const MM_WIM_DATA: u32 = 0x3C0;

/// `WAVEHDR` at a stable heap address, written by the driver behind our back.
pub struct WinmmHeader {
    raw: Box<UnsafeCell<WAVEHDR>>,
}

// SAFETY: the header is only touched by the engine thread and, through the
// raw pointer registered with the driver, by the wave driver itself.
unsafe impl Send for WinmmHeader {}

impl Default for WinmmHeader {
    fn default() -> Self {
        Self {
            raw: Box::new(UnsafeCell::new(WAVEHDR::default())),
        }
    }
}

impl WinmmHeader {
    fn as_ptr(&self) -> *mut WAVEHDR {
        self.raw.get()
    }
}

impl DeviceHeader for WinmmHeader {
    fn is_done(&self) -> bool {
        // SAFETY: valid for the lifetime of `self`; read unaligned because
        // the struct is packed.
        let flags = unsafe { std::ptr::addr_of!((*self.as_ptr()).dwFlags).read_unaligned() };
        flags & WHDR_DONE != 0
    }

    fn bytes_recorded(&self) -> usize {
        // SAFETY: as above.
        unsafe { std::ptr::addr_of!((*self.as_ptr()).dwBytesRecorded).read_unaligned() as usize }
    }
}

#[derive(Clone, Copy)]
enum Device {
    In(HWAVEIN),
    Out(HWAVEOUT),
}

impl Device {
    fn handle(self) -> DeviceHandle {
        match self {
            Self::In(h) => DeviceHandle(h.0 as usize as u64),
            Self::Out(h) => DeviceHandle(h.0 as usize as u64),
        }
    }
}

/// Windows multimedia wave driver implementing [`WaveDriver`].
pub struct WinmmDriver {
    device: Option<Device>,
    /// Boxed sender handed to the driver as callback instance data.
    instance: *mut NotificationSender,
}

// SAFETY: wave handles may be used from any thread; the callback instance is
// only freed after the device has been closed.
unsafe impl Send for WinmmDriver {}

impl Default for WinmmDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl WinmmDriver {
    pub fn new() -> Self {
        Self {
            device: None,
            instance: std::ptr::null_mut(),
        }
    }

    fn device(&self, operation: &'static str) -> Result<Device, StreamError> {
        self.device
            .ok_or_else(|| StreamError::InvalidState(format!("{operation} on a closed wave device")))
    }

    fn release_instance(&mut self) {
        if !self.instance.is_null() {
            // SAFETY: created by Box::into_raw in `open`; the driver no longer
            // calls back once close has returned.
            drop(unsafe { Box::from_raw(self.instance) });
            self.instance = std::ptr::null_mut();
        }
    }
}

fn check(operation: &'static str, code: u32) -> Result<(), StreamError> {
    if code == 0 {
        Ok(())
    } else {
        Err(StreamError::driver(operation, code))
    }
}

fn wave_format(format: &StreamFormat) -> WAVEFORMATEX {
    WAVEFORMATEX {
        wFormatTag: match format.sample_format {
            SampleFormat::Float32 => WAVE_FORMAT_IEEE_FLOAT,
            SampleFormat::Pcm8 | SampleFormat::Pcm16 => WAVE_FORMAT_PCM,
        },
        nChannels: format.channels.count(),
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.bytes_per_second() as u32,
        nBlockAlign: format.block_align() as u16,
        wBitsPerSample: format.sample_format.bits_per_sample(),
        cbSize: 0,
    }
}

unsafe extern "system" fn wave_proc(hwave: *mut c_void, msg: u32, instance: usize, _param1: usize, _param2: usize) {
    if instance == 0 {
        return;
    }
    // SAFETY: `instance` is the sender boxed in `open`, alive until after close.
    let notifier = unsafe { &*(instance as *const NotificationSender) };
    let event = match msg {
        MM_WIM_OPEN | MM_WOM_OPEN => DeviceEvent::Opened,
        MM_WIM_DATA | MM_WOM_DONE => DeviceEvent::BufferCompleted,
        MM_WIM_CLOSE | MM_WOM_CLOSE => DeviceEvent::Closed,
        other => DeviceEvent::Unknown(other),
    };
    notifier.post(DeviceHandle(hwave as usize as u64), event);
}

impl WaveDriver for WinmmDriver {
    type Header = WinmmHeader;

    fn open(
        &mut self,
        direction: StreamDirection,
        format: &StreamFormat,
        device_id: Option<u32>,
        notifier: NotificationSender,
    ) -> Result<OpenedDevice, StreamError> {
        if self.device.is_some() {
            return Err(StreamError::InvalidState("wave device already open".into()));
        }
        let wfx = wave_format(format);
        let device_id = device_id.unwrap_or(WAVE_MAPPER);
        self.instance = Box::into_raw(Box::new(notifier));
        let callback = Some(wave_proc as usize);
        let instance = Some(self.instance as usize);

        let opened = match direction {
            StreamDirection::Capture => {
                let mut handle = HWAVEIN::default();
                // SAFETY: `wfx` outlives the call; `instance` stays valid until close.
                let code = unsafe {
                    waveInOpen(
                        Some(&mut handle as *mut HWAVEIN),
                        device_id,
                        &wfx,
                        callback,
                        instance,
                        CALLBACK_FUNCTION,
                    )
                };
                check("waveInOpen", code).map(|()| Device::In(handle))
            }
            StreamDirection::Playback => {
                let mut handle = HWAVEOUT::default();
                // SAFETY: as above.
                let code = unsafe {
                    waveOutOpen(
                        Some(&mut handle as *mut HWAVEOUT),
                        device_id,
                        &wfx,
                        callback,
                        instance,
                        CALLBACK_FUNCTION,
                    )
                };
                check("waveOutOpen", code).map(|()| Device::Out(handle))
            }
        };
        let device = match opened {
            Ok(device) => device,
            Err(err) => {
                self.release_instance();
                return Err(err);
            }
        };
        self.device = Some(device);

        let applied = StreamFormat {
            sample_rate: wfx.nSamplesPerSec,
            ..*format
        };
        log::info!("wave device {device_id:#x} opened as {:?} ({applied})", device.handle());
        Ok(OpenedDevice {
            handle: device.handle(),
            format: applied,
        })
    }

    fn prepare(&mut self, header: &mut WinmmHeader, data: &mut [u8]) -> Result<(), StreamError> {
        let device = self.device("prepare")?;
        let length = u32::try_from(data.len()).map_err(|_| StreamError::driver("prepare", MMSYSERR_INVALPARAM))?;
        let raw = header.as_ptr();
        // SAFETY: the header is not registered with the device while being
        // rewritten; `data` stays put until unprepare.
        unsafe {
            raw.write(WAVEHDR {
                lpData: PSTR(data.as_mut_ptr()),
                dwBufferLength: length,
                ..Default::default()
            });
        }
        let size = size_of::<WAVEHDR>() as u32;
        match device {
            Device::In(h) => check("waveInPrepareHeader", unsafe { waveInPrepareHeader(h, raw, size) }),
            Device::Out(h) => check("waveOutPrepareHeader", unsafe { waveOutPrepareHeader(h, raw, size) }),
        }
    }

    fn unprepare(&mut self, header: &mut WinmmHeader) -> Result<(), StreamError> {
        let size = size_of::<WAVEHDR>() as u32;
        match self.device("unprepare")? {
            Device::In(h) => check("waveInUnprepareHeader", unsafe {
                waveInUnprepareHeader(h, header.as_ptr(), size)
            }),
            Device::Out(h) => check("waveOutUnprepareHeader", unsafe {
                waveOutUnprepareHeader(h, header.as_ptr(), size)
            }),
        }
    }

    fn submit(&mut self, header: &mut WinmmHeader, _data: &mut [u8]) -> Result<(), StreamError> {
        let size = size_of::<WAVEHDR>() as u32;
        match self.device("submit")? {
            Device::In(h) => check("waveInAddBuffer", unsafe { waveInAddBuffer(h, header.as_ptr(), size) }),
            Device::Out(h) => check("waveOutWrite", unsafe { waveOutWrite(h, header.as_ptr(), size) }),
        }
    }

    fn start(&mut self) -> Result<(), StreamError> {
        match self.device("start")? {
            Device::In(h) => check("waveInStart", unsafe { waveInStart(h) }),
            Device::Out(h) => check("waveOutRestart", unsafe { waveOutRestart(h) }),
        }
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        match self.device("stop")? {
            Device::In(h) => check("waveInStop", unsafe { waveInStop(h) }),
            Device::Out(h) => check("waveOutPause", unsafe { waveOutPause(h) }),
        }
    }

    fn reset(&mut self) -> Result<(), StreamError> {
        match self.device("reset")? {
            Device::In(h) => check("waveInReset", unsafe { waveInReset(h) }),
            Device::Out(h) => check("waveOutReset", unsafe { waveOutReset(h) }),
        }
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let Some(device) = self.device else {
            return Ok(());
        };
        let result = match device {
            Device::In(h) => check("waveInClose", unsafe { waveInClose(h) }),
            Device::Out(h) => check("waveOutClose", unsafe { waveOutClose(h) }),
        };
        if result.is_ok() {
            self.device = None;
            self.release_instance();
            log::info!("wave device {:?} closed", device.handle());
        }
        result
    }
}

impl Drop for WinmmDriver {
    fn drop(&mut self) {
        if self.device.is_some() {
            if let Err(err) = self.reset().and_then(|()| self.close()) {
                log::error!("closing wave device on drop failed: {err}");
            }
        }
    }
}
