use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::models::format::{BufferLayout, StreamDirection, StreamFormat};
use crate::models::notification::{DeviceEvent, DeviceHandle, NotificationSender};
use crate::models::samples::SamplesMut;
use crate::processing::convert;
use crate::traits::wave_driver::{DeviceHeader, OpenedDevice, WaveDriver};

pub const MMSYSERR_ALLOCATED: u32 = 4;
pub const MMSYSERR_INVALHANDLE: u32 = 5;
pub const MMSYSERR_NOMEM: u32 = 7;
pub const MMSYSERR_INVALPARAM: u32 = 11;
pub const WAVERR_BADFORMAT: u32 = 32;
pub const WAVERR_STILLPLAYING: u32 = 33;
pub const WAVERR_UNPREPARED: u32 = 34;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0x5100);

/// Produces mono capture samples in `[-1.0, 1.0]`, one buffer at a time.
pub type SignalSource = Box<dyn FnMut(&mut [f32]) + Send>;

#[derive(Debug, Default)]
struct HeaderState {
    done: AtomicBool,
    queued: AtomicBool,
    bytes: AtomicUsize,
}

impl HeaderState {
    fn complete(&self, bytes: usize) {
        self.bytes.store(bytes, Ordering::Release);
        self.queued.store(false, Ordering::Release);
        self.done.store(true, Ordering::Release);
    }
}

/// Descriptor for a [`SimulatedDevice`] buffer; the device thread flips the
/// shared flags.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHeader {
    state: Arc<HeaderState>,
    prepared: bool,
    len: usize,
}

impl SimulatedHeader {
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl DeviceHeader for SimulatedHeader {
    fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }

    fn bytes_recorded(&self) -> usize {
        self.state.bytes.load(Ordering::Acquire)
    }
}

enum Command {
    Submit(Arc<HeaderState>, usize),
    Start,
    Stop,
    Reset,
    /// Acknowledged once every earlier command has been handled.
    Barrier(Sender<()>),
    Close,
}

#[derive(Clone)]
struct Link {
    notifier: NotificationSender,
    handle: DeviceHandle,
}

struct OpenDevice {
    direction: StreamDirection,
    layout: BufferLayout,
    commands: Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
}

/// In-process wave device.
///
/// Submitted buffers are completed in FIFO order by a device thread, which
/// posts one `BufferCompleted` per buffer, the same way a waveIn/waveOut
/// driver calls back. Capture data comes from a [`SignalSource`]; playback
/// data is downmixed to mono and appended to a shared sink.
pub struct SimulatedDevice {
    source: Option<SignalSource>,
    sink: Arc<Mutex<Vec<f32>>>,
    applied_sample_rate: Option<u32>,
    failure: Option<(&'static str, u32)>,
    link: Arc<Mutex<Option<Link>>>,
    stops: Arc<AtomicUsize>,
    open: Option<OpenDevice>,
    scratch: Vec<f32>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// A device that captures silence.
    pub fn new() -> Self {
        Self {
            source: None,
            sink: Arc::new(Mutex::new(Vec::new())),
            applied_sample_rate: None,
            failure: None,
            link: Arc::new(Mutex::new(None)),
            stops: Arc::new(AtomicUsize::new(0)),
            open: None,
            scratch: Vec::new(),
        }
    }

    pub fn with_source<F>(mut self, source: F) -> Self
    where
        F: FnMut(&mut [f32]) + Send + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Applies `sample_rate` regardless of what is requested.
    pub fn with_applied_sample_rate(mut self, sample_rate: u32) -> Self {
        self.applied_sample_rate = Some(sample_rate);
        self
    }

    /// Makes every call of `operation` ("open", "prepare", "submit", ...)
    /// fail with `code`.
    pub fn fail_on(mut self, operation: &'static str, code: u32) -> Self {
        self.failure = Some((operation, code));
        self
    }

    /// Everything played so far, downmixed to mono.
    pub fn sink(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.sink)
    }

    pub fn control(&self) -> SimulatedControl {
        SimulatedControl {
            link: Arc::clone(&self.link),
            stops: Arc::clone(&self.stops),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn check(&self, operation: &'static str) -> Result<(), StreamError> {
        match self.failure {
            Some((failing, code)) if failing == operation => Err(StreamError::driver(operation, code)),
            _ => Ok(()),
        }
    }

    fn device(&self, operation: &'static str) -> Result<&OpenDevice, StreamError> {
        self.check(operation)?;
        self.open
            .as_ref()
            .ok_or(StreamError::driver(operation, MMSYSERR_INVALHANDLE))
    }

    fn send(&self, operation: &'static str, command: Command) -> Result<(), StreamError> {
        self.device(operation)?
            .commands
            .send(command)
            .map_err(|_| StreamError::driver(operation, MMSYSERR_INVALHANDLE))
    }

    fn record(&mut self, layout: BufferLayout, data: &mut [u8]) -> Result<(), StreamError> {
        let frames = data.len() / layout.frame_bytes();
        self.scratch.clear();
        self.scratch.resize(frames, 0.0);
        if let Some(source) = self.source.as_mut() {
            source(&mut self.scratch);
        }

        let mut view = SamplesMut::from_bytes(layout, data)
            .map_err(|_| StreamError::driver("submit", MMSYSERR_INVALPARAM))?;
        convert::fill_from_mono(&mut view, &self.scratch);
        match view {
            SamplesMut::Mono8(s) => {
                convert::signed_to_unsigned(s);
            }
            SamplesMut::Stereo8(s) => {
                convert::signed_to_unsigned(bytemuck::cast_slice_mut(s));
            }
            _ => {}
        }
        Ok(())
    }

    fn play(&mut self, layout: BufferLayout, data: &mut [u8]) -> Result<(), StreamError> {
        let eight_bit = matches!(layout, BufferLayout::Mono8 | BufferLayout::Stereo8);
        if eight_bit {
            convert::unsigned_to_signed(data);
        }
        let decoded = SamplesMut::from_bytes(layout, data)
            .map(|view| convert::downmix_to_mono(&view, &mut self.scratch));
        if eight_bit {
            for b in data.iter_mut() {
                *b = b.wrapping_add(128);
            }
        }
        decoded.map_err(|_| StreamError::driver("submit", MMSYSERR_INVALPARAM))?;
        self.sink.lock().extend_from_slice(&self.scratch);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut device) = self.open.take() {
            let _ = device.commands.send(Command::Close);
            if let Some(worker) = device.worker.take() {
                if worker.join().is_err() {
                    log::error!("simulated device thread panicked");
                }
            }
        }
        *self.link.lock() = None;
    }
}

impl WaveDriver for SimulatedDevice {
    type Header = SimulatedHeader;

    fn open(
        &mut self,
        direction: StreamDirection,
        format: &StreamFormat,
        _device_id: Option<u32>,
        notifier: NotificationSender,
    ) -> Result<OpenedDevice, StreamError> {
        self.check("open")?;
        if self.open.is_some() {
            return Err(StreamError::driver("open", MMSYSERR_ALLOCATED));
        }
        let layout = format
            .buffer_layout()
            .map_err(|_| StreamError::driver("open", WAVERR_BADFORMAT))?;

        let handle = DeviceHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let applied = StreamFormat {
            sample_rate: self.applied_sample_rate.unwrap_or(format.sample_rate),
            ..*format
        };

        let (commands, rx) = channel::unbounded();
        let worker_notifier = notifier.clone();
        let worker = thread::Builder::new()
            .name("simulated-wave-device".into())
            .spawn(move || run_device(rx, worker_notifier, handle, direction))
            .map_err(|_| StreamError::driver("open", MMSYSERR_NOMEM))?;

        self.open = Some(OpenDevice {
            direction,
            layout,
            commands,
            worker: Some(worker),
        });
        *self.link.lock() = Some(Link {
            notifier: notifier.clone(),
            handle,
        });
        notifier.post(handle, DeviceEvent::Opened);

        Ok(OpenedDevice { handle, format: applied })
    }

    fn prepare(&mut self, header: &mut SimulatedHeader, data: &mut [u8]) -> Result<(), StreamError> {
        self.device("prepare")?;
        if header.state.queued.load(Ordering::Acquire) {
            return Err(StreamError::driver("prepare", WAVERR_STILLPLAYING));
        }
        header.state.done.store(false, Ordering::Release);
        header.state.bytes.store(0, Ordering::Release);
        header.len = data.len();
        header.prepared = true;
        Ok(())
    }

    fn unprepare(&mut self, header: &mut SimulatedHeader) -> Result<(), StreamError> {
        self.device("unprepare")?;
        if header.state.queued.load(Ordering::Acquire) {
            return Err(StreamError::driver("unprepare", WAVERR_STILLPLAYING));
        }
        header.prepared = false;
        Ok(())
    }

    fn submit(&mut self, header: &mut SimulatedHeader, data: &mut [u8]) -> Result<(), StreamError> {
        let (direction, layout) = {
            let device = self.device("submit")?;
            (device.direction, device.layout)
        };
        if !header.prepared || header.len != data.len() {
            return Err(StreamError::driver("submit", WAVERR_UNPREPARED));
        }
        if header.state.queued.load(Ordering::Acquire) {
            return Err(StreamError::driver("submit", WAVERR_STILLPLAYING));
        }

        match direction {
            StreamDirection::Capture => self.record(layout, data)?,
            StreamDirection::Playback => self.play(layout, data)?,
        }

        header.state.done.store(false, Ordering::Release);
        header.state.queued.store(true, Ordering::Release);
        let sent = self.send("submit", Command::Submit(Arc::clone(&header.state), data.len()));
        if sent.is_err() {
            header.state.queued.store(false, Ordering::Release);
        }
        sent
    }

    fn start(&mut self) -> Result<(), StreamError> {
        self.send("start", Command::Start)
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.send("stop", Command::Stop)?;
        self.stops.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Completes every queued buffer with zero bytes. The device thread has
    /// processed the request by the time this returns, so no buffer is left
    /// queued.
    fn reset(&mut self) -> Result<(), StreamError> {
        self.send("reset", Command::Reset)?;
        let (ack, done) = channel::bounded(1);
        self.send("reset", Command::Barrier(ack))?;
        done.recv()
            .map_err(|_| StreamError::driver("reset", MMSYSERR_INVALHANDLE))
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.check("close")?;
        self.shutdown();
        Ok(())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_device(
    commands: Receiver<Command>,
    notifier: NotificationSender,
    handle: DeviceHandle,
    direction: StreamDirection,
) {
    // Playback devices start on the first write; capture waits for Start.
    let mut running = direction == StreamDirection::Playback;
    let mut pending: VecDeque<(Arc<HeaderState>, usize)> = VecDeque::new();

    for command in commands.iter() {
        match command {
            Command::Submit(state, bytes) => pending.push_back((state, bytes)),
            Command::Start => running = true,
            Command::Stop => running = false,
            Command::Reset => {
                for (state, _) in pending.drain(..) {
                    state.complete(0);
                    notifier.post(handle, DeviceEvent::BufferCompleted);
                }
            }
            Command::Barrier(ack) => {
                let _ = ack.send(());
            }
            Command::Close => {
                notifier.post(handle, DeviceEvent::Closed);
                return;
            }
        }
        if running {
            while let Some((state, bytes)) = pending.pop_front() {
                state.complete(bytes);
                notifier.post(handle, DeviceEvent::BufferCompleted);
            }
        }
    }
}

/// Test-side remote for a [`SimulatedDevice`] that is moved into an engine.
#[derive(Clone)]
pub struct SimulatedControl {
    link: Arc<Mutex<Option<Link>>>,
    stops: Arc<AtomicUsize>,
}

impl SimulatedControl {
    pub fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Successful `stop` calls over the device's lifetime.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }

    pub fn handle(&self) -> Option<DeviceHandle> {
        self.link.lock().as_ref().map(|link| link.handle)
    }

    /// Posts a notification tag the engine does not know.
    pub fn post_unknown(&self, tag: u32) -> bool {
        self.post(|handle| (handle, DeviceEvent::Unknown(tag)))
    }

    /// Posts `event` tagged with a handle that is not this device's.
    pub fn post_foreign(&self, event: DeviceEvent) -> bool {
        self.post(|handle| (DeviceHandle(!handle.0), event))
    }

    /// Reports the device as closed underneath the engine.
    pub fn disconnect(&self) -> bool {
        self.post(|handle| (handle, DeviceEvent::Closed))
    }

    fn post(&self, build: impl FnOnce(DeviceHandle) -> (DeviceHandle, DeviceEvent)) -> bool {
        match self.link.lock().as_ref() {
            Some(link) => {
                let (handle, event) = build(link.handle);
                link.notifier.post(handle, event)
            }
            None => false,
        }
    }
}
