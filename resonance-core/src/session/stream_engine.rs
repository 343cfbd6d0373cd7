use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use uuid::Uuid;

use crate::buffers::buffer_pool::BufferPool;
use crate::models::config::SessionConfiguration;
use crate::models::diagnostics::StreamDiagnostics;
use crate::models::error::StreamError;
use crate::models::format::{StreamDirection, StreamFormat};
use crate::models::notification::{DeviceEvent, DeviceNotification, NotificationSender};
use crate::models::samples::SamplesMut;
use crate::models::state::StreamState;
use crate::traits::stream_delegate::StreamDelegate;
use crate::traits::stream_handler::{CaptureHandler, RenderHandler};
use crate::traits::wave_driver::{OpenedDevice, WaveDriver};

use super::cancel::CancelToken;

/// Why a stream loop returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The cancel handle fired. In-flight buffers are left with the device.
    Cancelled,
    /// The device reported it closed. There is no reconnection; reopen to
    /// continue.
    DeviceClosed,
}

enum Flow {
    Continue,
    DeviceClosed,
}

/// Buffer-lifecycle control loop for one wave device.
///
/// ```text
/// [device callback thread] ──post──> unbounded queue ──> run loop
///                                                          │ reclaim done buffers
///                                                          │ process / render
///                                                          └ prepare + submit
/// ```
///
/// The device side only ever enqueues. Everything else (pool mutation,
/// handler calls, driver calls) happens on the thread calling `run_*`, so
/// none of it needs locking.
pub struct StreamEngine<D: WaveDriver> {
    id: Uuid,
    driver: D,
    config: SessionConfiguration,
    direction: StreamDirection,
    state: StreamState,
    device: Option<OpenedDevice>,
    pool: Option<BufferPool<D::Header>>,
    tx: Sender<DeviceNotification>,
    rx: Receiver<DeviceNotification>,
    delegate: Option<Arc<dyn StreamDelegate>>,
    diagnostics: StreamDiagnostics,
}

impl<D: WaveDriver> StreamEngine<D> {
    pub fn new(driver: D, config: SessionConfiguration, direction: StreamDirection) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            id: Uuid::new_v4(),
            driver,
            config,
            direction,
            state: StreamState::Idle,
            device: None,
            pool: None,
            tx,
            rx,
            delegate: None,
            diagnostics: StreamDiagnostics::default(),
        }
    }

    pub fn capture(driver: D, config: SessionConfiguration) -> Self {
        Self::new(driver, config, StreamDirection::Capture)
    }

    pub fn playback(driver: D, config: SessionConfiguration) -> Self {
        Self::new(driver, config, StreamDirection::Playback)
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn StreamDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.config
    }

    pub fn diagnostics(&self) -> &StreamDiagnostics {
        &self.diagnostics
    }

    /// Format applied by the device, while open.
    pub fn negotiated_format(&self) -> Option<StreamFormat> {
        self.device.map(|d| d.format)
    }

    pub fn pool(&self) -> Option<&BufferPool<D::Header>> {
        self.pool.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Opens the device and allocates the buffer pool.
    ///
    /// Capture buffers are all prepared and submitted and the device is
    /// started; playback buffers stay free until the device reports it is
    /// open. Any failure tears the device down again and leaves the engine
    /// `Closed`, from where it can be reopened.
    pub fn open(&mut self) -> Result<StreamFormat, StreamError> {
        if !(self.state.is_idle() || self.state.is_terminal()) {
            return Err(StreamError::InvalidState(format!(
                "cannot open a stream that is {:?}",
                self.state
            )));
        }
        // Anything left from a previous session belongs to a dead handle.
        while self.rx.try_recv().is_ok() {}
        self.diagnostics = StreamDiagnostics::default();

        self.try_open().map_err(|err| self.fail(err))
    }

    fn try_open(&mut self) -> Result<StreamFormat, StreamError> {
        self.config.validate().map_err(StreamError::ConfigurationFailed)?;
        let layout = self.config.buffer_layout()?;
        let requested = self.config.stream_format();
        let frames = self.config.samples_per_buffer();

        let notifier = NotificationSender::new(self.tx.clone());
        let opened = self
            .driver
            .open(self.direction, &requested, self.config.device_id, notifier)?;
        self.device = Some(opened);
        log::info!(
            "stream {}: {:?} device {:?} opened, requested {requested}, applied {}",
            self.id,
            self.direction,
            opened.handle,
            opened.format
        );

        if opened.format.sample_rate != requested.sample_rate {
            return Err(StreamError::FormatMismatch {
                requested: requested.sample_rate,
                applied: opened.format.sample_rate,
            });
        }

        log::debug!(
            "stream {}: {} buffers of {frames} frames ({layout:?})",
            self.id,
            self.config.buffer_count
        );
        self.pool = Some(BufferPool::new(layout, frames, self.config.buffer_count));
        self.set_state(StreamState::Opened);

        if self.direction == StreamDirection::Capture {
            if let Some(pool) = self.pool.as_mut() {
                pool.prime(&mut self.driver)?;
            }
            self.driver.start()?;
            log::info!("stream {}: capture started", self.id);
        }
        Ok(opened.format)
    }

    /// Runs the capture loop until cancelled, the device closes, or a driver
    /// call fails.
    pub fn run_capture<H>(&mut self, handler: &mut H, cancel: &CancelToken) -> Result<RunOutcome, StreamError>
    where
        H: CaptureHandler + ?Sized,
    {
        self.expect_direction(StreamDirection::Capture)?;
        self.run(cancel, |samples| handler.process(samples))
    }

    /// Runs the playback loop until cancelled, the device closes, or a driver
    /// call fails.
    pub fn run_playback<H>(&mut self, handler: &mut H, cancel: &CancelToken) -> Result<RunOutcome, StreamError>
    where
        H: RenderHandler + ?Sized,
    {
        self.expect_direction(StreamDirection::Playback)?;
        self.run(cancel, |samples| handler.render(samples))
    }

    /// Stops and resets the device, unprepares every buffer and closes the
    /// device. Safe to call more than once. Every step is attempted; the
    /// first failure is returned.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.device.is_none() {
            return Ok(());
        }
        let result = self.teardown();
        self.set_state(StreamState::Closed);
        log::info!("stream {}: closed", self.id);
        if let Err(err) = &result {
            self.report_error(err);
        }
        result
    }

    fn expect_direction(&self, direction: StreamDirection) -> Result<(), StreamError> {
        if self.direction != direction {
            return Err(StreamError::InvalidState(format!(
                "{direction:?} loop requested on a {:?} stream",
                self.direction
            )));
        }
        Ok(())
    }

    fn run<F>(&mut self, cancel: &CancelToken, mut callback: F) -> Result<RunOutcome, StreamError>
    where
        F: FnMut(SamplesMut<'_>),
    {
        if self.state != StreamState::Opened {
            return Err(StreamError::InvalidState(format!(
                "cannot run a stream that is {:?}",
                self.state
            )));
        }
        self.set_state(StreamState::Running);
        self.pump(cancel, &mut callback).map_err(|err| self.fail(err))
    }

    fn pump<F>(&mut self, cancel: &CancelToken, callback: &mut F) -> Result<RunOutcome, StreamError>
    where
        F: FnMut(SamplesMut<'_>),
    {
        let notifications = self.rx.clone();
        let cancelled = cancel.receiver().clone();
        loop {
            // A dequeued notification is always handled to completion;
            // cancellation is only observed between reads.
            if cancel.is_cancelled() {
                return Ok(self.cancelled());
            }
            let notification = select! {
                recv(notifications) -> msg => msg.map_err(|_| {
                    StreamError::InvalidState("notification queue disconnected".into())
                })?,
                recv(cancelled) -> _ => return Ok(self.cancelled()),
            };
            if let Flow::DeviceClosed = self.dispatch(notification, callback)? {
                self.set_state(StreamState::Draining);
                return Ok(RunOutcome::DeviceClosed);
            }
        }
    }

    fn dispatch<F>(&mut self, notification: DeviceNotification, callback: &mut F) -> Result<Flow, StreamError>
    where
        F: FnMut(SamplesMut<'_>),
    {
        self.diagnostics.notifications_received += 1;
        let device = self
            .device
            .ok_or_else(|| StreamError::InvalidState("no device is open".into()))?;

        if notification.handle != device.handle {
            self.diagnostics.foreign_notifications += 1;
            log::warn!(
                "stream {}: ignoring {:?} from foreign device {:?}",
                self.id,
                notification.event,
                notification.handle
            );
            return Ok(Flow::Continue);
        }

        match notification.event {
            DeviceEvent::Opened => {
                log::debug!("stream {}: device reported open", self.id);
                if self.direction == StreamDirection::Playback {
                    self.service(callback)?;
                }
            }
            DeviceEvent::BufferCompleted => {
                let pool = self
                    .pool
                    .as_mut()
                    .ok_or_else(|| StreamError::InvalidState("buffer pool not allocated".into()))?;
                let reclaimed = pool.reclaim(&mut self.driver, self.direction)?;
                self.diagnostics.buffers_completed += reclaimed as u64;
                self.service(callback)?;
            }
            DeviceEvent::Closed => {
                log::info!("stream {}: device reported closed", self.id);
                return Ok(Flow::DeviceClosed);
            }
            DeviceEvent::Unknown(tag) => {
                self.diagnostics.unknown_notifications += 1;
                log::warn!("stream {}: unrecognized notification {tag:#x}", self.id);
            }
        }
        Ok(Flow::Continue)
    }

    fn service<F>(&mut self, callback: &mut F) -> Result<(), StreamError>
    where
        F: FnMut(SamplesMut<'_>),
    {
        let direction = self.direction;
        let pool = self
            .pool
            .as_mut()
            .ok_or_else(|| StreamError::InvalidState("buffer pool not allocated".into()))?;
        let serviced = pool.service(&mut self.driver, direction, &mut *callback)?;
        self.diagnostics.callbacks_invoked += serviced.buffers as u64;
        self.diagnostics.frames_transferred += serviced.frames as u64;
        Ok(())
    }

    fn cancelled(&mut self) -> RunOutcome {
        self.set_state(StreamState::Cancelling);
        if self.direction == StreamDirection::Capture {
            if let Err(err) = self.driver.stop() {
                log::warn!("stream {}: stop after cancel failed: {err}", self.id);
            }
        }
        log::info!("stream {}: cancelled", self.id);
        RunOutcome::Cancelled
    }

    /// Fatal error path: tear everything down, notify, hand the error back.
    fn fail(&mut self, err: StreamError) -> StreamError {
        log::error!("stream {}: {err}", self.id);
        if let Err(teardown_err) = self.teardown() {
            log::warn!("stream {}: teardown after failure: {teardown_err}", self.id);
        }
        self.set_state(StreamState::Closed);
        self.report_error(&err);
        err
    }

    fn teardown(&mut self) -> Result<(), StreamError> {
        let Some(device) = self.device.take() else {
            self.pool = None;
            return Ok(());
        };
        let mut first_error = None;

        if self.state == StreamState::Draining {
            // The device went away by itself; its buffers are not ours to
            // unprepare any more.
            if let Some(pool) = self.pool.as_mut() {
                pool.abandon();
            }
        } else {
            if self.direction == StreamDirection::Capture {
                keep_first(&mut first_error, self.driver.stop());
            }
            keep_first(&mut first_error, self.driver.reset());
            if let Some(pool) = self.pool.as_mut() {
                keep_first(&mut first_error, pool.release(&mut self.driver));
            }
        }
        keep_first(&mut first_error, self.driver.close());
        self.pool = None;
        log::debug!("stream {}: device {:?} released", self.id, device.handle);

        first_error.map_or(Ok(()), Err)
    }

    fn set_state(&mut self, state: StreamState) {
        if self.state == state {
            return;
        }
        log::debug!("stream {}: {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&state);
        }
    }

    fn report_error(&self, err: &StreamError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(err);
        }
    }
}

impl<D: WaveDriver> Drop for StreamEngine<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("stream {}: close on drop failed: {err}", self.id);
        }
    }
}

fn keep_first(slot: &mut Option<StreamError>, result: Result<(), StreamError>) {
    if let Err(err) = result {
        log::error!("{err}");
        slot.get_or_insert(err);
    }
}
