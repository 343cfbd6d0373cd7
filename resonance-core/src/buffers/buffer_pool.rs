use std::collections::VecDeque;

use crate::models::error::StreamError;
use crate::models::format::{BufferLayout, StreamDirection};
use crate::models::samples::SamplesMut;
use crate::traits::wave_driver::{DeviceHeader, WaveDriver};

use super::audio_buffer::AudioBuffer;

/// Result of one [`BufferPool::service`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serviced {
    pub buffers: usize,
    pub frames: usize,
}

/// Fixed set of buffers cycling between the application and the device.
///
/// Invariant: every buffer index is in exactly one of `free` or `active`, so
/// `count_free() + count_active() == total()` after every transition,
/// including failed ones.
#[derive(Debug)]
pub struct BufferPool<H> {
    buffers: Vec<AudioBuffer<H>>,
    free: VecDeque<usize>,
    active: Vec<usize>,
    completed: Vec<usize>,
}

impl<H: DeviceHeader> BufferPool<H> {
    pub fn new(layout: BufferLayout, frames_per_buffer: usize, count: usize) -> Self {
        Self {
            buffers: (0..count)
                .map(|index| AudioBuffer::new(index, layout, frames_per_buffer))
                .collect(),
            free: (0..count).collect(),
            active: Vec::with_capacity(count),
            completed: Vec::with_capacity(count),
        }
    }

    pub fn total(&self) -> usize {
        self.buffers.len()
    }

    pub fn count_free(&self) -> usize {
        self.free.len()
    }

    pub fn count_active(&self) -> usize {
        self.active.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.free.len() + self.active.len() == self.buffers.len()
    }

    pub fn buffer(&self, index: usize) -> Option<&AudioBuffer<H>> {
        self.buffers.get(index)
    }

    /// Indices of buffers currently with the device, in submission order.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Indices of buffers waiting for the application, in service order.
    pub fn free(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }

    /// Prepares and submits every free buffer without touching its samples.
    pub fn prime<D>(&mut self, driver: &mut D) -> Result<usize, StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        let mut submitted = 0;
        while let Some(index) = self.free.pop_front() {
            self.activate(driver, index)?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Moves every buffer the device has marked done back to the free queue.
    ///
    /// Capture buffers are inspected in submission order and get their
    /// recorded frame count; playback buffers are inspected lowest index
    /// first. Buffers not yet done are left for the next call.
    pub fn reclaim<D>(&mut self, driver: &mut D, direction: StreamDirection) -> Result<usize, StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        self.completed.clear();
        self.completed
            .extend(self.active.iter().copied().filter(|&i| self.buffers[i].is_done()));
        if direction == StreamDirection::Playback {
            self.completed.sort_unstable();
        }

        for k in 0..self.completed.len() {
            let index = self.completed[k];
            if let Some(pos) = self.active.iter().position(|&i| i == index) {
                self.active.remove(pos);
            }
            self.free.push_back(index);

            let buffer = &mut self.buffers[index];
            if direction == StreamDirection::Capture {
                buffer.mark_recorded_samples();
            }
            buffer.unprepare(driver)?;
        }
        debug_assert!(self.is_consistent());
        Ok(self.completed.len())
    }

    /// Hands each free buffer to `f`, then re-prepares and resubmits it.
    pub fn service<D, F>(
        &mut self,
        driver: &mut D,
        direction: StreamDirection,
        mut f: F,
    ) -> Result<Serviced, StreamError>
    where
        D: WaveDriver<Header = H>,
        F: FnMut(SamplesMut<'_>),
    {
        let mut serviced = Serviced::default();
        while let Some(index) = self.free.pop_front() {
            serviced.frames += self.buffers[index].exchange(direction, &mut f);
            serviced.buffers += 1;
            self.activate(driver, index)?;
        }
        debug_assert!(self.is_consistent());
        Ok(serviced)
    }

    /// Unprepares every registered buffer and returns all of them to the free
    /// queue. Every buffer is attempted; the first failure is returned.
    pub fn release<D>(&mut self, driver: &mut D) -> Result<(), StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        let mut first_error = None;
        for buffer in &mut self.buffers {
            if let Err(err) = buffer.unprepare(driver) {
                log::error!("unprepare of buffer {} failed: {err}", buffer.index());
                first_error.get_or_insert(err);
            }
        }
        self.reset_queues();
        first_error.map_or(Ok(()), Err)
    }

    /// Returns every buffer to the free queue without calling the driver.
    /// Used once the device has gone away on its own.
    pub fn abandon(&mut self) {
        for buffer in &mut self.buffers {
            buffer.forget_registration();
        }
        self.reset_queues();
    }

    fn reset_queues(&mut self) {
        self.active.clear();
        self.free.clear();
        self.free.extend(0..self.buffers.len());
    }

    /// Prepares and submits `index`, which the caller has already taken out
    /// of `free`. On failure the buffer goes back to the front of `free`.
    fn activate<D>(&mut self, driver: &mut D, index: usize) -> Result<(), StreamError>
    where
        D: WaveDriver<Header = H>,
    {
        let buffer = &mut self.buffers[index];
        let submitted = match buffer.prepare(driver) {
            Ok(()) => buffer.submit(driver),
            Err(err) => Err(err),
        };
        match submitted {
            Ok(()) => {
                self.active.push(index);
                Ok(())
            }
            Err(err) => {
                if let Err(unprepare_err) = buffer.unprepare(driver) {
                    log::warn!("unprepare after failed submit of buffer {index}: {unprepare_err}");
                }
                self.free.push_front(index);
                Err(err)
            }
        }
    }
}
