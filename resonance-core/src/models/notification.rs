use crossbeam::channel::Sender;

/// Opaque identifier of an open device, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// Event kinds a wave device reports out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Opened,
    BufferCompleted,
    Closed,
    /// A message the engine has no handling for; carries the raw tag.
    Unknown(u32),
}

/// A device event tagged with the handle it originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceNotification {
    pub handle: DeviceHandle,
    pub event: DeviceEvent,
}

impl DeviceNotification {
    pub fn new(handle: DeviceHandle, event: DeviceEvent) -> Self {
        Self { handle, event }
    }
}

/// Producer side of the engine's notification queue.
///
/// Cloneable and callable from any thread, including a driver callback. The
/// queue is unbounded, so posting never blocks and never drops.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: Sender<DeviceNotification>,
}

impl NotificationSender {
    pub(crate) fn new(tx: Sender<DeviceNotification>) -> Self {
        Self { tx }
    }

    /// Enqueue a notification. Returns false once the engine is gone.
    pub fn post(&self, handle: DeviceHandle, event: DeviceEvent) -> bool {
        self.tx.send(DeviceNotification::new(handle, event)).is_ok()
    }
}
