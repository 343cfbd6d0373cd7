/// Counters for debugging stream sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDiagnostics {
    pub notifications_received: u64,
    pub buffers_completed: u64,
    pub callbacks_invoked: u64,
    pub frames_transferred: u64,
    pub unknown_notifications: u64,
    pub foreign_notifications: u64,
}
