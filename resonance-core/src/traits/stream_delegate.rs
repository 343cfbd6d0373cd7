use crate::models::error::StreamError;
use crate::models::state::StreamState;

/// Event delegate for stream session notifications.
///
/// Called from the thread driving the engine, never from the device
/// callback thread.
pub trait StreamDelegate: Send + Sync {
    fn on_state_changed(&self, state: &StreamState);

    /// Called once for the error that ends a session.
    fn on_error(&self, error: &StreamError);
}
