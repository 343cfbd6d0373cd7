use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

/// Creates a linked cancellation handle and token.
///
/// Discarding the pair is flagged, since the token would start out
/// cancelled:
///
/// ```compile_fail
/// #![deny(unused_must_use)]
/// resonance_core::cancel_pair();
/// ```
#[must_use = "dropping the handle cancels the token immediately"]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = channel::bounded(0);
    (CancelHandle { _tx: tx }, CancelToken { rx })
}

/// Requests cancellation of a running stream loop.
///
/// Cancelling is dropping: the token observes the closed channel. A handle
/// dropped without calling [`cancel`](Self::cancel) cancels as well.
#[derive(Debug)]
#[must_use = "dropping the handle cancels the token immediately"]
pub struct CancelHandle {
    _tx: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {}
}

/// Observed by the stream engine between notification reads.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
