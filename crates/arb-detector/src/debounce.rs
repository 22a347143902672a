//! Cancellable one-shot timers for debounced analysis.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One-shot timer driving a deferred action.
///
/// The action runs once the delay elapses. Cancelling the handle, or
/// dropping it (which is what replacing a pending timer does), stops
/// the action from running.
#[derive(Debug)]
pub struct DelayedTask {
    cancel: CancellationToken,
}

impl DelayedTask {
    pub fn spawn<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            // Cancellation wins over an elapsed timer, so a replaced
            // zero-delay task never fires.
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => action().await,
            }
        });
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
