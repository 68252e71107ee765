//! Stop signal shared by the server and client loops.
//!
//! A loop is told to stop when the sending half stores `true` or is dropped.

use tokio::sync::watch;

pub type StopSignal = watch::Receiver<bool>;
pub type StopHandle = watch::Sender<bool>;

pub fn stop_channel() -> (StopHandle, StopSignal) {
    watch::channel(false)
}

/// Returns true once a stop was requested.
pub fn is_stopped(signal: &StopSignal) -> bool {
    *signal.borrow() || signal.has_changed().is_err()
}

/// Resolves when a stop is requested.
pub async fn stopped(signal: &mut StopSignal) {
    // wait_for only errors when the sender is gone, which also means stop
    let _ = signal.wait_for(|stop| *stop).await;
}
