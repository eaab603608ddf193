//! Auxiliary timer bounding one IDLE wait

use std::time::Duration;

use mailpush_imap::StopSignal;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Ends the current IDLE wait after a fixed delay.
///
/// One timer exists per wait cycle. Dropping it cancels the pending stop,
/// and a stop that fires after the wait already returned does nothing.
#[derive(Debug)]
pub struct WaitTimer {
    task: JoinHandle<()>,
}

impl WaitTimer {
    /// Start the timer; pass the returned signal to the wait call
    pub fn start(duration: Duration) -> (Self, StopSignal) {
        let (stop, signal) = StopSignal::pair();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            info!("Ending IDLE");
            if !stop.stop() {
                debug!("IDLE already finished");
            }
        });
        (Self { task }, signal)
    }
}

impl Drop for WaitTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
