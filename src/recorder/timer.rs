//! Elapsed-time ticker
//!
//! Calls back once per period until the callback breaks or the timer is
//! cancelled. Missed ticks are delivered in a burst so elapsed counts stay
//! exact when the runtime falls behind.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running ticker; dropping it cancels the ticker
pub struct ElapsedTimer {
    handle: JoinHandle<()>,
}

impl ElapsedTimer {
    /// Spawn a ticker whose first tick fires one `period` from now
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticks.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
