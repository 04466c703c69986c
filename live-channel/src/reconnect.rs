use std::time::Duration;
use tokio::task::JoinHandle;

/// Holds at most one pending reconnect timer.
///
/// Scheduling cancels whatever was pending, so timers never stack. Dropping
/// the slot cancels the pending timer.
#[derive(Debug, Default)]
pub struct ReconnectSlot {
    pending: Option<JoinHandle<()>>,
}

impl ReconnectSlot {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Runs `fire` once after `delay`, replacing any previously scheduled timer
    pub fn schedule<F>(&mut self, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.cancel() {
            log::debug!("Replaced pending reconnect timer");
        }
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
    }

    /// Cancels the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Forgets a timer that has already fired
    pub fn clear_fired(&mut self) {
        if self.pending.as_ref().is_some_and(|h| h.is_finished()) {
            self.pending = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReconnectSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ReconnectSlot::new();

        for _ in 0..2 {
            let fired = fired.clone();
            slot.schedule(Duration::from_secs(5), move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(slot.is_pending());

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = ReconnectSlot::new();
        let counter = fired.clone();
        slot.schedule(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(slot.cancel());
        assert!(!slot.cancel());
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
