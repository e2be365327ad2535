//! Trailing-edge debounce timer
//!
//! One slot holds at most one pending payload. Scheduling again replaces the
//! payload and restarts the quiet period; only the last payload fires.
//! [`DebounceTimer::flush`] hands the pending payload back to the caller so
//! teardown can run it deterministically.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    pending: Option<T>,
    handle: Option<JoinHandle<()>>,
}

/// Cancellable trailing-edge timer
#[derive(Debug)]
pub struct DebounceTimer<T> {
    quiet: Duration,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Send + 'static> DebounceTimer<T> {
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                pending: None,
                handle: None,
            })),
        }
    }

    #[inline]
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Replace the pending payload and restart the quiet period
    ///
    /// When the period elapses without another call, `fire` runs with the
    /// payload on a spawned task. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, payload: T, fire: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.pending = Some(payload);

        let generation = slot.generation;
        let quiet = self.quiet;
        let shared = Arc::clone(&self.slot);
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let payload = {
                let mut slot = shared.lock();
                if slot.generation != generation {
                    return;
                }
                slot.handle = None;
                slot.pending.take()
            };
            if let Some(payload) = payload {
                fire(payload).await;
            }
        }));
    }

    /// Stop the timer and return the pending payload, if any
    pub fn flush(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.pending.take()
    }

    /// Drop the pending payload. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        self.flush().is_some()
    }

    /// Drop the pending payload only if `predicate` accepts it
    pub fn cancel_if(&self, predicate: impl FnOnce(&T) -> bool) -> bool {
        let mut slot = self.slot.lock();
        if !slot.pending.as_ref().is_some_and(predicate) {
            return false;
        }
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.pending = None;
        true
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}

impl<T> Drop for DebounceTimer<T> {
    fn drop(&mut self) {
        // Clones of the slot live only inside the spawned task.
        if let Some(handle) = self.slot.lock().handle.take() {
            handle.abort();
        }
    }
}
