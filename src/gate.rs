// Boolean condition shared between the notification task and a waiting caller.
//
// Besides the flag the gate counts signals, so a waiter that was suspended
// across a `signal()` immediately followed by `clear()` still wakes with
// success instead of sleeping until its timeout.

use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy)]
struct GateState {
    set: bool,
    generation: u64,
}

/// A settable, clearable, awaitable boolean.
#[derive(Debug)]
pub struct EventGate {
    tx: watch::Sender<GateState>,
}

impl EventGate {
    pub fn new(initially_set: bool) -> Self {
        let (tx, _) = watch::channel(GateState {
            set: initially_set,
            generation: 0,
        });
        Self { tx }
    }

    /// Build a gate whose initial value is the current truth of `condition`,
    /// evaluated right now. Callers evaluate the condition under the same lock
    /// that publishes state changes, so no signal can fall in between.
    pub fn seeded<F: FnOnce() -> bool>(condition: F) -> Self {
        Self::new(condition())
    }

    pub fn signal(&self) {
        self.tx.send_modify(|state| {
            state.set = true;
            state.generation += 1;
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|state| {
            let was_set = state.set;
            state.set = false;
            was_set
        });
    }

    /// Signal when `condition` is true, clear otherwise.
    pub fn set_to(&self, condition: bool) {
        if condition {
            self.signal();
        } else {
            self.clear();
        }
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().set
    }

    /// Number of signals seen so far. Pass it to [`EventGate::wait_from`] to
    /// count signals that land before the wait actually starts.
    pub fn mark(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Wait until the gate is set, or has been signalled at any point since
    /// it was built, or `timeout` elapses. `None` waits without bound.
    /// Returns `false` only on timeout.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        self.wait_from(0, timeout).await
    }

    /// Like [`EventGate::wait`], but any signal after `mark` counts even if
    /// the gate has been cleared again since.
    pub async fn wait_from(&self, mark: u64, timeout: Option<Duration>) -> bool {
        let mut rx = self.tx.subscribe();
        {
            let state = rx.borrow_and_update();
            if state.set || state.generation != mark {
                return true;
            }
        }

        let signalled = rx.wait_for(|state| state.set || state.generation != mark);
        match timeout {
            Some(limit) => matches!(tokio::time::timeout(limit, signalled).await, Ok(Ok(_))),
            // The sender lives in `self`, so the channel cannot close under us.
            None => signalled.await.is_ok(),
        }
    }
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new(false)
    }
}
