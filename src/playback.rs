use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::gate::EventGate;
use crate::models::{MediaStatus, PhaseSet, PlaybackPhase};
use crate::CastError;

/// Why an outstanding wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitAbort {
    AppChanged,
    TransportLost,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    targets: PhaseSet,
    gate: EventGate,
    abort: OnceLock<WaitAbort>,
}

/// Removes its waiter from the registry when the wait ends or is dropped.
struct Registration<'a> {
    tracker: &'a PlaybackStateTracker,
    waiter: Arc<Waiter>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let id = self.waiter.id;
        self.tracker.registry().waiters.retain(|w| w.id != id);
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    seq: u64,
    status: MediaStatus,
}

#[derive(Debug, Default)]
struct Registry {
    app_id: Option<String>,
    closed: bool,
    waiters: Vec<Arc<Waiter>>,
}

/// Current media status plus condition waits over its playback phase.
///
/// Every `wait_for` call gets its own gate, seeded from the phase current at
/// registration. Status updates and registrations go through the same lock,
/// so a change can never slip between "check" and "start waiting".
#[derive(Debug)]
pub struct PlaybackStateTracker {
    snapshot: watch::Sender<Snapshot>,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl PlaybackStateTracker {
    pub fn new(status: MediaStatus, app_id: Option<String>) -> Self {
        let (snapshot, _) = watch::channel(Snapshot { seq: 0, status });
        Self {
            snapshot,
            registry: Mutex::new(Registry {
                app_id,
                ..Default::default()
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> MediaStatus {
        self.snapshot.borrow().status.clone()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.snapshot.borrow().status.player_state
    }

    /// Count of media status notifications applied so far.
    pub fn updates(&self) -> u64 {
        self.snapshot.borrow().seq
    }

    pub(crate) fn on_media_status(&self, status: MediaStatus) {
        let registry = self.registry();
        let phase = status.player_state;
        self.snapshot.send_modify(|snap| {
            snap.seq += 1;
            snap.status = status;
        });
        trace!(%phase, waiters = registry.waiters.len(), "Media status update");
        for waiter in &registry.waiters {
            waiter.gate.set_to(waiter.targets.contains(phase));
        }
    }

    /// A different app took over the receiver. Outstanding waits were about
    /// the old app and are interrupted. The snapshot is left alone: the new
    /// app's media status may already have arrived ahead of its app status.
    pub(crate) fn on_app_changed(&self, app_id: Option<String>) {
        let mut registry = self.registry();
        if registry.app_id == app_id {
            return;
        }
        let had_app = registry.app_id.is_some();
        debug!(from = ?registry.app_id, to = ?app_id, "Active app changed");
        registry.app_id = app_id;
        if had_app {
            Self::abort_all(&registry, WaitAbort::AppChanged);
        }
    }

    pub(crate) fn close(&self) {
        let mut registry = self.registry();
        registry.closed = true;
        Self::abort_all(&registry, WaitAbort::TransportLost);
    }

    fn abort_all(registry: &Registry, reason: WaitAbort) {
        for waiter in &registry.waiters {
            let _ = waiter.abort.set(reason);
            waiter.gate.signal();
        }
    }

    /// Wait until the phase is in `phases` (or, with `invert`, outside it).
    ///
    /// - Unknown phase names fail immediately with `InvalidWait`.
    /// - With `fail_fast`, a condition that already holds is an error rather
    ///   than an immediate success.
    /// - Returns `Ok(false)` on timeout; `None` waits without bound.
    /// - An app change during the wait fails with `Interrupted`.
    pub async fn wait_for<S: AsRef<str>>(
        &self,
        phases: &[S],
        invert: bool,
        fail_fast: bool,
        timeout: Option<Duration>,
    ) -> Result<bool, CastError> {
        let set = PhaseSet::parse(phases)?;
        self.wait_for_set(set, invert, fail_fast, timeout).await
    }

    pub async fn wait_for_set(
        &self,
        phases: PhaseSet,
        invert: bool,
        fail_fast: bool,
        timeout: Option<Duration>,
    ) -> Result<bool, CastError> {
        let targets = if invert { phases.complement() } else { phases };
        let registration = self.register(targets, fail_fast)?;
        let waiter = registration.waiter.clone();

        let met = waiter.gate.wait_from(0, timeout).await;
        drop(registration);

        match waiter.abort.get() {
            Some(WaitAbort::AppChanged) => Err(CastError::Interrupted),
            Some(WaitAbort::TransportLost) => Err(CastError::Transport(
                "connection lost while waiting for playback state".to_string(),
            )),
            None => Ok(met),
        }
    }

    fn register(&self, targets: PhaseSet, fail_fast: bool) -> Result<Registration<'_>, CastError> {
        let mut registry = self.registry();
        if registry.closed {
            return Err(CastError::Transport("receiver connection is closed".to_string()));
        }
        let current = self.phase();
        if fail_fast && targets.contains(current) {
            return Err(CastError::InvalidWait(format!(
                "condition is already met (phase is {})",
                current
            )));
        }

        let waiter = Arc::new(Waiter {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            targets,
            gate: EventGate::seeded(|| targets.contains(current)),
            abort: OnceLock::new(),
        });
        registry.waiters.push(waiter.clone());
        Ok(Registration {
            tracker: self,
            waiter,
        })
    }

    /// Wait for the next media status after notification number `since`.
    pub async fn wait_for_update(&self, since: u64, timeout: Duration) -> bool {
        let mut rx = self.snapshot.subscribe();
        let updated = tokio::time::timeout(timeout, rx.wait_for(|snap| snap.seq > since)).await;
        matches!(updated, Ok(Ok(_)))
    }
}
