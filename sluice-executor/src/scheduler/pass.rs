//! Bookkeeping shared by both scheduling loops.

use super::config::ExecutorConfig;
use super::summary::Termination;
use sluice_core::condition::Readiness;
use sluice_core::shutdown::ShutdownHandle;
use std::time::Instant;

/// What one scheduling pass observed.
#[derive(Debug)]
pub(crate) struct PassState {
    pub(crate) ticked: bool,
    pub(crate) all_never: bool,
    pub(crate) next_timer: Option<Instant>,
    pub(crate) external: bool,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            ticked: false,
            all_never: true,
            next_timer: None,
            external: false,
        }
    }
}

impl PassState {
    /// Record a readiness result that did not lead to a tick.
    pub(crate) fn observe(&mut self, readiness: Readiness) {
        match readiness {
            Readiness::Never => {}
            Readiness::NotReady | Readiness::Ready => self.all_never = false,
            Readiness::WaitUntil(at) => {
                self.all_never = false;
                self.next_timer = Some(self.next_timer.map_or(at, |t| t.min(at)));
            }
        }
    }

    /// Record an operator held back only by outside toggles.
    pub(crate) fn awaiting_external(&mut self) {
        self.all_never = false;
        self.external = true;
    }

    /// Record a tick.
    pub(crate) fn ticked(&mut self) {
        self.ticked = true;
        self.all_never = false;
    }
}

/// Checks made before every pass.
pub(crate) fn should_stop(shutdown: &ShutdownHandle, deadline: Option<Instant>) -> Option<Termination> {
    if shutdown.is_requested() {
        return Some(Termination::ShutdownRequested);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Some(Termination::MaxDuration);
    }
    None
}

/// Decide what to do after a pass in which nothing ticked.
///
/// Sleeps until the earliest pending timer, or for one poll interval while an
/// operator waits on an outside toggle (or on anything, with
/// `stop_on_deadlock` off), waking early on a stop request. Returns a
/// termination when there is nothing left to wait for.
pub(crate) async fn idle(
    pass: &PassState,
    config: &ExecutorConfig,
    shutdown: &ShutdownHandle,
    deadline: Option<Instant>,
) -> Option<Termination> {
    // A request that lands mid-pass makes everything Never; report it as such.
    if shutdown.is_requested() {
        return Some(Termination::ShutdownRequested);
    }
    let poll = (!pass.all_never && (pass.external || !config.stop_on_deadlock))
        .then(|| Instant::now() + config.check_recession_period);
    let wake = match (pass.next_timer, poll) {
        (Some(timer), Some(poll)) => timer.min(poll),
        (Some(at), None) | (None, Some(at)) => at,
        (None, None) => {
            tracing::debug!(all_never = pass.all_never, "Nothing ready, nothing left to wait for");
            return Some(Termination::Drained);
        }
    };
    let wake = deadline.map_or(wake, |d| d.min(wake));
    tokio::select! {
        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {}
        _ = shutdown.notified() => {}
    }
    None
}
