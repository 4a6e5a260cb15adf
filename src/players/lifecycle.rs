//! Per-player state machine and cooperative cancellation.
//!
//! ```text
//! Idle -> Loading -> Ready/Playing <-> Paused
//!   ^                                   |
//!   +------------- stop() --------------+   (from any state)
//! ```
//!
//! `Loading` is the only state with a live [`CancellationToken`]. A load
//! continuation must call [`Lifecycle::commit`] to leave it, which fails once
//! `stop()` (or a newer `play()`) has cancelled the token.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::PlayerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

impl PlayerState {
    /// Whether transport controls act on the owned resource.
    pub fn is_active(&self) -> bool {
        matches!(self, PlayerState::Ready | PlayerState::Playing | PlayerState::Paused)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancelled; use after every await in a load.
    pub fn check(&self) -> Result<(), PlayerError> {
        if self.is_cancelled() {
            Err(PlayerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct Lifecycle {
    owner: &'static str,
    state: Mutex<PlayerState>,
    token: Mutex<Option<CancellationToken>>,
}

impl Lifecycle {
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            state: Mutex::new(PlayerState::Idle),
            token: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Enters `Loading`, cancelling any load still in flight.
    pub fn begin_load(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.token.lock().replace(token.clone()) {
            previous.cancel();
        }
        *self.state.lock() = PlayerState::Loading;
        log::debug!("[{}] Loading", self.owner);
        token
    }

    /// Leaves `Loading` for `next` unless the load was cancelled.
    pub fn commit(&self, token: &CancellationToken, next: PlayerState) -> Result<(), PlayerError> {
        token.check()?;

        {
            let mut state = self.state.lock();
            if *state != PlayerState::Loading {
                return Err(PlayerError::Cancelled);
            }
            *state = next;
        }
        self.token.lock().take();
        log::debug!("[{}] {:?}", self.owner, next);
        Ok(())
    }

    /// Moves between the active states. Ignored outside them.
    pub fn transition(&self, next: PlayerState) -> bool {
        let mut state = self.state.lock();
        if !state.is_active() || !next.is_active() {
            return false;
        }
        *state = next;
        true
    }

    /// A load failed on its own. Returns to `Idle` if `token` is still the
    /// current load.
    pub fn fail(&self, token: &CancellationToken) {
        let mut current = self.token.lock();
        let is_current = current
            .as_ref()
            .is_some_and(|t| Arc::ptr_eq(&t.cancelled, &token.cancelled));
        if is_current {
            current.take();
            *self.state.lock() = PlayerState::Idle;
            log::debug!("[{}] Load failed, back to Idle", self.owner);
        }
    }

    /// Cancels any load and returns to `Idle`. Returns the previous state.
    pub fn stop(&self) -> PlayerState {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
        let previous = std::mem::replace(&mut *self.state.lock(), PlayerState::Idle);
        if previous != PlayerState::Idle {
            log::debug!("[{}] {:?} -> Idle", self.owner, previous);
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_commit_and_transport_transitions() {
        let lifecycle = Lifecycle::new("Test");
        assert!(!lifecycle.transition(PlayerState::Paused));

        let token = lifecycle.begin_load();
        assert!(!lifecycle.is_active());
        lifecycle.commit(&token, PlayerState::Playing).unwrap();

        assert!(lifecycle.transition(PlayerState::Paused));
        assert_eq!(lifecycle.state(), PlayerState::Paused);
        assert!(!lifecycle.transition(PlayerState::Loading));
    }

    #[test]
    fn test_stop_during_load_rejects_commit() {
        let lifecycle = Lifecycle::new("Test");
        let token = lifecycle.begin_load();

        assert_eq!(lifecycle.stop(), PlayerState::Loading);
        assert!(token.is_cancelled());
        assert_eq!(lifecycle.commit(&token, PlayerState::Playing), Err(PlayerError::Cancelled));
        assert_eq!(lifecycle.state(), PlayerState::Idle);
    }

    #[test]
    fn test_new_load_cancels_previous() {
        let lifecycle = Lifecycle::new("Test");
        let first = lifecycle.begin_load();
        let second = lifecycle.begin_load();

        assert!(first.is_cancelled());
        assert!(lifecycle.commit(&first, PlayerState::Playing).is_err());
        assert!(lifecycle.commit(&second, PlayerState::Playing).is_ok());
    }

    #[test]
    fn test_stale_failure_does_not_reset_newer_load() {
        let lifecycle = Lifecycle::new("Test");
        let first = lifecycle.begin_load();
        let _second = lifecycle.begin_load();

        lifecycle.fail(&first);
        assert_eq!(lifecycle.state(), PlayerState::Loading);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let lifecycle = Lifecycle::new("Test");
        assert_eq!(lifecycle.stop(), PlayerState::Idle);
        assert_eq!(lifecycle.stop(), PlayerState::Idle);
    }
}
