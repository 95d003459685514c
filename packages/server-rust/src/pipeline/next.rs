//! The next-step continuation handed to every handler.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::failure::Failure;

/// Continuation taking an optional failure.
///
/// Cloning shares the same slot, so the host sees whatever the handler (or
/// the adapter around it) recorded. Only the first failure is kept; later
/// ones are logged and dropped.
#[derive(Debug, Clone, Default)]
pub struct Next {
    state: Arc<Mutex<NextState>>,
}

#[derive(Debug, Default)]
struct NextState {
    calls: u32,
    failure: Option<Failure>,
}

impl Next {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invokes the continuation. `Some` forwards to the failure path, `None`
    /// passes control on without a failure.
    pub fn call(&self, failure: Option<Failure>) {
        let mut state = self.state.lock();
        state.calls += 1;
        let Some(incoming) = failure else {
            return;
        };
        if state.failure.is_none() {
            state.failure = Some(incoming);
        } else {
            warn!(dropped = %incoming, "continuation already carries a failure; dropping the later one");
        }
    }

    /// Forwards `failure` to the failure path.
    pub fn fail(&self, failure: impl Into<Failure>) {
        self.call(Some(failure.into()));
    }

    /// Passes control on without a failure.
    pub fn pass(&self) {
        self.call(None);
    }

    /// Whether the continuation was invoked at all.
    #[must_use]
    pub fn was_called(&self) -> bool {
        self.state.lock().calls > 0
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.state.lock().calls
    }

    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.state.lock().failure.is_some()
    }

    /// Removes and returns the recorded failure. Used by the host after the
    /// handler finished.
    #[must_use]
    pub fn take_failure(&self) -> Option<Failure> {
        self.state.lock().failure.take()
    }
}
