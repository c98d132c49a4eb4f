//! One-shot "library loaded" broadcast shared by every widget controller on
//! the page.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, info};

type Listener = Box<dyn FnOnce() + Send>;

enum ReadinessState {
    Pending(Vec<Listener>),
    Ready,
}

pub struct LibraryReadiness {
    state: Mutex<ReadinessState>,
}

impl Default for LibraryReadiness {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryReadiness {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReadinessState::Pending(Vec::new())),
        }
    }

    /// Process-wide registry fed by the script loader's ready callback.
    pub fn global() -> &'static LibraryReadiness {
        static GLOBAL: OnceLock<LibraryReadiness> = OnceLock::new();
        GLOBAL.get_or_init(LibraryReadiness::new)
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state(), ReadinessState::Ready)
    }

    /// Registers `listener` for the ready notification. Runs it right away
    /// (and returns `true`) when the library has already loaded.
    pub fn on_ready<F>(&self, listener: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state();
            if let ReadinessState::Pending(listeners) = &mut *state {
                listeners.push(Box::new(listener));
                debug!(pending = listeners.len(), "queued captcha library listener");
                return false;
            }
        }
        listener();
        true
    }

    /// Notifies every pending listener once, in registration order.
    /// Returns the number of listeners notified; later calls return 0.
    pub fn mark_ready(&self) -> usize {
        let listeners = {
            let mut state = self.state();
            match std::mem::replace(&mut *state, ReadinessState::Ready) {
                ReadinessState::Pending(listeners) => listeners,
                ReadinessState::Ready => return 0,
            }
        };

        let count = listeners.len();
        info!(listeners = count, "captcha library loaded");
        for listener in listeners {
            listener();
        }
        count
    }

    fn state(&self) -> MutexGuard<'_, ReadinessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
