//! Page theme with an optional persisted user override.
//!
//! Without an explicit choice the theme follows the system preference;
//! once the user picks a theme it is stored under [`THEME_PREFERENCE_KEY`]
//! and system changes are ignored until [`ThemeProvider::follow_system`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::Theme;
use tokio::sync::watch;
use tracing::debug;

pub const THEME_PREFERENCE_KEY: &str = "theme";

pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

pub struct ThemeProvider {
    tx: watch::Sender<Theme>,
    store: Arc<dyn PreferenceStore>,
    user_preferred: bool,
    system: Theme,
}

impl ThemeProvider {
    pub fn new(store: Arc<dyn PreferenceStore>, system: Theme) -> Self {
        let stored = store.load(THEME_PREFERENCE_KEY);
        let user_preferred = stored.is_some();
        let theme = stored
            .and_then(|value| value.parse::<Theme>().ok())
            .unwrap_or(system);
        let (tx, _) = watch::channel(theme);

        let provider = Self {
            tx,
            store,
            user_preferred,
            system,
        };
        provider.persist();
        provider
    }

    pub fn theme(&self) -> Theme {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    pub fn user_preferred(&self) -> bool {
        self.user_preferred
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.user_preferred = true;
        self.apply(theme);
        self.persist();
    }

    pub fn toggle(&mut self) -> Theme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    /// Drops the stored override and returns to the system preference.
    pub fn follow_system(&mut self) {
        self.user_preferred = false;
        self.apply(self.system);
        self.persist();
    }

    pub fn set_system_preference(&mut self, theme: Theme) {
        self.system = theme;
        if !self.user_preferred {
            self.apply(theme);
        }
    }

    fn apply(&self, theme: Theme) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == theme {
                return false;
            }
            *current = theme;
            true
        });
        if changed {
            debug!(theme = theme.as_str(), "page theme changed");
        }
    }

    fn persist(&self) {
        if self.user_preferred {
            self.store.store(THEME_PREFERENCE_KEY, self.theme().as_str());
        } else {
            self.store.remove(THEME_PREFERENCE_KEY);
        }
    }
}

#[cfg(test)]
#[path = "tests/theme_tests.rs"]
mod tests;
