use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use captcha_integration::{CaptchaApi, RenderParams, WidgetCallbacks, WidgetContainer};
use shared::{
    domain::{RenderVersion, Theme, WidgetId},
    protocol::WidgetEvent,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod library;
pub mod theme;

pub use library::LibraryReadiness;
pub use theme::{MemoryPreferenceStore, PreferenceStore, ThemeProvider};

/// Delay between issuing a render and checking for the widget frame.
pub const READINESS_CHECK_DELAY: Duration = Duration::from_millis(60);
/// Wait before re-rendering after a failed render or a missing frame.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(400);
/// Retries chained across generations before waiting for an outside trigger.
pub const MAX_CONSECUTIVE_RETRIES: u32 = 8;

/// State of the currently mounted widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetSession {
    pub widget_id: Option<WidgetId>,
    pub render_version: RenderVersion,
    pub theme: Option<Theme>,
    pub ready: bool,
    pub loaded: bool,
}

struct ControllerState {
    session: WidgetSession,
    timers: Vec<JoinHandle<()>>,
    torn_down: bool,
}

struct ControllerInner {
    api: Arc<dyn CaptchaApi>,
    container: Arc<dyn WidgetContainer>,
    site_key: String,
    theme: watch::Receiver<Theme>,
    state: Mutex<ControllerState>,
    /// Held for a whole render pass so mounts never interleave.
    render_lock: Mutex<()>,
    ready_tx: watch::Sender<bool>,
    events: broadcast::Sender<WidgetEvent>,
}

/// Mounts the verification widget into its container and keeps it in sync
/// with the page theme.
///
/// Every render attempt bumps the session's [`RenderVersion`]; timers and
/// widget callbacks capture the version they were created for and do
/// nothing once a newer render has started. Must be used from within a
/// Tokio runtime.
pub struct WidgetController {
    inner: Arc<ControllerInner>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl WidgetController {
    pub fn initialize(
        container: Arc<dyn WidgetContainer>,
        site_key: impl Into<String>,
        theme: watch::Receiver<Theme>,
        api: Arc<dyn CaptchaApi>,
        library: &LibraryReadiness,
    ) -> Self {
        let site_key = site_key.into().trim().to_string();
        let (ready_tx, _) = watch::channel(false);
        let (events, _) = broadcast::channel(256);
        let inner = Arc::new(ControllerInner {
            api,
            container,
            site_key,
            theme: theme.clone(),
            state: Mutex::new(ControllerState {
                session: WidgetSession::default(),
                timers: Vec::new(),
                torn_down: false,
            }),
            render_lock: Mutex::new(()),
            ready_tx,
            events,
        });

        if inner.site_key.is_empty() {
            warn!("captcha site key is not configured; verification widget stays disabled");
            return Self {
                inner,
                observer: Mutex::new(None),
            };
        }

        let observer = spawn_theme_observer(Arc::downgrade(&inner), theme);
        let weak = Arc::downgrade(&inner);
        library.on_ready(move || {
            if let Some(inner) = weak.upgrade() {
                inner.mark_loaded();
            }
        });

        Self {
            inner,
            observer: Mutex::new(Some(observer)),
        }
    }

    /// Tears down any mounted widget and mounts a fresh one.
    pub fn render(&self) {
        self.inner.render(0);
    }

    /// Response token of the solved widget, or an empty string.
    pub fn get_token(&self) -> String {
        let widget = self.inner.state().session.widget_id;
        widget
            .and_then(|widget| self.inner.api.get_response(widget))
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        let Some(widget) = self.inner.state().session.widget_id else {
            return;
        };
        if let Err(err) = self.inner.api.reset(widget) {
            debug!(widget = widget.0, error = %err, "ignoring captcha reset failure");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready_tx.borrow()
    }

    pub fn is_enabled(&self) -> bool {
        !self.inner.site_key.is_empty()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.inner.ready_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WidgetEvent> {
        self.inner.events.subscribe()
    }

    pub fn session(&self) -> WidgetSession {
        self.inner.state().session.clone()
    }

    pub fn container(&self) -> Arc<dyn WidgetContainer> {
        Arc::clone(&self.inner.container)
    }

    /// Stops observing the theme and cancels pending timers. Idempotent.
    pub fn teardown(&self) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(observer) = observer {
            observer.abort();
        }

        let timers = {
            let mut state = self.inner.state();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            self.inner.set_ready(&mut state, false);
            std::mem::take(&mut state.timers)
        };
        for timer in timers {
            timer.abort();
        }
        debug!("captcha controller torn down");
        let _ = self.inner.events.send(WidgetEvent::TornDown);
    }
}

impl Drop for WidgetController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ControllerInner {
    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_ready(&self, state: &mut ControllerState, ready: bool) {
        if state.session.ready == ready {
            return;
        }
        state.session.ready = ready;
        self.ready_tx.send_replace(ready);
        let _ = self.events.send(WidgetEvent::ReadinessChanged { ready });
    }

    fn mark_loaded(self: &Arc<Self>) {
        {
            let mut state = self.state();
            if state.torn_down {
                return;
            }
            state.session.loaded = true;
        }
        info!("captcha library available; mounting widget");
        self.render(0);
    }

    fn render(self: &Arc<Self>, retries: u32) {
        self.mount(retries, None);
    }

    /// Runs one render pass. With `theme_change` set, the pass is skipped
    /// when the widget already carries that theme and the previous widget
    /// is reset before its node is cleared.
    fn mount(self: &Arc<Self>, retries: u32, theme_change: Option<Theme>) {
        let _render = self
            .render_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = {
            let mut state = self.state();
            if state.torn_down || !state.session.loaded || self.site_key.is_empty() {
                debug!("captcha render skipped; library or site key unavailable");
                return;
            }
            if !self.container.is_mounted() {
                debug!("captcha render skipped; container is not mounted");
                return;
            }
            if let Some(theme) = theme_change {
                if state.session.theme == Some(theme) {
                    debug!(theme = theme.as_str(), "captcha already rendered with this theme");
                    return;
                }
            }
            self.set_ready(&mut state, false);
            for timer in state.timers.drain(..) {
                timer.abort();
            }
            state.session.widget_id.take()
        };

        if let Some(theme) = theme_change {
            if let Some(widget) = previous {
                if let Err(err) = self.api.reset(widget) {
                    debug!(
                        widget = widget.0,
                        error = %err,
                        "ignoring captcha reset failure before re-render"
                    );
                }
            }
            info!(theme = theme.as_str(), "theme changed; re-rendering captcha widget");
        }

        self.container.clear_children();
        let node = self.container.append_mount_node();
        let theme = *self.theme.borrow();

        let version = {
            let mut state = self.state();
            if state.torn_down {
                return;
            }
            state.session.render_version = state.session.render_version.next();
            state.session.theme = Some(theme);
            state.session.render_version
        };

        debug!(
            version = version.0,
            theme = theme.as_str(),
            retries,
            "rendering captcha widget"
        );
        let _ = self.events.send(WidgetEvent::Rendering { version, theme });

        let params = RenderParams {
            site_key: self.site_key.clone(),
            theme,
            callbacks: self.callbacks(version),
        };
        match self.api.render(node, params) {
            Ok(widget) => {
                let mut state = self.state();
                if state.torn_down || state.session.render_version != version {
                    return;
                }
                state.session.widget_id = Some(widget);
                let timer = self.spawn_readiness_check(version, retries);
                push_timer(&mut state, timer);
            }
            Err(err) => {
                warn!(version = version.0, error = %err, "captcha render call failed");
                let mut state = self.state();
                if state.torn_down || state.session.render_version != version {
                    return;
                }
                self.schedule_retry(&mut state, version, retries);
            }
        }
    }

    fn callbacks(self: &Arc<Self>, version: RenderVersion) -> WidgetCallbacks {
        let solved = Arc::downgrade(self);
        let errored = Arc::downgrade(self);
        let expired = Arc::downgrade(self);
        WidgetCallbacks {
            on_solved: Arc::new(move |_token| {
                if let Some(inner) = solved.upgrade() {
                    inner.on_solved(version);
                }
            }),
            on_error: Arc::new(move || {
                if let Some(inner) = errored.upgrade() {
                    inner.on_widget_failure(version, WidgetEvent::Errored);
                }
            }),
            on_expired: Arc::new(move || {
                if let Some(inner) = expired.upgrade() {
                    inner.on_widget_failure(version, WidgetEvent::Expired);
                }
            }),
        }
    }

    fn on_solved(&self, version: RenderVersion) {
        let mut state = self.state();
        if state.torn_down || state.session.render_version != version {
            return;
        }
        let _ = self.events.send(WidgetEvent::Solved);
        if self.container.has_interactive_frame() {
            self.set_ready(&mut state, true);
        }
    }

    fn on_widget_failure(&self, version: RenderVersion, event: WidgetEvent) {
        let mut state = self.state();
        if state.torn_down || state.session.render_version != version {
            return;
        }
        warn!(version = version.0, ?event, "captcha widget reported a failure");
        self.set_ready(&mut state, false);
        let _ = self.events.send(event);
    }

    fn spawn_readiness_check(
        self: &Arc<Self>,
        version: RenderVersion,
        retries: u32,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(READINESS_CHECK_DELAY).await;
            if let Some(inner) = weak.upgrade() {
                inner.confirm_ready(version, retries);
            }
        })
    }

    fn confirm_ready(self: &Arc<Self>, version: RenderVersion, retries: u32) {
        let mut state = self.state();
        if state.torn_down || state.session.render_version != version {
            return;
        }
        if self.container.has_interactive_frame() {
            debug!(version = version.0, "captcha widget frame detected");
            self.set_ready(&mut state, true);
        } else {
            debug!(version = version.0, "captcha widget frame not detected yet");
            self.schedule_retry(&mut state, version, retries);
        }
    }

    fn schedule_retry(
        self: &Arc<Self>,
        state: &mut ControllerState,
        version: RenderVersion,
        retries: u32,
    ) {
        if retries >= MAX_CONSECUTIVE_RETRIES {
            warn!(
                version = version.0,
                retries, "captcha render retries exhausted; waiting for the next render trigger"
            );
            return;
        }

        let _ = self.events.send(WidgetEvent::RetryScheduled { version });
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(RETRY_BACKOFF).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let current = {
                let state = inner.state();
                !state.torn_down && state.session.render_version == version && !state.session.ready
            };
            if current {
                inner.render(retries + 1);
            }
        });
        push_timer(state, timer);
    }

    fn needs_theme_render(&self, theme: Theme) -> bool {
        let state = self.state();
        !state.torn_down && state.session.loaded && state.session.theme != Some(theme)
    }
}

fn push_timer(state: &mut ControllerState, timer: JoinHandle<()>) {
    state.timers.retain(|timer| !timer.is_finished());
    state.timers.push(timer);
}

fn spawn_theme_observer(
    inner: Weak<ControllerInner>,
    mut theme: watch::Receiver<Theme>,
) -> JoinHandle<()> {
    let _ = theme.borrow_and_update();
    tokio::spawn(async move {
        while theme.changed().await.is_ok() {
            let next = *theme.borrow_and_update();
            let Some(controller) = inner.upgrade() else {
                break;
            };
            if !controller.needs_theme_render(next) {
                continue;
            }
            // let the notifier finish its own batch before remounting
            tokio::task::yield_now().await;
            controller.mount(0, Some(next));
        }
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
