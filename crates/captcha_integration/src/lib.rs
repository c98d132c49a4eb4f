//! Seam between the widget lifecycle controller and the third-party
//! verification library plus the DOM container it renders into.

use std::{fmt, sync::Arc};

use shared::{
    domain::{MountNodeId, Theme, WidgetId},
    error::CaptchaApiError,
};

pub type WidgetCallback = Arc<dyn Fn() + Send + Sync>;
pub type TokenCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callbacks wired into a single render call. The library may invoke them
/// at any time, including synchronously from inside `render`.
#[derive(Clone)]
pub struct WidgetCallbacks {
    pub on_solved: TokenCallback,
    pub on_error: WidgetCallback,
    pub on_expired: WidgetCallback,
}

impl fmt::Debug for WidgetCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetCallbacks").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RenderParams {
    pub site_key: String,
    pub theme: Theme,
    pub callbacks: WidgetCallbacks,
}

/// Explicit-render API of the verification library.
pub trait CaptchaApi: Send + Sync {
    fn render(&self, node: MountNodeId, params: RenderParams) -> Result<WidgetId, CaptchaApiError>;
    /// Response token of a solved widget; `None` while unsolved.
    fn get_response(&self, widget: WidgetId) -> Option<String>;
    fn reset(&self, widget: WidgetId) -> Result<(), CaptchaApiError>;
}

/// Mount point owned exclusively by one controller.
pub trait WidgetContainer: Send + Sync {
    fn is_mounted(&self) -> bool;
    fn clear_children(&self);
    fn append_mount_node(&self) -> MountNodeId;
    /// Whether the widget's interactive frame is present under the container.
    fn has_interactive_frame(&self) -> bool;
}
