use serde::{Deserialize, Serialize};

use crate::domain::{RenderVersion, Theme};

/// Notifications published by the widget lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WidgetEvent {
    Rendering {
        version: RenderVersion,
        theme: Theme,
    },
    ReadinessChanged {
        ready: bool,
    },
    Solved,
    Errored,
    Expired,
    RetryScheduled {
        version: RenderVersion,
    },
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// User-visible status line of the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl FormStatus {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, message)
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}
