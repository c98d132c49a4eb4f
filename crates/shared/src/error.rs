use thiserror::Error;

use crate::domain::WidgetId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme '{0}', expected 'light' or 'dark'")]
pub struct ThemeParseError(pub String);

/// Failures reported by the third-party verification library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptchaApiError {
    #[error("captcha render failed: {0}")]
    Render(String),
    #[error("unknown captcha widget {0:?}")]
    UnknownWidget(WidgetId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("required contact fields are empty")]
    MissingRequired,
    #[error("email address is malformed")]
    InvalidEmail,
    #[error("message exceeds {max} characters")]
    MessageTooLong { max: usize },
    #[error("captcha challenge is not solved")]
    CaptchaUnsolved,
    #[error("a submission is already in flight")]
    InFlight,
    #[error("form submission failed: {0}")]
    Transport(String),
}
