use std::sync::Arc;

use captcha_core::WidgetController;
use shared::{
    error::FormError,
    protocol::{FormStatus, WidgetEvent},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    form::{encode_submission, ContactForm},
    transport::FormTransport,
};

const MSG_SENDING: &str = "Надсилання…";
const MSG_SENT: &str = "Повідомлення надіслано.";
const MSG_WIDGET_ERROR: &str = "Помилка reCAPTCHA. Спробуйте ще.";
const MSG_WIDGET_EXPIRED: &str = "reCAPTCHA прострочена. Підтвердьте ще раз.";

/// Where the submission flow gets its captcha response from.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> String;
    fn reset(&self);
    fn is_ready(&self) -> bool;
}

impl TokenSource for WidgetController {
    fn token(&self) -> String {
        self.get_token()
    }

    fn reset(&self) {
        WidgetController::reset(self);
    }

    fn is_ready(&self) -> bool {
        WidgetController::is_ready(self)
    }
}

/// Pre-solved token, e.g. supplied on the command line.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn token(&self) -> String {
        self.0.clone()
    }

    fn reset(&self) {}

    fn is_ready(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

pub fn user_message(err: &FormError) -> &'static str {
    match err {
        FormError::MissingRequired => "Заповніть обовʼязкові поля.",
        FormError::InvalidEmail => "Некоректний email.",
        FormError::MessageTooLong { .. } => "Повідомлення задовге (до 2000 символів).",
        FormError::CaptchaUnsolved => "Підтвердьте reCAPTCHA.",
        FormError::InFlight => MSG_SENDING,
        FormError::Transport(_) => "Помилка при надсиланні. Спробуйте ще раз.",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    body: String,
}

impl PendingSubmission {
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Contact section state: form fields, status line and submit gating.
pub struct ContactSection {
    form: ContactForm,
    status: Option<FormStatus>,
    submitting: bool,
    tokens: Arc<dyn TokenSource>,
    transport: Arc<dyn FormTransport>,
    page_url: String,
}

impl ContactSection {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn FormTransport>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            form: ContactForm::default(),
            status: None,
            submitting: false,
            tokens,
            transport,
            page_url: page_url.into(),
        }
    }

    pub fn form(&self) -> &ContactForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ContactForm {
        &mut self.form
    }

    pub fn status(&self) -> Option<&FormStatus> {
        self.status.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && self.tokens.is_ready()
    }

    pub fn handle_widget_event(&mut self, event: &WidgetEvent) {
        let message = match event {
            WidgetEvent::Errored => MSG_WIDGET_ERROR,
            WidgetEvent::Expired => MSG_WIDGET_EXPIRED,
            _ => return,
        };
        self.status = Some(FormStatus::error(message));
    }

    /// Applies every queued widget event; returns how many were handled.
    pub fn drain_widget_events(
        &mut self,
        events: &mut broadcast::Receiver<WidgetEvent>,
    ) -> usize {
        let mut handled = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.handle_widget_event(&event);
                    handled += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "widget event receiver lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return handled,
            }
        }
    }

    /// Validates the form and captures the captcha token. On success the
    /// section is marked as submitting until [`Self::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, FormError> {
        if self.submitting {
            return Err(FormError::InFlight);
        }
        self.status = None;

        if let Err(err) = self.form.validate() {
            self.status = Some(FormStatus::error(user_message(&err)));
            return Err(err);
        }

        let token = self.tokens.token();
        if token.is_empty() {
            let err = FormError::CaptchaUnsolved;
            self.status = Some(FormStatus::error(user_message(&err)));
            return Err(err);
        }

        self.submitting = true;
        self.status = Some(FormStatus::info(MSG_SENDING));
        Ok(PendingSubmission {
            body: encode_submission(&self.form, &token, &self.page_url),
        })
    }

    pub fn finish_submit(&mut self, outcome: Result<(), FormError>) -> Result<(), FormError> {
        self.submitting = false;
        match outcome {
            Ok(()) => {
                info!("contact form submitted");
                self.status = Some(FormStatus::success(MSG_SENT));
                self.form.clear();
                self.tokens.reset();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "contact form submission failed");
                self.status = Some(FormStatus::error(user_message(&err)));
                Err(err)
            }
        }
    }

    pub async fn submit(&mut self) -> Result<(), FormError> {
        let pending = self.begin_submit()?;
        let transport = Arc::clone(&self.transport);
        let outcome = transport.post_form(pending.body).await;
        self.finish_submit(outcome)
    }
}

#[cfg(test)]
#[path = "tests/section_tests.rs"]
mod tests;
