use serde::{Deserialize, Serialize};
use shared::error::FormError;
use url::form_urlencoded;

pub const MESSAGE_MAX_CHARS: usize = 2000;
pub const FORM_NAME: &str = "contact";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.first_name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.message.trim().is_empty()
        {
            return Err(FormError::MissingRequired);
        }
        if !is_valid_email(&self.email) {
            return Err(FormError::InvalidEmail);
        }
        if self.message.chars().count() > MESSAGE_MAX_CHARS {
            return Err(FormError::MessageTooLong {
                max: MESSAGE_MAX_CHARS,
            });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// `local@domain.tld` shape check: no whitespace, exactly one `@`, and a dot
/// with characters on both sides somewhere in the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(idx, ch)| ch == '.' && idx > 0 && idx + 1 < domain.len())
}

/// URL-encoded body posted to the form handler.
pub fn encode_submission(form: &ContactForm, token: &str, page_url: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("form-name", FORM_NAME)
        .append_pair("g-recaptcha-response", token)
        .append_pair("firstName", &form.first_name)
        .append_pair("lastName", &form.last_name)
        .append_pair("email", &form.email)
        .append_pair("message", &form.message)
        .append_pair("pageUrl", page_url)
        .finish()
}
