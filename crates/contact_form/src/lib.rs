//! Contact form flow: field validation, URL encoding, submission transport
//! and the section state that ties them to the captcha widget.

pub mod form;
pub mod section;
pub mod transport;

pub use form::{encode_submission, is_valid_email, ContactForm, MESSAGE_MAX_CHARS};
pub use section::{user_message, ContactSection, PendingSubmission, StaticToken, TokenSource};
pub use transport::{FormTransport, HttpFormTransport};
