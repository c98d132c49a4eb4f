use super::*;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use shared::protocol::StatusKind;

struct RecordingTransport {
    bodies: Mutex<Vec<String>>,
    fail_with: Option<FormError>,
}

impl RecordingTransport {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
            fail_with: Some(FormError::Transport("unexpected status 500".into())),
        })
    }

    fn bodies(&self) -> Vec<String> {
        self.bodies.lock().expect("bodies").clone()
    }
}

#[async_trait]
impl FormTransport for RecordingTransport {
    async fn post_form(&self, body: String) -> Result<(), FormError> {
        self.bodies.lock().expect("bodies").push(body);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

struct CountingToken {
    token: Mutex<String>,
    ready: AtomicBool,
    resets: AtomicUsize,
}

impl CountingToken {
    fn solved(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(token.to_string()),
            ready: AtomicBool::new(true),
            resets: AtomicUsize::new(0),
        })
    }
}

impl TokenSource for CountingToken {
    fn token(&self) -> String {
        self.token.lock().expect("token").clone()
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.token.lock().expect("token").clear();
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

fn fill(section: &mut ContactSection) {
    let form = section.form_mut();
    form.first_name = "Ivan".into();
    form.last_name = "Petrenko".into();
    form.email = "ivan@example.com".into();
    form.message = "Потрібна консультація".into();
}

#[tokio::test]
async fn successful_submission_clears_fields_and_resets_token() {
    let tokens = CountingToken::solved("captcha-token");
    let transport = RecordingTransport::ok();
    let mut section = ContactSection::new(
        tokens.clone(),
        transport.clone(),
        "https://example.com/",
    );
    fill(&mut section);

    section.submit().await.expect("submit");

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].starts_with("form-name=contact&g-recaptcha-response=captcha-token&"));
    assert!(bodies[0].ends_with("&pageUrl=https%3A%2F%2Fexample.com%2F"));

    let status = section.status().expect("status");
    assert_eq!(status.kind, StatusKind::Success);
    assert_eq!(section.form(), &ContactForm::default());
    assert_eq!(tokens.resets.load(Ordering::SeqCst), 1);
    assert!(!section.is_submitting());
}

#[tokio::test]
async fn transport_failure_keeps_fields_and_token() {
    let tokens = CountingToken::solved("captcha-token");
    let mut section = ContactSection::new(tokens.clone(), RecordingTransport::failing(), "");
    fill(&mut section);
    let before = section.form().clone();

    let err = section.submit().await.expect_err("should fail");

    assert!(matches!(err, FormError::Transport(_)));
    assert_eq!(section.form(), &before);
    assert_eq!(tokens.resets.load(Ordering::SeqCst), 0);
    let status = section.status().expect("status");
    assert!(status.is_error());
    assert_eq!(status.message, "Помилка при надсиланні. Спробуйте ще раз.");
    assert!(section.can_submit());
}

#[tokio::test]
async fn validation_failure_never_reaches_transport() {
    let transport = RecordingTransport::ok();
    let mut section = ContactSection::new(
        CountingToken::solved("captcha-token"),
        transport.clone(),
        "",
    );
    fill(&mut section);
    section.form_mut().email = "ivan@example".into();

    let err = section.submit().await.expect_err("invalid email");

    assert_eq!(err, FormError::InvalidEmail);
    assert_eq!(section.status().expect("status").message, "Некоректний email.");
    assert!(transport.bodies().is_empty());
}

#[tokio::test]
async fn unsolved_captcha_blocks_submission() {
    let transport = RecordingTransport::ok();
    let mut section = ContactSection::new(CountingToken::solved(""), transport.clone(), "");
    fill(&mut section);

    let err = section.submit().await.expect_err("no token");

    assert_eq!(err, FormError::CaptchaUnsolved);
    assert_eq!(
        section.status().expect("status").message,
        "Підтвердьте reCAPTCHA."
    );
    assert!(transport.bodies().is_empty());
}

#[test]
fn second_submission_is_rejected_while_first_is_in_flight() {
    let mut section = ContactSection::new(
        CountingToken::solved("captcha-token"),
        RecordingTransport::ok(),
        "",
    );
    fill(&mut section);

    let pending = section.begin_submit().expect("first submission");
    assert!(pending.body().contains("firstName=Ivan"));
    assert!(section.is_submitting());
    assert!(!section.can_submit());
    assert_eq!(section.status().expect("status").kind, StatusKind::Info);

    assert_eq!(section.begin_submit(), Err(FormError::InFlight));

    section.finish_submit(Ok(())).expect("finish");
    assert!(!section.is_submitting());
}

#[test]
fn submit_is_gated_on_widget_readiness() {
    let tokens = CountingToken::solved("captcha-token");
    tokens.ready.store(false, Ordering::SeqCst);
    let section = ContactSection::new(tokens.clone(), RecordingTransport::ok(), "");
    assert!(!section.can_submit());

    tokens.ready.store(true, Ordering::SeqCst);
    assert!(section.can_submit());
}

#[test]
fn widget_errors_become_status_messages() {
    let mut section = ContactSection::new(
        Arc::new(StaticToken("token".into())),
        RecordingTransport::ok(),
        "",
    );
    let (tx, mut rx) = broadcast::channel(8);
    tx.send(WidgetEvent::Solved).expect("send");
    tx.send(WidgetEvent::Expired).expect("send");

    assert_eq!(section.drain_widget_events(&mut rx), 2);
    let status = section.status().expect("status");
    assert!(status.is_error());
    assert_eq!(status.message, "reCAPTCHA прострочена. Підтвердьте ще раз.");

    section.handle_widget_event(&WidgetEvent::Errored);
    assert_eq!(
        section.status().expect("status").message,
        "Помилка reCAPTCHA. Спробуйте ще."
    );

    section.handle_widget_event(&WidgetEvent::ReadinessChanged { ready: true });
    assert_eq!(
        section.status().expect("status").message,
        "Помилка reCAPTCHA. Спробуйте ще."
    );
}

#[test]
fn static_token_is_ready_only_when_non_empty() {
    assert!(StaticToken("abc".into()).is_ready());
    assert!(!StaticToken("  ".into()).is_ready());
}
