use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use shared::error::FormError;
use tracing::{debug, warn};
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[async_trait]
pub trait FormTransport: Send + Sync {
    async fn post_form(&self, body: String) -> Result<(), FormError>;
}

/// Posts encoded submissions to the form handler endpoint.
pub struct HttpFormTransport {
    http: Client,
    endpoint: Url,
}

impl HttpFormTransport {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, FormError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FormError::Transport(err.to_string()))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl FormTransport for HttpFormTransport {
    async fn post_form(&self, body: String) -> Result<(), FormError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                warn!(endpoint = %self.endpoint, error = %err, "contact form request failed");
                FormError::Transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, %status, "contact form rejected by handler");
            return Err(FormError::Transport(format!("unexpected status {status}")));
        }
        debug!(endpoint = %self.endpoint, %status, "contact form accepted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
