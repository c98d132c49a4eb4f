use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Serialize;
use url::Url;

pub const SETTINGS_FILE: &str = "contact.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub form_endpoint: String,
    /// Widget site key. The CLI submits pre-solved tokens, so the key only
    /// decides whether `show-config` reports the widget as enabled.
    pub site_key: String,
    pub page_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            form_endpoint: "http://127.0.0.1:8888/".into(),
            site_key: String::new(),
            page_url: "http://127.0.0.1:8888/#contact".into(),
            request_timeout_seconds: 15,
        }
    }
}

/// Printable view of [`Settings`] that never exposes the site key.
#[derive(Debug, Serialize)]
pub struct SettingsReport {
    pub form_endpoint: String,
    pub page_url: String,
    pub request_timeout_seconds: u64,
    pub captcha_enabled: bool,
}

impl Settings {
    pub fn captcha_enabled(&self) -> bool {
        !self.site_key.trim().is_empty()
    }

    pub fn endpoint_url(&self) -> anyhow::Result<Url> {
        Url::parse(self.form_endpoint.trim())
            .with_context(|| format!("invalid form endpoint '{}'", self.form_endpoint))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }

    pub fn report(&self) -> SettingsReport {
        SettingsReport {
            form_endpoint: self.form_endpoint.clone(),
            page_url: self.page_url.clone(),
            request_timeout_seconds: self.request_timeout_seconds,
            captcha_enabled: self.captcha_enabled(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// File values first, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<toml::Table>(&raw) {
            if let Some(v) = table_string(&file_cfg, "form_endpoint") {
                settings.form_endpoint = v;
            }
            if let Some(v) = table_string(&file_cfg, "site_key") {
                settings.site_key = v;
            }
            if let Some(v) = table_string(&file_cfg, "page_url") {
                settings.page_url = v;
            }
            if let Some(v) = table_string(&file_cfg, "request_timeout_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.request_timeout_seconds = parsed;
                }
            }
        }
    }

    if let Some(v) = env("SITE_RECAPTCHA_KEY") {
        settings.site_key = v;
    }

    if let Some(v) = env("FORM_ENDPOINT") {
        settings.form_endpoint = v;
    }
    if let Some(v) = env("APP__FORM_ENDPOINT") {
        settings.form_endpoint = v;
    }

    if let Some(v) = env("APP__PAGE_URL") {
        settings.page_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }

    settings
}

fn table_string(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
