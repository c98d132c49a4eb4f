use super::*;

use std::{
    collections::HashMap,
    env,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_settings_file(label: &str, contents: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("contact_cli_{label}_{suffix}.toml"));
    fs::write(&path, contents).expect("write settings");
    path
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/contact.toml"), env_from(&[]));
    assert_eq!(settings.form_endpoint, Settings::default().form_endpoint);
    assert!(!settings.captcha_enabled());
    assert_eq!(settings.request_timeout(), Duration::from_secs(15));
}

#[test]
fn file_values_accept_strings_and_integers() {
    let path = temp_settings_file(
        "file_values",
        "form_endpoint = \"https://forms.example.com/\"\nsite_key = \"file-key\"\nrequest_timeout_seconds = 30\n",
    );

    let settings = load_settings_from(&path, env_from(&[]));

    assert_eq!(settings.form_endpoint, "https://forms.example.com/");
    assert_eq!(settings.site_key, "file-key");
    assert_eq!(settings.request_timeout_seconds, 30);
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn environment_overrides_file() {
    let path = temp_settings_file(
        "env_override",
        "form_endpoint = \"https://file.example.com/\"\n",
    );

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("FORM_ENDPOINT", "https://legacy.example.com/"),
            ("APP__FORM_ENDPOINT", "https://app.example.com/"),
            ("SITE_RECAPTCHA_KEY", "env-key"),
            ("APP__REQUEST_TIMEOUT_SECONDS", "not-a-number"),
        ]),
    );

    assert_eq!(settings.form_endpoint, "https://app.example.com/");
    assert_eq!(settings.site_key, "env-key");
    assert_eq!(settings.request_timeout_seconds, 15);
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn malformed_file_is_ignored() {
    let path = temp_settings_file("malformed", "form_endpoint = [unterminated");
    let settings = load_settings_from(&path, env_from(&[]));
    assert_eq!(settings.form_endpoint, Settings::default().form_endpoint);
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn report_hides_site_key() {
    let settings = Settings {
        site_key: "secret".into(),
        ..Settings::default()
    };
    let json = serde_json::to_value(settings.report()).expect("json");
    assert_eq!(json["captcha_enabled"], true);
    assert!(json.get("site_key").is_none());
    assert!(!json.to_string().contains("secret"));
}

#[test]
fn rejects_unparseable_endpoint() {
    let settings = Settings {
        form_endpoint: "not a url".into(),
        ..Settings::default()
    };
    assert!(settings.endpoint_url().is_err());
}
