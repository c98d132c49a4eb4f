use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ThemeParseError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(WidgetId);
id_newtype!(MountNodeId);

/// Generation counter for widget render attempts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RenderVersion(pub u64);

impl RenderVersion {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RenderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ThemeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ThemeParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_parses_only_lowercase_names() {
        assert_eq!("dark".parse::<Theme>().expect("dark"), Theme::Dark);
        assert_eq!("light".parse::<Theme>().expect("light"), Theme::Light);
        assert!("Dark".parse::<Theme>().is_err());
        assert!("".parse::<Theme>().is_err());
    }

    #[test]
    fn theme_serializes_as_lowercase_string() {
        assert_eq!(
            serde_json::to_string(&Theme::Dark).expect("json"),
            "\"dark\""
        );
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }

    #[test]
    fn render_version_is_monotonic() {
        let first = RenderVersion::default().next();
        assert!(first.next() > first);
        assert_eq!(first, RenderVersion(1));
    }
}
