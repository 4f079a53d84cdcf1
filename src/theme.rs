//! Colour theme preference.
//!
//! The preference is one of [`ThemeMode`] and lives in a cookie. `system`
//! defers to the browser's `prefers-color-scheme`.

use std::fmt;
use std::str::FromStr;

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::AppState;
use crate::config::ThemeConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    System,
}

impl ThemeMode {
    pub const ALL: [ThemeMode; 3] = [ThemeMode::Light, ThemeMode::Dark, ThemeMode::System];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::System => "System",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme mode: {other}")),
        }
    }
}

/// Theme as rendered for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// What the user picked (or the default).
    pub preference: ThemeMode,
    pub enable_system: bool,
    pub disable_transition_on_change: bool,
}

impl Theme {
    /// Read the preference cookie, falling back to the configured default.
    pub fn from_headers(headers: &HeaderMap, config: &ThemeConfig) -> Self {
        let jar = CookieJar::from_headers(headers);
        let stored = jar
            .get(&config.cookie)
            .and_then(|c| c.value().parse::<ThemeMode>().ok());

        let mut preference = stored.unwrap_or(config.default_mode);
        if preference == ThemeMode::System && !config.enable_system {
            preference = ThemeMode::Light;
        }

        Self {
            preference,
            enable_system: config.enable_system,
            disable_transition_on_change: config.disable_transition_on_change,
        }
    }

    /// Class for the `<html>` element. `None` leaves it to the system script.
    pub fn html_class(self) -> Option<&'static str> {
        match self.preference {
            ThemeMode::Light => Some("light"),
            ThemeMode::Dark => Some("dark"),
            ThemeMode::System => None,
        }
    }

    /// Modes offered in the switcher.
    pub fn choices(self) -> Vec<ThemeMode> {
        ThemeMode::ALL
            .into_iter()
            .filter(|m| self.enable_system || *m != ThemeMode::System)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ThemeForm {
    mode: Option<String>,
}

/// Only same-origin paths are followed back.
fn return_path(headers: &HeaderMap) -> String {
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/");
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    if referer.starts_with('/') && !referer.starts_with("//") {
        return referer.to_string();
    }
    match (url::Url::parse(referer), host) {
        (Ok(url), Some(host)) if url.host_str().is_some_and(|h| authority_matches(&url, h, host)) => {
            let mut path = url.path().to_string();
            if let Some(q) = url.query() {
                path.push('?');
                path.push_str(q);
            }
            path
        }
        _ => "/".to_string(),
    }
}

fn authority_matches(url: &url::Url, referer_host: &str, request_host: &str) -> bool {
    match url.port() {
        Some(port) => format!("{referer_host}:{port}") == request_host,
        None => referer_host == request_host,
    }
}

/// `POST /theme` - store the preference and go back.
pub async fn set_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<ThemeForm>,
) -> Result<Response, AppError> {
    let config = &state.config.theme;
    let bad_request = |message: String| AppError::BadRequest {
        path: "/theme".to_string(),
        message,
    };
    let mode = form
        .mode
        .ok_or_else(|| bad_request("missing theme mode".to_string()))?;
    let mode = match mode.parse::<ThemeMode>().map_err(bad_request)? {
        ThemeMode::System if !config.enable_system => {
            return Err(bad_request("system theme is disabled".to_string()));
        }
        mode => mode,
    };

    tracing::debug!(name: "theme.changed", mode = %mode, "Theme preference stored");

    let cookie = Cookie::build((config.cookie.clone(), mode.as_str()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(365));

    Ok((jar.add(cookie), Redirect::to(&return_path(&headers))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(enable_system: bool) -> ThemeConfig {
        ThemeConfig {
            default_mode: ThemeMode::System,
            enable_system,
            disable_transition_on_change: true,
            cookie: "theme".to_string(),
        }
    }

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("Dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!(" light ".parse::<ThemeMode>().unwrap(), ThemeMode::Light);
        assert!("sepia".parse::<ThemeMode>().is_err());
    }

    #[test]
    fn test_cookie_selects_theme() {
        let theme = Theme::from_headers(&with_cookie("theme=dark"), &config(true));
        assert_eq!(theme.preference, ThemeMode::Dark);
        assert_eq!(theme.html_class(), Some("dark"));
    }

    #[test]
    fn test_unknown_cookie_falls_back_to_default() {
        let theme = Theme::from_headers(&with_cookie("theme=sepia"), &config(true));
        assert_eq!(theme.preference, ThemeMode::System);
        assert_eq!(theme.html_class(), None);
    }

    #[test]
    fn test_system_disabled_resolves_to_light() {
        let theme = Theme::from_headers(&HeaderMap::new(), &config(false));
        assert_eq!(theme.preference, ThemeMode::Light);
        assert_eq!(theme.choices(), vec![ThemeMode::Light, ThemeMode::Dark]);
    }

    #[test]
    fn test_return_path_same_origin_only() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        headers.insert(header::REFERER, HeaderValue::from_static("http://localhost:3000/cars?x=1"));
        assert_eq!(return_path(&headers), "/cars?x=1");

        headers.insert(header::REFERER, HeaderValue::from_static("https://evil.example/phish"));
        assert_eq!(return_path(&headers), "/");

        headers.insert(header::REFERER, HeaderValue::from_static("//evil.example/phish"));
        assert_eq!(return_path(&headers), "/");

        headers.remove(header::REFERER);
        assert_eq!(return_path(&headers), "/");
    }
}
