//! Server-rendered UI.
//!
//! Pages are composed the same way for every route: page body inside the
//! [`layout::main_layout`] (header + main column) inside the
//! [`document::root_layout`] (document head, theme, identity wiring).
//!
//! # Structure
//!
//! - [`document`]: root layout and site metadata
//! - [`layout`]: header bar, theme switcher, user button
//! - [`pages`]: page bodies
//! - [`html`]: escaping helpers

pub mod document;
pub mod html;
pub mod layout;
pub mod pages;

use crate::config::IdentityConfig;
use crate::identity::Identity;
use crate::theme::Theme;

/// Per-request inputs to rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub theme: Theme,
    pub identity: &'a Identity,
    pub identity_config: &'a IdentityConfig,
}

impl RenderContext<'_> {
    /// Full document for a page body.
    pub fn page(&self, title: Option<&str>, content: &str) -> String {
        document::root_layout(self, title, &layout::main_layout(self, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthenticatedUser;
    use crate::theme::ThemeMode;

    fn identity_config() -> IdentityConfig {
        IdentityConfig {
            enabled: true,
            issuer: "https://clerk.autoledger.test".to_string(),
            audience: None,
            session_cookie: "__session".to_string(),
            leeway_secs: 5,
            require_sign_in: false,
            sign_in_url: "/sign-in".to_string(),
            sign_out_url: "/sign-out".to_string(),
            account_url: Some("https://accounts.autoledger.test/user".to_string()),
            publishable_key: Some("pk_test_123".to_string()),
        }
    }

    fn theme(preference: ThemeMode) -> Theme {
        Theme {
            preference,
            enable_system: true,
            disable_transition_on_change: true,
        }
    }

    fn render_home(identity: &Identity, mode: ThemeMode) -> String {
        let config = identity_config();
        let ctx = RenderContext {
            theme: theme(mode),
            identity,
            identity_config: &config,
        };
        ctx.page(None, &pages::home(&ctx))
    }

    #[test]
    fn test_home_renders_heading() {
        let html = render_home(&Identity(None), ThemeMode::System);
        assert!(html.contains("Auto-Ledger Frontend"));
        assert!(html.contains("<title>Auto Ledger</title>"));
        assert!(html.contains(r#"content="Advanced Car Mileage Tracking""#));
        assert!(html.contains(r#"<main class="flex-1 container py-6">"#));
    }

    #[test]
    fn test_signed_out_shows_sign_in_link() {
        let html = render_home(&Identity(None), ThemeMode::System);
        assert!(html.contains(r#"href="/sign-in">Sign in</a>"#));
        assert!(!html.contains("Sign out"));
    }

    #[test]
    fn test_signed_in_shows_user_menu() {
        let identity = Identity(Some(AuthenticatedUser {
            subject: "user_1".to_string(),
            email: Some("dana@example.com".to_string()),
            name: Some("Dana <Driver>".to_string()),
            image_url: None,
        }));
        let html = render_home(&identity, ThemeMode::System);
        assert!(html.contains("Dana &lt;Driver&gt;"));
        assert!(!html.contains("Dana <Driver>"));
        assert!(html.contains("dana@example.com"));
        assert!(html.contains(r#"href="/sign-out">Sign out</a>"#));
        assert!(html.contains("Manage account"));
        assert!(html.contains(r#"user-avatar-initials">DD</span>"#));
    }

    #[test]
    fn test_email_only_user_listed_once() {
        let identity = Identity(Some(AuthenticatedUser {
            subject: "user_2".to_string(),
            email: Some("solo@example.com".to_string()),
            name: None,
            image_url: None,
        }));
        let html = render_home(&identity, ThemeMode::System);
        assert!(html.contains(r#"<p class="user-menu-name">solo@example.com</p>"#));
        assert!(!html.contains("user-menu-email"));
    }

    #[test]
    fn test_theme_class_and_script() {
        let dark = render_home(&Identity(None), ThemeMode::Dark);
        assert!(dark.contains(r#"class="dark""#));
        assert!(!dark.contains("prefers-color-scheme"));
        assert!(dark.contains(r#"value="dark" class="theme-option theme-option-active" aria-pressed="true""#));

        let system = render_home(&Identity(None), ThemeMode::System);
        assert!(system.contains("prefers-color-scheme"));
        assert!(system.contains(r#"data-theme-preference="system""#));
    }

    #[test]
    fn test_publishable_key_exposed() {
        let html = render_home(&Identity(None), ThemeMode::Light);
        assert!(html.contains(r#"data-identity-publishable-key="pk_test_123""#));
    }
}
