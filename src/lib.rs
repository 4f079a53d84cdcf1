//! Auto Ledger Frontend
//!
//! Server-rendered web shell for Auto Ledger, the car mileage tracker. It
//! renders the application layout around each page, reflects the identity
//! provider's session in the header, and forwards `/api` traffic to the
//! backend service.
//!
//! # Architecture
//!
//! - **Server**: Axum router with tracing, timeout and identity middleware
//! - **Proxy**: `/api/:path*` rewritten to the backend and streamed through
//! - **Identity**: session tokens verified against the provider's JWKS
//! - **UI**: HTML layouts rendered on the server, theme kept in a cookie
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`proxy`]: rewrite rules and request forwarding
//! - [`identity`]: session verification and the request identity
//! - [`theme`]: theme preference
//! - [`ui`]: layouts and pages
//! - [`server`]: router assembly and serving

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod identity;
pub mod proxy;
pub mod server;
pub mod telemetry;
pub mod theme;
pub mod ui;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::identity::{HttpJwksFetcher, JwksFetcher, SessionVerifier};
use crate::proxy::{ProxyConfigError, Rewrites};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
    /// Rewrite rules applied to requests no page route handles.
    pub rewrites: Arc<Rewrites>,
    /// Pooled client used for forwarding.
    pub http: reqwest::Client,
    /// Session token verifier.
    pub sessions: Arc<SessionVerifier>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("rewrites", &self.rewrites)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State with the HTTP JWKS fetcher.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, StateError> {
        let http = Self::proxy_client(&config)?;
        let jwks_client = reqwest::Client::builder()
            .timeout(identity::jwks::FETCH_TIMEOUT)
            .build()
            .map_err(StateError::HttpClient)?;
        let fetcher: Arc<dyn JwksFetcher> = Arc::new(HttpJwksFetcher::new(jwks_client));
        Self::with_fetcher(config, http, fetcher)
    }

    /// State with a caller-supplied key source.
    pub fn with_fetcher(
        config: Arc<AppConfig>,
        http: reqwest::Client,
        fetcher: Arc<dyn JwksFetcher>,
    ) -> Result<Self, StateError> {
        let rewrites = Rewrites::from_config(&config.proxy.effective_rewrites())?;
        for rule in rewrites.rules() {
            tracing::info!(
                name: "proxy.rewrite.registered",
                source = %rule.source(),
                destination = %rule.destination(),
                "Rewrite rule registered"
            );
        }

        let sessions = Arc::new(SessionVerifier::new(
            config.identity.issuer.clone(),
            config.identity.audience.clone(),
            config.identity.leeway_secs,
            fetcher,
        ));

        Ok(Self {
            config,
            rewrites: Arc::new(rewrites),
            http,
            sessions,
        })
    }

    /// Client for backend traffic: no redirect following, bounded wait.
    pub fn proxy_client(config: &AppConfig) -> Result<reqwest::Client, StateError> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.proxy.timeout_secs))
            .build()
            .map_err(StateError::HttpClient)
    }
}

/// Failure building [`AppState`].
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("invalid rewrite rule: {0}")]
    Rewrite(#[from] ProxyConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
