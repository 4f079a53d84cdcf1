//! Identity-provider sessions.
//!
//! The identity provider owns sign-in and issues a signed session token
//! (cookie `__session` by default). This module only verifies that token and
//! exposes the resulting [`AuthenticatedUser`] to handlers through the
//! [`Identity`] request extension.
//!
//! # Structure
//!
//! - [`claims`]: session claims and the user model
//! - [`jwks`]: signing-key retrieval and caching
//! - [`verifier`]: token validation
//! - [`middleware`]: per-request identity resolution and sign-in enforcement

pub mod claims;
pub mod jwks;
pub mod middleware;
pub mod verifier;

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::CookieJar;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use jwks::{HttpJwksFetcher, JwksCache, JwksFetcher};
pub use middleware::{Identity, identity_middleware};
pub use verifier::{AuthError, SessionVerifier};

/// Non-empty value of the session cookie.
pub fn session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Session token: cookie first, then bearer header.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    session_cookie(headers, cookie_name).or_else(|| bearer_token(headers))
}
