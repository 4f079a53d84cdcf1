use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

use super::{AuthenticatedUser, session_token};
use crate::AppState;

/// Resolved identity for the current request. `None` means signed out.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<AuthenticatedUser>);

impl Identity {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.0.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Paths rendered as pages. Proxied, static and utility paths never need a
/// user and are never redirected to sign-in.
pub fn is_page_path(path: &str) -> bool {
    const PASSTHROUGH: [&str; 4] = ["/api", "/static", "/healthz", "/theme"];
    !PASSTHROUGH
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

/// Sign-in URL carrying the page to come back to.
pub fn sign_in_redirect(sign_in_url: &str, return_to: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    let sep = if sign_in_url.contains('?') { '&' } else { '?' };
    format!("{sign_in_url}{sep}redirect_url={encoded}")
}

async fn resolve(state: &AppState, headers: &HeaderMap, path: &str) -> Identity {
    let identity = &state.config.identity;
    if !identity.enabled {
        tracing::debug!("Identity disabled - using development user");
        return Identity(Some(AuthenticatedUser::development()));
    }

    let Some(token) = session_token(headers, &identity.session_cookie) else {
        return Identity(None);
    };

    match state.sessions.verify(&token).await {
        Ok(user) => {
            tracing::debug!(subject = %user.subject, "Session verified");
            Identity(Some(user))
        }
        Err(e) => {
            tracing::warn!(
                name: "identity.session.rejected",
                path = %path,
                error = %e,
                "Session token rejected; treating request as signed out"
            );
            Identity(None)
        }
    }
}

/// Attach [`Identity`] to page requests; redirect signed-out page requests
/// to the sign-in URL when sign-in is required.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_page_path(&path) {
        return next.run(request).await;
    }

    let identity = resolve(&state, request.headers(), &path).await;

    if state.config.identity.require_sign_in
        && !identity.is_signed_in()
        && matches!(*request.method(), Method::GET | Method::HEAD)
    {
        let return_to = request
            .uri()
            .path_and_query()
            .map_or(path.as_str(), |pq| pq.as_str());
        let target = sign_in_redirect(&state.config.identity.sign_in_url, return_to);
        tracing::debug!(path = %path, "Signed out; redirecting to sign-in");
        return Redirect::to(&target).into_response();
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}
