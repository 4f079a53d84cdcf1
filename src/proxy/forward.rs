//! Request forwarding to the backend.

use std::net::SocketAddr;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::Response,
};
use url::Url;

use crate::AppState;
use crate::error::AppError;
use crate::identity::session_cookie;

/// Headers meaningful only for a single transport hop.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Copy `headers` without hop-by-hop entries, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(name) || *name == header::UPGRADE || listed.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers sent upstream: the client's headers minus hop-by-hop and `Host`,
/// plus `X-Forwarded-*` and an `X-Request-Id` when the client sent none.
fn upstream_headers(
    state: &AppState,
    incoming: &HeaderMap,
    peer: Option<SocketAddr>,
) -> HeaderMap {
    let mut headers = strip_hop_by_hop(incoming);
    headers.remove(header::HOST);

    if let Some(host) = incoming.get(header::HOST) {
        if !headers.contains_key(&X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
    }
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
    if let Some(peer) = peer {
        let chain = match incoming
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{prior}, {}", peer.ip()),
            None => peer.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(&X_REQUEST_ID) {
        if let Ok(value) = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()) {
            headers.insert(X_REQUEST_ID, value);
        }
    }

    if state.config.proxy.forward_session_as_bearer && !headers.contains_key(header::AUTHORIZATION)
    {
        if let Some(token) = session_cookie(incoming, &state.config.identity.session_cookie) {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }
    }

    headers
}

/// Forward `request` to `target`, streaming both bodies.
pub async fn forward(state: &AppState, target: Url, request: Request) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let headers = upstream_headers(state, &parts.headers, peer);
    let request_id = headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::debug!(
        name: "proxy.forward",
        request_id = %request_id,
        method = %parts.method,
        path = %path,
        target = %target,
        "Forwarding request to backend"
    );

    let mut outgoing = state
        .http
        .request(parts.method.clone(), target.clone())
        .headers(headers);
    // Bodiless requests stay bodiless so GETs are not sent chunked.
    if body.size_hint().exact() != Some(0) {
        outgoing = outgoing.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = outgoing
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::GatewayTimeout { path: path.clone() }
            } else {
                AppError::Proxy {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

    let status = upstream.status();
    tracing::info!(
        name: "proxy.response",
        request_id = %request_id,
        method = %parts.method,
        path = %path,
        status = status.as_u16(),
        "Backend responded"
    );

    let headers = strip_hop_by_hop(upstream.headers());
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-custom", HeaderValue::from_static("1"));

        let out = strip_hop_by_hop(&headers);
        assert_eq!(out.len(), 2);
        assert_eq!(out[header::CONTENT_TYPE], "application/json");
        assert_eq!(out["x-custom"], "1");
    }

    #[test]
    fn test_strip_keeps_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let out = strip_hop_by_hop(&headers);
        assert_eq!(out.get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
