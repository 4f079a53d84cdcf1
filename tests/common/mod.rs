//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use auto_ledger_frontend::{
    AppState,
    config::{
        AppConfig, IdentityConfig, LogFormat, LoggingConfig, ProxyConfig, ServerConfig,
        ThemeConfig,
    },
    server::build_router,
    theme::ThemeMode,
};
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

pub const SIGNING_KEY: &str = include_str!("../fixtures/session_signing_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KID: &str = "ins_test_key";

/// Config with identity disabled and the backend at `backend_url`.
pub fn test_config(backend_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            static_dir: "static".to_string(),
            request_timeout_secs: 30,
        },
        proxy: ProxyConfig {
            backend_url: backend_url.to_string(),
            rewrites: Vec::new(),
            timeout_secs: 5,
            forward_session_as_bearer: false,
        },
        identity: IdentityConfig {
            enabled: false,
            issuer: String::new(),
            audience: None,
            session_cookie: "__session".to_string(),
            leeway_secs: 0,
            require_sign_in: false,
            sign_in_url: "/sign-in".to_string(),
            sign_out_url: "/sign-out".to_string(),
            account_url: None,
            publishable_key: None,
        },
        theme: ThemeConfig {
            default_mode: ThemeMode::System,
            enable_system: true,
            disable_transition_on_change: true,
            cookie: "theme".to_string(),
        },
        logging: LoggingConfig {
            format: LogFormat::Compact,
        },
    }
}

/// In-process test server for the frontend.
pub fn frontend(config: AppConfig) -> TestServer {
    let state = AppState::from_config(Arc::new(config)).expect("state");
    TestServer::new(build_router(state)).expect("test server")
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

/// Serve the frontend itself on an ephemeral local port.
pub async fn spawn_frontend(config: AppConfig) -> SocketAddr {
    let state = AppState::from_config(Arc::new(config)).expect("state");
    spawn(build_router(state)).await
}

/// Send `GET {target}` byte for byte, bypassing any client-side URL
/// normalisation, and return the raw response.
pub async fn raw_get(addr: SocketAddr, target: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read");
    response
}

/// RS256 token signed with the fixture key.
pub fn sign(claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).expect("pem"),
    )
    .expect("sign")
}
