use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::identity::{Identity, identity_middleware, middleware::is_page_path};
use crate::proxy;
use crate::theme::{self, Theme};
use crate::ui::{RenderContext, pages};

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState::from_config(Arc::clone(&config))?;

    if !config.identity.enabled {
        tracing::warn!("Identity verification disabled; every request runs as the development user");
    }

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        backend = %config.proxy.backend_url,
        "Server started"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Assemble routes and middleware.
///
/// Page routes are matched first; anything else goes through the rewrite
/// rules and then to the 404 page.
pub fn build_router(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", get(home_handler))
        .route("/healthz", get(health_handler))
        .route("/theme", post(theme::set_theme))
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn render_context<'a>(
    state: &'a AppState,
    identity: &'a Identity,
    headers: &HeaderMap,
) -> RenderContext<'a> {
    RenderContext {
        theme: Theme::from_headers(headers, &state.config.theme),
        identity,
        identity_config: &state.config.identity,
    }
}

/// GET / - Home page.
async fn home_handler(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
) -> Html<String> {
    let ctx = render_context(&state, &identity, &headers);
    Html(ctx.page(None, &pages::home(&ctx)))
}

/// GET /healthz - Liveness probe.
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Rewrite to the backend if a rule matches, else 404.
async fn fallback_handler(
    State(state): State<AppState>,
    identity: Identity,
    request: Request,
) -> Response {
    if let Some(target) = state.rewrites.resolve(request.uri()) {
        return match proxy::forward(&state, target, request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
    }

    let path = request.uri().path().to_string();
    if !is_page_path(&path) {
        return AppError::NotFound { path }.into_response();
    }

    tracing::debug!(path = %path, "No page for path");
    let ctx = render_context(&state, &identity, request.headers());
    (
        StatusCode::NOT_FOUND,
        Html(ctx.page(Some("Not Found"), pages::not_found_content())),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
