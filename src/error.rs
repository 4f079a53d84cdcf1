//! Application error type and the JSON error body returned on `/api` paths.

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::ui;

#[derive(Error, Debug)]
pub enum AppError {
    /// Backend could not be reached or broke the connection.
    #[error("backend request failed: {source}")]
    Proxy {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend did not respond in time")]
    GatewayTimeout { path: String },

    #[error("no route for {path}")]
    NotFound { path: String },

    #[error("{message}")]
    BadRequest { path: String, message: String },
}

/// Error body, shaped like the backend's so clients parse one format.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl ErrorResponse {
    pub fn of(status: StatusCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            path: path.into(),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Proxy { .. } => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Proxy { path, .. }
            | Self::GatewayTimeout { path }
            | Self::NotFound { path }
            | Self::BadRequest { path, .. } => path,
        }
    }

    fn wants_json(&self) -> bool {
        let path = self.path();
        path == "/api" || path.starts_with("/api/")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, path = %self.path(), "Request failed");
        } else {
            tracing::debug!(error = %self, path = %self.path(), "Request rejected");
        }

        if self.wants_json() || !matches!(self, Self::NotFound { .. }) {
            let body = ErrorResponse::of(status, self.to_string(), self.path());
            return (status, Json(body)).into_response();
        }
        (status, Html(ui::pages::not_found())).into_response()
    }
}
