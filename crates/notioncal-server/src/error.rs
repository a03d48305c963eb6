//! Server error types.

use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use notioncal_core::{ConfigError, RenderError, TracingError, ViewNotFound};
use notioncal_providers::{UpstreamError, UpstreamErrorCode};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Result type for server startup.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, signals).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The configuration document is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The Notion client could not be built.
    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Logging could not be initialised.
    #[error("tracing error: {0}")]
    Tracing(#[from] TracingError),

    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

/// JSON body returned for every failed feed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// A failed feed request.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    NotFound(#[from] ViewNotFound),

    #[error("failed to fetch records for '{view}'")]
    Upstream {
        view: String,
        #[source]
        source: UpstreamError,
    },

    #[error("failed to render calendar for '{view}'")]
    Render {
        view: String,
        #[source]
        source: RenderError,
    },

    #[error("request timed out")]
    Timeout,
}

impl FeedError {
    pub fn upstream(view: impl Into<String>, source: UpstreamError) -> Self {
        Self::Upstream {
            view: view.into(),
            source,
        }
    }

    pub fn render(view: impl Into<String>, source: RenderError) -> Self {
        Self::Render {
            view: view.into(),
            source,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "view_not_found",
            // Client misconfiguration surfaces while querying.
            Self::Upstream { source, .. }
                if source.code() == UpstreamErrorCode::ConfigurationError =>
            {
                "configuration_error"
            }
            Self::Upstream { .. } => "upstream_error",
            Self::Render { .. } => "render_error",
            Self::Timeout => "request_timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            "view_not_found" => StatusCode::NOT_FOUND,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "request_timeout" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body sent to the client. Upstream causes stay in the logs.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        match &self {
            Self::NotFound(_) => {}
            Self::Upstream { view, source } => {
                error!(view = %view, code = source.code().as_str(), error = %source, "feed generation failed");
            }
            Self::Render { view, source } => {
                error!(view = %view, error = %source, "feed rendering failed");
            }
            Self::Timeout => error!("feed request timed out"),
        }
        (self.status(), Json(self.body())).into_response()
    }
}
