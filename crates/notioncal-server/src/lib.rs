//! HTTP server publishing Notion database views as iCalendar feeds.
//!
//! Each configured view is served at `/calendar/{name}.ics`. A request runs
//! its own fetch, map and render pipeline; only the read-only view table
//! and the upstream rate limiter are shared between requests.
//!
//! # Example
//!
//! ```rust,no_run
//! use notioncal_core::AppConfig;
//! use notioncal_server::{AppState, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load_from("config.toml")?;
//!     let state = AppState::from_config(&config)?;
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port)).await?;
//!     serve(listener, state).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod feed;
mod routes;
mod state;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::{ErrorBody, FeedError, ServerError, ServerResult};
pub use feed::generate_feed;
pub use routes::{CALENDAR_CONTENT_TYPE, router};
pub use state::{AppState, DEFAULT_REQUEST_TIMEOUT};

/// Builds the full application with state and request tracing.
pub fn app(state: AppState) -> Router {
    router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C or SIGTERM, then drains in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState) -> ServerResult<()> {
    let addr = listener.local_addr()?;
    info!(%addr, views = state.views.len(), "notioncal listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}
