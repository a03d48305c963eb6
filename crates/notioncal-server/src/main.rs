//! notioncal entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use notioncal_core::{AppConfig, TracingConfig, TracingOutputFormat, init_tracing};
use notioncal_server::{AppState, ServerError, ServerResult, serve};

/// notioncal - Notion databases as subscribable calendars
#[derive(Debug, Parser)]
#[command(name = "notioncal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "NOTIONCAL_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Address to listen on (overrides [server].host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides [server].port)
    #[arg(long, short)]
    port: Option<u16>,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    log_format: TracingOutputFormat,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::server().with_format(cli.log_format)) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "notioncal failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    let mut config = AppConfig::load_from(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let state = AppState::from_config(&config)?;
    info!(
        config = %cli.config.display(),
        views = ?config.views.names().collect::<Vec<_>>(),
        "configuration loaded"
    );

    if cli.check {
        println!("configuration OK: {} view(s)", config.views.len());
        return Ok(());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::bind(addr.as_str(), e))?;
    serve(listener, state).await
}
