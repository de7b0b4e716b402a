//! fnstack - local runtime for init/invoke style functions
//!
//! Serves `POST /init` and `POST /invoke` over HTTP, dispatching to handlers
//! registered in the module catalog.

mod config;
mod router;

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fnstack_runtime::HandlerReference;

#[derive(Parser, Debug)]
#[command(name = "fnstack")]
#[command(about = "Local HTTP runtime for init/invoke style functions", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "FNSTACK_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "FNSTACK_HOST")]
    host: Option<String>,

    /// Handler used when Init names none, in `module.function` form
    #[arg(long, env = "FNSTACK_HANDLER")]
    handler: Option<String>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "FNSTACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FNSTACK_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "fnstack={level},fnstack_runtime={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(handler) = args.handler {
        config.runtime.default_handler = handler;
    }

    if let Err(e) = HandlerReference::parse(&config.runtime.default_handler) {
        warn!(
            handler = %config.runtime.default_handler,
            error = %e,
            "Default handler is malformed; Init without a handler will be rejected"
        );
    }

    info!("Starting fnstack...");
    info!("  Default handler: {}", config.runtime.default_handler);

    let app = router::create_router(&config);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt, shutting down server"),
        Err(e) => {
            warn!(error = %e, "Unable to listen for interrupt signal");
            std::future::pending::<()>().await;
        }
    }
}
