//! lfsgate -- Git LFS media server that delegates transfers to S3.
//!
//! The process is stateless: every request is answered from the metadata
//! API and freshly signed object store links, so a restart needs no
//! recovery. SIGTERM/SIGINT handlers only stop accepting connections and
//! let in-flight requests finish.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use lfsgate::config::{Config, LoggingConfig};
use lfsgate::metadata::http::HttpMetaStore;
use lfsgate::signer::SigV4Signer;
use lfsgate::storage::s3::S3Redirector;

/// Command-line arguments for the lfsgate server.
#[derive(Parser, Debug)]
#[command(
    name = "lfsgate",
    version,
    about = "Git LFS media server backed by S3 and a metadata API"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "lfsgate.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Initialize tracing from the logging section. `RUST_LOG` wins over
/// `logging.level` when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config: Config = lfsgate::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        lfsgate::metrics::init_metrics()?;
        lfsgate::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let signer = SigV4Signer::new(&config.s3)?;
    let content = Arc::new(S3Redirector::new(Arc::new(signer)));
    info!(
        "S3 redirector initialized: bucket={} region={} endpoint='{}'",
        config.s3.bucket, config.s3.region, config.s3.endpoint
    );

    let meta = Arc::new(HttpMetaStore::new(&config.meta)?);
    info!(
        "Metadata API at {} (request signing {})",
        config.meta.endpoint,
        if config.meta.hmac_key.is_empty() {
            "disabled"
        } else {
            "enabled"
        }
    );

    let state = Arc::new(lfsgate::AppState {
        config,
        meta,
        content,
    });

    let app = lfsgate::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("lfsgate listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lfsgate shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
