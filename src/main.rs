//! Pastel Engagement Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! pastel-engagement
//!
//! # Start with custom config
//! pastel-engagement --config /path/to/config.toml
//!
//! # Override port and storage directory
//! pastel-engagement --http-port 9000 --storage-dir /data/pastel
//! ```
//!
//! See `http.rs` for the endpoint list.

use clap::Parser;
use pastel_engagement::services::events::spawn_logging_listener;
use pastel_engagement::{Config, ContentDb, HttpServer, Services};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pastel-engagement")]
#[command(about = "Engagement and recommendation core for the Pastel blog")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "PASTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory (holds pastel.db)
    #[arg(long, env = "PASTEL_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "PASTEL_HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pastel_engagement=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    config.validate()?;

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting pastel-engagement"
    );

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let content_db = Arc::new(ContentDb::open(&config.storage_dir)?);
    let stats = content_db.stats()?;
    info!(
        posts = stats.post_count,
        comments = stats.comment_count,
        identities = stats.identity_count,
        "Database ready"
    );

    let services = Arc::new(Services::new(content_db.clone(), &config));
    let _listener = spawn_logging_listener(services.events.clone());

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let server = Arc::new(HttpServer::new(
        services,
        content_db,
        bind_addr,
        config.identity_header.clone(),
        config.engagement.related_limit,
    ));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server stopped");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
