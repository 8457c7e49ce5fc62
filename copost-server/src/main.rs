use std::sync::Arc;

use clap::Parser;
use copost_core::CopostConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use copost_server::{server, Services};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "copost.toml")]
    config: String,

    /// Check the store and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match CopostConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let services = match Services::from_config(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to start services: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match services.store.health().await {
            Ok(h) => {
                println!("✅ Store backend: {}", h.backend);
                if let Some(v) = &h.server_version {
                    println!("✅ PostgreSQL connected: {}", v);
                }
                if let Some(v) = &h.pgvector_version {
                    println!("✅ pgvector version: {}", v);
                }
                println!(
                    "✅ {} documents, {} chunks, {} tweets",
                    h.documents, h.chunks, h.tweets
                );
            }
            Err(e) => {
                println!("❌ Store health check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Copost health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if services.config.http.enabled {
        let http_services = services.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                copost_server::http::start_http_server(http_services, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = services.config.service.socket_path.clone();
    server::run_unix_server(&socket_path, services, tx.subscribe()).await?;

    Ok(())
}
