mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use eyre::WrapErr;

use txnet_core::source::{BlockCypherSource, ChainRegistry, EtherscanSource, HttpConfig};
use txnet_core::store::{MemoryStore, SqliteStore, TransactionStore};
use txnet_core::{Blockchain, TransactionResolver};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let store = open_store(&args.database_url).await?;
    let sources = build_sources(&args)?;
    tracing::info!(chains = ?sources.chains(), "chain data sources configured");

    let origins = args
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .wrap_err_with(|| format!("invalid CORS origin `{origin}`"))
        })
        .collect::<eyre::Result<Vec<_>>>()?;

    let state = server::AppState {
        resolver: TransactionResolver::new(store, sources),
    };
    let router = server::build_router(state, origins);

    let bind_addr = format!("{}:{}", args.bind, args.port);
    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .wrap_err_with(|| format!("bind TCP listener on {bind_addr}"))?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("run HTTP server")?;

    Ok(())
}

async fn open_store(url: &str) -> eyre::Result<Arc<dyn TransactionStore>> {
    if url == "memory" {
        tracing::info!("using in-memory transaction store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = SqliteStore::connect(url)
        .await
        .wrap_err_with(|| format!("open transaction store `{url}`"))?;
    let records = store
        .count()
        .await
        .wrap_err("count stored transactions")?;
    tracing::info!(url, records, "opened sqlite transaction store");
    Ok(Arc::new(store))
}

fn build_sources(args: &cli::Cli) -> eyre::Result<ChainRegistry> {
    let http = HttpConfig {
        timeout: Duration::from_secs(args.http_timeout_secs),
        requests_per_second: args.requests_per_second,
        ..HttpConfig::default()
    };

    let mut registry = ChainRegistry::new();
    for chain in &args.chains {
        match chain {
            Blockchain::Bitcoin => {
                let source = BlockCypherSource::new(
                    &args.blockcypher_base_url,
                    args.blockcypher_api_key.as_deref(),
                    &http,
                )
                .wrap_err("configure bitcoin data source")?;
                registry.register(Arc::new(source));
            }
            Blockchain::Ethereum => {
                let source = EtherscanSource::new(
                    &args.etherscan_base_url,
                    args.etherscan_api_key.as_deref(),
                    &http,
                )
                .wrap_err("configure ethereum data source")?;
                registry.register(Arc::new(source));
            }
        }
    }
    Ok(registry)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
