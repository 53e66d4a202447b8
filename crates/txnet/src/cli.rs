use clap::Parser;

use txnet_core::source::{BLOCKCYPHER_DEFAULT_URL, ETHERSCAN_DEFAULT_URL};
use txnet_core::Blockchain;

/// txnet: wallet transaction lookup and multi-hop transaction network API.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Transaction store: a `sqlite://` URL, or `memory` for a
    /// process-local store.
    #[arg(long, default_value = "sqlite://txnet.db", env = "TXNET_DATABASE_URL")]
    pub database_url: String,

    /// Chains to serve (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "bitcoin,ethereum")]
    pub chains: Vec<Blockchain>,

    /// BlockCypher API token (required when serving bitcoin).
    #[arg(long, env = "BLOCKCYPHER_API_KEY", hide_env_values = true)]
    pub blockcypher_api_key: Option<String>,

    #[arg(long, default_value = BLOCKCYPHER_DEFAULT_URL, env = "BLOCKCYPHER_BASE_URL")]
    pub blockcypher_base_url: String,

    /// Etherscan API key (required when serving ethereum).
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    #[arg(long, default_value = ETHERSCAN_DEFAULT_URL, env = "ETHERSCAN_BASE_URL")]
    pub etherscan_base_url: String,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "8000")]
    pub port: u16,

    /// Allowed CORS origin (repeatable).
    #[arg(long = "cors-origin", default_value = "http://localhost:3000")]
    pub cors_origins: Vec<String>,

    /// Maximum outbound requests per second, per chain data source.
    #[arg(long)]
    pub requests_per_second: Option<u32>,

    /// Timeout for a single chain data source request, in seconds.
    #[arg(long, default_value = "30")]
    pub http_timeout_secs: u64,
}
