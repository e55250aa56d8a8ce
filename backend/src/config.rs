//! Keeper configuration loaded from environment variables.
//!
//! Required: `LOTTERY_PROGRAM_ID`
//! Optional: `RPC_URL`, `WS_URL`, `OPERATOR_KEYPAIR_PATH`, `CLUSTER`,
//!           `HTTP_PORT`, `MAX_RETRIES`, `INITIAL_RETRY_DELAY_MS`,
//!           `PRIORITY_FEE_MICRO_LAMPORTS`, `ROUND_DURATION_SECS`,
//!           `MIN_ENTRANTS`, `POLL_INTERVAL_SECS`, `STUCK_ROUND_WARN_SECS`,
//!           `AUTO_START`

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for the lottery operator keeper.
#[derive(Clone)]
pub struct AppConfig {
    /// Solana JSON-RPC endpoint (HTTP).
    pub rpc_url: String,
    /// Solana PubSub endpoint (WebSocket) for log subscriptions.
    pub ws_url: String,
    /// Operator keypair; signs `start_round`, `close_round` and pays for payouts.
    pub operator_keypair: Arc<Keypair>,
    /// The deployed lottery program ID.
    pub program_id: Pubkey,
    /// Cluster name for explorer URLs.
    pub cluster: String,
    /// HTTP server port.
    pub http_port: u16,
    /// Maximum send attempts per transaction.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Priority fee in micro-lamports per compute unit.
    pub priority_fee_micro_lamports: u64,
    /// Minimum time a round stays open before the keeper closes it.
    pub round_duration_secs: u64,
    /// Entrants required before the keeper closes a round.
    pub min_entrants: u32,
    /// Scheduler tick.
    pub poll_interval_secs: u64,
    /// How long a round may wait for randomness before the keeper warns.
    pub stuck_round_warn_secs: u64,
    /// Open a new round automatically once the previous one is paid out.
    pub auto_start: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8899".into());
        let ws_url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8900".into());

        let keypair_path = std::env::var("OPERATOR_KEYPAIR_PATH")
            .unwrap_or_else(|_| "~/.config/solana/id.json".into());
        let keypair_path = shellexpand::tilde(&keypair_path).to_string();
        let operator_keypair = read_keypair_file(&keypair_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to read keypair from {keypair_path}"))?;

        let program_id_str = std::env::var("LOTTERY_PROGRAM_ID")
            .context("LOTTERY_PROGRAM_ID env var must be set")?;
        let program_id = Pubkey::from_str(&program_id_str)
            .with_context(|| format!("invalid LOTTERY_PROGRAM_ID: {program_id_str}"))?;

        let cluster = std::env::var("CLUSTER").unwrap_or_else(|_| "devnet".into());

        Ok(Self {
            rpc_url,
            ws_url,
            operator_keypair: Arc::new(operator_keypair),
            program_id,
            cluster,
            http_port: env_or("HTTP_PORT", 8080),
            max_retries: env_or("MAX_RETRIES", 5),
            initial_retry_delay_ms: env_or("INITIAL_RETRY_DELAY_MS", 500),
            priority_fee_micro_lamports: env_or("PRIORITY_FEE_MICRO_LAMPORTS", 0),
            round_duration_secs: env_or("ROUND_DURATION_SECS", 300),
            min_entrants: env_or("MIN_ENTRANTS", 1),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 10).max(1),
            stuck_round_warn_secs: env_or("STUCK_ROUND_WARN_SECS", 600),
            auto_start: env_or("AUTO_START", true),
        })
    }

    /// Return the Solscan explorer URL for a given transaction signature.
    pub fn explorer_url(&self, signature: &str) -> String {
        explorer_url(&self.cluster, signature)
    }
}

fn explorer_url(cluster: &str, signature: &str) -> String {
    match cluster {
        "mainnet-beta" => format!("https://solscan.io/tx/{signature}"),
        cluster => format!("https://solscan.io/tx/{signature}?cluster={cluster}"),
    }
}
