//! Lottery Operator Keeper
//!
//! Off-chain service that drives the lottery's round lifecycle. Runs three
//! concurrent subsystems:
//!
//! - **Scheduler**: polls the round account and sends `start_round`,
//!   `close_round` and `payout_winner` transactions as the policy dictates.
//! - **Listener**: WebSocket subscription to lottery events; wakes the
//!   scheduler when a winner is picked.
//! - **HTTP server**: liveness (`/health`) and round status (`/status`).

use actix_web::{web, App, HttpResponse, HttpServer};
use solana_sdk::signature::Signer;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod accounts;
mod config;
mod instructions;
mod listener;
mod metrics;
mod scheduler;

use accounts::LotteryRoundAccount;
use config::AppConfig;
use metrics::Metrics;
use scheduler::SharedRound;

/// Shared application state accessible from HTTP handlers.
struct AppState {
    metrics: Arc<Metrics>,
    round: SharedRound,
}

/// Liveness probe; returns 200 if the process is running.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

fn round_json(round: &LotteryRoundAccount) -> serde_json::Value {
    serde_json::json!({
        "round_id": round.round_id,
        "state": round.state.as_str(),
        "entrants": round.entrants.len(),
        "pooled_balance": round.pooled_balance,
        "opened_at": round.opened_at,
        "pending_request": round.pending_request.map(|r| serde_json::json!({
            "request_id": r.request_id,
            "issued_at_round": r.issued_at_round,
            "request_slot": r.request_slot,
        })),
        "recent_winner": round.recent_winner.map(|w| w.to_string()),
        "pending_payout": round.pending_payout.map(|p| serde_json::json!({
            "round_id": p.round_id,
            "winner": p.winner.to_string(),
            "amount": p.amount,
        })),
    })
}

/// Current round state and recent winner as last seen by the scheduler.
async fn status(data: web::Data<AppState>) -> HttpResponse {
    let round = data.round.read().await.as_ref().map(round_json);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "round": round,
        "metrics": data.metrics.to_json(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,solana_client=warn,solana_rpc_client=warn,hyper=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::other(format!("invalid configuration: {e:#}")))?;

    info!(
        program = %config.program_id,
        operator = %config.operator_keypair.pubkey(),
        "Starting lottery keeper"
    );
    info!(rpc = %config.rpc_url, ws = %config.ws_url, "Endpoints configured");

    let metrics = Arc::new(Metrics::new());
    let round: SharedRound = Arc::new(RwLock::new(None));
    let wake = Arc::new(Notify::new());

    // Background: stream on-chain events and wake the scheduler.
    let listener_config = config.clone();
    let listener_metrics = metrics.clone();
    let listener_wake = wake.clone();
    tokio::spawn(async move {
        listener::listen_for_events(listener_config, listener_metrics, listener_wake).await;
    });

    // Background: drive the round lifecycle.
    let scheduler_config = config.clone();
    let scheduler_metrics = metrics.clone();
    let scheduler_round = round.clone();
    tokio::spawn(async move {
        scheduler::run_scheduler(scheduler_config, scheduler_metrics, scheduler_round, wake).await;
    });

    let state = web::Data::new(AppState { metrics, round });
    let addr = ("0.0.0.0", config.http_port);

    info!(port = config.http_port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/status", web::get().to(status))
    })
    .bind(addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{key, open_round};
    use crate::accounts::PendingPayout;

    #[test]
    fn status_reports_state_and_payout() {
        let mut round = open_round(2, 10);
        round.recent_winner = Some(key(4));
        round.pending_payout = Some(PendingPayout {
            round_id: 3,
            winner: key(4),
            amount: 50_000_000,
        });

        let json = round_json(&round);
        assert_eq!(json["state"], "open");
        assert_eq!(json["entrants"], 2);
        assert_eq!(json["recent_winner"], key(4).to_string());
        assert_eq!(json["pending_payout"]["amount"], 50_000_000u64);
        assert!(json["pending_request"].is_null());
    }
}
