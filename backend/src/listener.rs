//! On-chain event listener for the lottery program.
//!
//! Subscribes to program logs via WebSocket, decodes Anchor events from
//! `Program data:` lines, records them in [`Metrics`] and wakes the scheduler
//! when a round needs attention. Reconnects automatically.

use base64::Engine;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::accounts::{discriminator, Reader};
use crate::config::AppConfig;
use crate::metrics::Metrics;

/// Delay before reconnecting to the WebSocket after a disconnect or error.
const WS_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lottery events, decoded from their Borsh bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotteryEvent {
    RoundStarted {
        round_id: u64,
        operator: Pubkey,
        entrance_fee_usd_cents: u64,
        opened_at: i64,
    },
    PlayerEntered {
        round_id: u64,
        player: Pubkey,
        amount: u64,
        required_fee: u64,
        entrant_count: u32,
    },
    WinnerRequested {
        round_id: u64,
        request_id: u64,
        entrant_count: u32,
        pooled_balance: u64,
    },
    WinnerPicked {
        round_id: u64,
        request_id: u64,
        winner: Pubkey,
        winner_index: u32,
        prize: u64,
    },
    PrizePaid {
        round_id: u64,
        winner: Pubkey,
        amount: u64,
    },
    PrizeParked {
        round_id: u64,
        winner: Pubkey,
        amount: u64,
    },
}

impl LotteryEvent {
    /// Events after which the scheduler has work to do right away.
    pub fn wakes_scheduler(&self) -> bool {
        matches!(
            self,
            Self::WinnerPicked { .. } | Self::PrizePaid { .. } | Self::PrizeParked { .. }
        )
    }
}

/// Decode one `Program data:` payload (discriminator included).
pub fn parse_event(data: &[u8]) -> Option<LotteryEvent> {
    if data.len() < 8 {
        return None;
    }
    let (disc, body) = data.split_at(8);
    let mut r = Reader::new(body);

    let event = if disc == discriminator("event", "RoundStarted") {
        LotteryEvent::RoundStarted {
            round_id: r.u64().ok()?,
            operator: r.pubkey().ok()?,
            entrance_fee_usd_cents: r.u64().ok()?,
            opened_at: r.i64().ok()?,
        }
    } else if disc == discriminator("event", "PlayerEntered") {
        LotteryEvent::PlayerEntered {
            round_id: r.u64().ok()?,
            player: r.pubkey().ok()?,
            amount: r.u64().ok()?,
            required_fee: r.u64().ok()?,
            entrant_count: r.u32().ok()?,
        }
    } else if disc == discriminator("event", "WinnerRequested") {
        LotteryEvent::WinnerRequested {
            round_id: r.u64().ok()?,
            request_id: r.u64().ok()?,
            entrant_count: r.u32().ok()?,
            pooled_balance: r.u64().ok()?,
        }
    } else if disc == discriminator("event", "WinnerPicked") {
        LotteryEvent::WinnerPicked {
            round_id: r.u64().ok()?,
            request_id: r.u64().ok()?,
            winner: r.pubkey().ok()?,
            winner_index: r.u32().ok()?,
            prize: r.u64().ok()?,
        }
    } else if disc == discriminator("event", "PrizePaid") {
        LotteryEvent::PrizePaid {
            round_id: r.u64().ok()?,
            winner: r.pubkey().ok()?,
            amount: r.u64().ok()?,
        }
    } else if disc == discriminator("event", "PrizeParked") {
        LotteryEvent::PrizeParked {
            round_id: r.u64().ok()?,
            winner: r.pubkey().ok()?,
            amount: r.u64().ok()?,
        }
    } else {
        return None;
    };
    Some(event)
}

/// Extract every lottery event from a transaction's log lines.
pub fn parse_log_lines(logs: &[String]) -> Vec<LotteryEvent> {
    let mut events = Vec::new();
    for log_line in logs {
        let Some(data_str) = log_line.strip_prefix("Program data: ") else {
            continue;
        };

        let decoded = match base64::engine::general_purpose::STANDARD.decode(data_str.trim()) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "Failed to decode base64 log data");
                continue;
            }
        };

        if let Some(event) = parse_event(&decoded) {
            events.push(event);
        }
    }
    events
}

/// Tracks when each randomness request was first seen, to report fulfillment latency.
///
/// Only one round waits for randomness at a time, so a new request drops any
/// entry whose `WinnerPicked` was missed.
#[derive(Default)]
struct RequestClock {
    requested: HashMap<u64, Instant>,
}

impl RequestClock {
    fn observe(&mut self, event: &LotteryEvent) -> Option<u64> {
        match event {
            LotteryEvent::WinnerRequested { request_id, .. } => {
                self.requested.clear();
                self.requested.insert(*request_id, Instant::now());
                None
            }
            LotteryEvent::WinnerPicked { request_id, .. } => self
                .requested
                .remove(request_id)
                .map(|at| at.elapsed().as_secs()),
            _ => None,
        }
    }
}

fn handle_event(event: &LotteryEvent, clock: &mut RequestClock, metrics: &Metrics) {
    let waited_secs = clock.observe(event);
    match event {
        LotteryEvent::RoundStarted {
            round_id,
            entrance_fee_usd_cents,
            ..
        } => {
            metrics.record_round_started();
            info!(round_id, fee_usd_cents = entrance_fee_usd_cents, "Round started");
        }
        LotteryEvent::PlayerEntered {
            round_id,
            player,
            amount,
            entrant_count,
            ..
        } => {
            metrics.record_entry();
            info!(round_id, player = %player, amount, entrant_count, "Player entered");
        }
        LotteryEvent::WinnerRequested {
            round_id,
            request_id,
            pooled_balance,
            ..
        } => {
            metrics.record_winner_requested();
            info!(round_id, request_id, pooled_balance, "Winner requested");
        }
        LotteryEvent::WinnerPicked {
            round_id,
            winner,
            prize,
            ..
        } => {
            metrics.record_winner_picked(waited_secs);
            info!(round_id, winner = %winner, prize, waited_secs, "Winner picked");
        }
        LotteryEvent::PrizePaid {
            round_id,
            winner,
            amount,
        } => {
            metrics.record_prize_paid(*amount);
            info!(round_id, winner = %winner, amount, "Prize paid");
        }
        LotteryEvent::PrizeParked {
            round_id,
            winner,
            amount,
        } => {
            metrics.record_prize_parked();
            warn!(round_id, winner = %winner, amount, "Prize parked for later claim");
        }
    }
}

/// Subscribe to program logs and dispatch lottery events until the process exits.
pub async fn listen_for_events(config: AppConfig, metrics: Arc<Metrics>, wake: Arc<Notify>) {
    let mut clock = RequestClock::default();

    loop {
        info!(url = %config.ws_url, "Connecting to WebSocket");

        match PubsubClient::new(&config.ws_url).await {
            Ok(pubsub) => {
                info!("WebSocket connected");

                let filter =
                    RpcTransactionLogsFilter::Mentions(vec![config.program_id.to_string()]);
                let logs_config = RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::confirmed()),
                };

                match pubsub.logs_subscribe(filter, logs_config).await {
                    Ok((mut stream, _unsub)) => {
                        use futures_util::StreamExt;
                        while let Some(log_result) = stream.next().await {
                            if log_result.value.err.is_some() {
                                continue;
                            }
                            for event in parse_log_lines(&log_result.value.logs) {
                                handle_event(&event, &mut clock, &metrics);
                                if event.wakes_scheduler() {
                                    wake.notify_one();
                                }
                            }
                        }
                        warn!("WebSocket stream ended, reconnecting");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to subscribe to logs");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to WebSocket");
            }
        }

        info!(delay = ?WS_RECONNECT_DELAY, "Reconnecting");
        tokio::time::sleep(WS_RECONNECT_DELAY).await;
    }
}
