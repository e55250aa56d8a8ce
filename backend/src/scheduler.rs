//! Round scheduler: polls the round account and drives the lifecycle.
//!
//! Each tick fetches the round, asks [`next_action`] what to do and sends at
//! most one transaction. The listener can wake the loop early.

use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Notify, RwLock};
use tracing::{error, info, warn};

use crate::accounts::{
    fetch_config, fetch_request_counter, fetch_round, LotteryConfigAccount, LotteryRoundAccount,
    RoundState,
};
use crate::config::AppConfig;
use crate::instructions::{
    build_close_round, build_park_prize, build_payout_winner, build_start_round,
    is_non_retryable, send_with_retries, with_priority_fee,
};
use crate::metrics::Metrics;

/// Latest round snapshot, shared with the HTTP status handler.
pub type SharedRound = Arc<RwLock<Option<LotteryRoundAccount>>>;

/// Knobs of the scheduling policy.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub auto_start: bool,
    pub min_entrants: u32,
    pub round_duration_secs: u64,
    pub stuck_round_warn_secs: u64,
}

impl From<&AppConfig> for Policy {
    fn from(config: &AppConfig) -> Self {
        Self {
            auto_start: config.auto_start,
            min_entrants: config.min_entrants,
            round_duration_secs: config.round_duration_secs,
            stuck_round_warn_secs: config.stuck_round_warn_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Pay the settled prize, or park it when the winner cannot receive it.
    Payout { winner: Pubkey, amount: u64 },
    StartRound,
    CloseRound,
    /// Randomness is overdue; there is no override, so only report it.
    WarnStuck { waited_secs: u64 },
    Wait,
}

/// Decide the next step for `round`.
///
/// `calculating_for_secs` is how long the keeper has seen the current request
/// outstanding.
pub fn next_action(
    round: &LotteryRoundAccount,
    policy: &Policy,
    now: i64,
    calculating_for_secs: u64,
) -> Action {
    if let Some(payout) = round.pending_payout {
        return Action::Payout {
            winner: payout.winner,
            amount: payout.amount,
        };
    }

    match round.state {
        RoundState::Closed if policy.auto_start => Action::StartRound,
        RoundState::Closed => Action::Wait,
        RoundState::Open => {
            let open_for = now.saturating_sub(round.opened_at);
            let enough_entrants = round.entrants.len() as u64 >= policy.min_entrants.max(1) as u64;
            if enough_entrants && open_for >= policy.round_duration_secs as i64 {
                Action::CloseRound
            } else {
                Action::Wait
            }
        }
        RoundState::Calculating if calculating_for_secs >= policy.stuck_round_warn_secs => {
            Action::WarnStuck {
                waited_secs: calculating_for_secs,
            }
        }
        RoundState::Calculating => Action::Wait,
    }
}

/// Whether crediting `amount` leaves the winner at or above `rent_minimum`.
fn prize_lands(winner_lamports: u64, amount: u64, rent_minimum: u64) -> bool {
    amount == 0
        || winner_lamports
            .checked_add(amount)
            .is_some_and(|after| after >= rent_minimum)
}

async fn winner_can_receive(rpc: &RpcClient, winner: &Pubkey, amount: u64) -> Result<bool> {
    let account = rpc
        .get_account_with_commitment(winner, CommitmentConfig::confirmed())
        .await
        .context("failed to fetch winner account")?
        .value;
    let (lamports, data_len) = account
        .map(|a| (a.lamports, a.data.len()))
        .unwrap_or_default();
    let rent_minimum = rpc
        .get_minimum_balance_for_rent_exemption(data_len)
        .await
        .context("failed to fetch rent-exempt minimum")?;
    Ok(prize_lands(lamports, amount, rent_minimum))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Remembers when the outstanding request was first observed.
#[derive(Default)]
struct CalculatingSince {
    request: Option<(u64, i64)>,
}

impl CalculatingSince {
    fn elapsed(&mut self, round: &LotteryRoundAccount, now: i64) -> u64 {
        let Some(pending) = round.pending_request else {
            self.request = None;
            return 0;
        };
        let since = match self.request {
            Some((id, since)) if id == pending.request_id => since,
            _ => {
                self.request = Some((pending.request_id, now));
                now
            }
        };
        now.saturating_sub(since).max(0) as u64
    }
}

/// Main scheduler loop.
pub async fn run_scheduler(
    config: AppConfig,
    metrics: Arc<Metrics>,
    snapshot: SharedRound,
    wake: Arc<Notify>,
) {
    let rpc = RpcClient::new_with_commitment(config.rpc_url.clone(), CommitmentConfig::confirmed());
    let policy = Policy::from(&config);

    let lottery = loop {
        match fetch_config(&rpc, &config.program_id).await {
            Ok(lottery) => break lottery,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to load lottery config, retrying");
                tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
            }
        }
    };
    info!(
        coordinator = %lottery.coordinator_program,
        subscription_id = lottery.subscription_id,
        price_feed = %lottery.price_feed,
        admin = %lottery.admin,
        fee_usd_cents = lottery.entrance_fee_usd_cents,
        max_price_age_secs = lottery.max_price_age_secs,
        callback_compute_limit = lottery.callback_compute_limit,
        "Lottery config loaded"
    );
    if lottery.operator != config.operator_keypair.pubkey() {
        warn!(
            expected = %lottery.operator,
            "Keeper key is not the lottery operator; only payouts will succeed"
        );
    }

    let mut calculating = CalculatingSince::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => {}
        }

        let round = match fetch_round(&rpc, &config.program_id).await {
            Ok(round) => round,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to fetch round");
                continue;
            }
        };

        let now = unix_now();
        let waited = calculating.elapsed(&round, now);
        let action = next_action(&round, &policy, now, waited);
        *snapshot.write().await = Some(round.clone());

        if let Err(e) = execute(&rpc, &config, &lottery, &metrics, &round, action).await {
            let err_str = format!("{e:#}");
            if is_non_retryable(&err_str) {
                warn!(?action, reason = %err_str, "Skipping action (non-retryable)");
            } else {
                metrics.record_failure();
                error!(?action, error = %err_str, "Action failed");
            }
        }
    }
}

async fn execute(
    rpc: &RpcClient,
    config: &AppConfig,
    lottery: &LotteryConfigAccount,
    metrics: &Metrics,
    round: &LotteryRoundAccount,
    action: Action,
) -> Result<()> {
    let program_id = &config.program_id;
    let operator = config.operator_keypair.pubkey();

    let (ix, label) = match action {
        Action::Wait => return Ok(()),
        Action::WarnStuck { waited_secs } => {
            metrics.record_stuck_warning();
            warn!(
                round_id = round.round_id,
                request_id = round.pending_request.map(|r| r.request_id),
                waited_secs,
                "Round still waiting for randomness"
            );
            return Ok(());
        }
        Action::Payout { winner, amount } => {
            if winner_can_receive(rpc, &winner, amount).await? {
                (
                    build_payout_winner(program_id, &operator, &winner),
                    "payout_winner",
                )
            } else {
                warn!(
                    round_id = round.round_id,
                    winner = %winner,
                    amount,
                    "Winner cannot receive the prize, parking it"
                );
                (
                    build_park_prize(program_id, &operator, &winner, round.round_id),
                    "park_prize",
                )
            }
        }
        Action::StartRound => (build_start_round(program_id, &operator), "start_round"),
        Action::CloseRound => {
            let request_id = fetch_request_counter(rpc, &lottery.coordinator_config).await?;
            (
                build_close_round(program_id, &operator, lottery, request_id),
                "close_round",
            )
        }
    };

    let instructions = with_priority_fee(config, ix);
    let sig = send_with_retries(rpc, config, &instructions, label).await?;
    metrics.record_transaction();
    info!(
        action = label,
        round_id = round.round_id,
        signature = %sig,
        explorer = %config.explorer_url(&sig),
        "Transaction confirmed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{key, open_round};
    use crate::accounts::{PendingPayout, PendingRequest};

    const POLICY: Policy = Policy {
        auto_start: true,
        min_entrants: 2,
        round_duration_secs: 300,
        stuck_round_warn_secs: 600,
    };

    #[test]
    fn unpaid_prize_comes_first() {
        let round = LotteryRoundAccount {
            state: RoundState::Closed,
            pending_payout: Some(PendingPayout {
                round_id: 3,
                winner: key(9),
                amount: 1,
            }),
            ..open_round(0, 0)
        };
        assert_eq!(
            next_action(&round, &POLICY, 1_000, 0),
            Action::Payout {
                winner: key(9),
                amount: 1
            }
        );
    }

    #[test]
    fn prize_below_rent_minimum_gets_parked() {
        let rent_minimum = 890_880;
        assert!(!prize_lands(0, 50_000, rent_minimum));
        assert!(prize_lands(0, rent_minimum, rent_minimum));
        assert!(prize_lands(rent_minimum, 1, rent_minimum));
        assert!(prize_lands(0, 0, rent_minimum));
        assert!(!prize_lands(u64::MAX, 1, rent_minimum));
    }

    #[test]
    fn closed_round_starts_only_with_auto_start() {
        let round = LotteryRoundAccount {
            state: RoundState::Closed,
            ..open_round(0, 0)
        };
        assert_eq!(next_action(&round, &POLICY, 0, 0), Action::StartRound);

        let manual = Policy {
            auto_start: false,
            ..POLICY
        };
        assert_eq!(next_action(&round, &manual, 0, 0), Action::Wait);
    }

    #[test]
    fn open_round_closes_after_duration_with_enough_entrants() {
        let opened_at = 1_000;
        assert_eq!(
            next_action(&open_round(2, opened_at), &POLICY, opened_at + 299, 0),
            Action::Wait
        );
        assert_eq!(
            next_action(&open_round(1, opened_at), &POLICY, opened_at + 10_000, 0),
            Action::Wait
        );
        assert_eq!(
            next_action(&open_round(2, opened_at), &POLICY, opened_at + 300, 0),
            Action::CloseRound
        );
    }

    #[test]
    fn empty_round_never_closes() {
        let lenient = Policy {
            min_entrants: 0,
            round_duration_secs: 0,
            ..POLICY
        };
        assert_eq!(next_action(&open_round(0, 0), &lenient, 10, 0), Action::Wait);
    }

    #[test]
    fn calculating_round_only_warns() {
        let round = LotteryRoundAccount {
            state: RoundState::Calculating,
            pending_request: Some(PendingRequest {
                request_id: 4,
                issued_at_round: 3,
                request_slot: 10,
            }),
            ..open_round(2, 0)
        };
        assert_eq!(next_action(&round, &POLICY, 0, 599), Action::Wait);
        assert_eq!(
            next_action(&round, &POLICY, 0, 600),
            Action::WarnStuck { waited_secs: 600 }
        );
    }

    #[test]
    fn calculating_clock_resets_per_request() {
        let mut since = CalculatingSince::default();
        let mut round = LotteryRoundAccount {
            state: RoundState::Calculating,
            pending_request: Some(PendingRequest {
                request_id: 1,
                issued_at_round: 1,
                request_slot: 10,
            }),
            ..open_round(1, 0)
        };

        assert_eq!(since.elapsed(&round, 100), 0);
        assert_eq!(since.elapsed(&round, 160), 60);

        round.pending_request = Some(PendingRequest {
            request_id: 2,
            issued_at_round: 2,
            request_slot: 20,
        });
        assert_eq!(since.elapsed(&round, 200), 0);

        round.pending_request = None;
        assert_eq!(since.elapsed(&round, 300), 0);
        assert!(since.request.is_none());
    }
}
