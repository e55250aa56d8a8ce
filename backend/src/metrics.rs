//! Keeper metrics.
//!
//! All counters are backed by atomics for lock-free concurrent access.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated keeper metrics, shared via `Arc<Metrics>`.
#[derive(Default)]
pub struct Metrics {
    /// `RoundStarted` events observed.
    pub rounds_started: AtomicU64,
    /// `PlayerEntered` events observed.
    pub entries_observed: AtomicU64,
    /// `WinnerRequested` events observed.
    pub winners_requested: AtomicU64,
    /// `WinnerPicked` events observed.
    pub winners_picked: AtomicU64,
    /// `PrizePaid` events observed.
    pub prizes_paid: AtomicU64,
    /// `PrizeParked` events observed.
    pub prizes_parked: AtomicU64,
    /// Lamports paid out to winners.
    pub lamports_paid: AtomicU64,
    /// Keeper transactions confirmed.
    pub transactions_sent: AtomicU64,
    /// Keeper transactions that failed with a retryable error.
    pub transactions_failed: AtomicU64,
    /// Scheduler ticks that found a round waiting too long for randomness.
    pub stuck_round_warnings: AtomicU64,
    /// Sum of request-to-fulfillment waits in seconds.
    pub fulfillment_wait_sum_secs: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_started(&self) {
        Self::bump(&self.rounds_started);
    }

    pub fn record_entry(&self) {
        Self::bump(&self.entries_observed);
    }

    pub fn record_winner_requested(&self) {
        Self::bump(&self.winners_requested);
    }

    /// Record a settled round and how long it waited for randomness.
    pub fn record_winner_picked(&self, waited_secs: Option<u64>) {
        Self::bump(&self.winners_picked);
        if let Some(secs) = waited_secs {
            self.fulfillment_wait_sum_secs
                .fetch_add(secs, Ordering::Relaxed);
        }
    }

    pub fn record_prize_paid(&self, lamports: u64) {
        Self::bump(&self.prizes_paid);
        self.lamports_paid.fetch_add(lamports, Ordering::Relaxed);
    }

    pub fn record_prize_parked(&self) {
        Self::bump(&self.prizes_parked);
    }

    pub fn record_transaction(&self) {
        Self::bump(&self.transactions_sent);
    }

    pub fn record_failure(&self) {
        Self::bump(&self.transactions_failed);
    }

    pub fn record_stuck_warning(&self) {
        Self::bump(&self.stuck_round_warnings);
    }

    /// Average seconds between `WinnerRequested` and `WinnerPicked`, or 0 if none.
    pub fn avg_fulfillment_wait_secs(&self) -> u64 {
        let count = self.winners_picked.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.fulfillment_wait_sum_secs.load(Ordering::Relaxed) / count
    }

    /// Serialize metrics as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rounds_started": self.rounds_started.load(Ordering::Relaxed),
            "entries_observed": self.entries_observed.load(Ordering::Relaxed),
            "winners_requested": self.winners_requested.load(Ordering::Relaxed),
            "winners_picked": self.winners_picked.load(Ordering::Relaxed),
            "prizes_paid": self.prizes_paid.load(Ordering::Relaxed),
            "prizes_parked": self.prizes_parked.load(Ordering::Relaxed),
            "lamports_paid": self.lamports_paid.load(Ordering::Relaxed),
            "transactions_sent": self.transactions_sent.load(Ordering::Relaxed),
            "transactions_failed": self.transactions_failed.load(Ordering::Relaxed),
            "stuck_round_warnings": self.stuck_round_warnings.load(Ordering::Relaxed),
            "avg_fulfillment_wait_secs": self.avg_fulfillment_wait_secs(),
        })
    }
}
