use anchor_lang::prelude::*;

/// Emitted when the operator opens a new round.
#[event]
pub struct RoundStarted {
    pub round_id: u64,
    pub operator: Pubkey,
    pub entrance_fee_usd_cents: u64,
    pub opened_at: i64,
}

/// Emitted for every accepted entry, including repeat entries by the same player.
#[event]
pub struct PlayerEntered {
    pub round_id: u64,
    pub player: Pubkey,
    pub amount: u64,
    pub required_fee: u64,
    pub entrant_count: u32,
}

/// Emitted when entry closes and randomness is requested from the coordinator.
///
/// The keeper backend uses this to track how long a round waits in `Calculating`.
#[event]
pub struct WinnerRequested {
    pub round_id: u64,
    pub request_id: u64,
    pub entrant_count: u32,
    pub pooled_balance: u64,
}

/// Emitted when the coordinator callback settles a round.
#[event]
pub struct WinnerPicked {
    pub round_id: u64,
    pub request_id: u64,
    pub winner: Pubkey,
    pub winner_index: u32,
    pub prize: u64,
}

/// Emitted when the prize lamports reach the winner.
#[event]
pub struct PrizePaid {
    pub round_id: u64,
    pub winner: Pubkey,
    pub amount: u64,
}

/// Emitted when an undeliverable prize moves into an `UnclaimedPrize` record,
/// unblocking the next round.
#[event]
pub struct PrizeParked {
    pub round_id: u64,
    pub winner: Pubkey,
    pub amount: u64,
}
