use anchor_lang::prelude::*;

pub mod coordinator;
pub mod errors;
pub mod events;
pub mod instructions;
pub mod payout;
pub mod price;
pub mod state;

use instructions::*;

declare_id!("DS2tZwC26zreGyDLziKYeAPDj4o17wT5wjEzNfQQdENX");

/// Verifiable-randomness lottery.
///
/// Players buy entries priced in USD and paid in SOL at the live oracle rate.
/// When the operator closes entry, the program requests one random word from
/// the VRF coordinator; the coordinator's callback picks the winner, and the
/// whole pool is paid out to them.
///
/// ## Round lifecycle
///
/// 1. **Open**: `start_round`; players call `enter` with at least the
///    entrance fee.
/// 2. **Calculating**: `close_round` snapshots the ledger and CPIs
///    `request_random_words` into the coordinator.
/// 3. **Closed**: the coordinator calls `fulfill_random_words`; the winner is
///    `random_value % entrant_count` and the pool becomes a pending payout.
/// 4. **Payout**: anyone calls `payout_winner` to move the prize; the next
///    round cannot start until this succeeds. A prize the winner's account
///    cannot accept is parked with `park_prize` and claimed later.
#[program]
pub mod lottery {
    use super::*;

    /// Create the configuration and round singletons.
    ///
    /// The coordinator config and subscription PDAs are derived here and never change.
    pub fn initialize(ctx: Context<Initialize>, params: InitializeParams) -> Result<()> {
        instructions::initialize::handler(ctx, params)
    }

    /// Update the lottery configuration (admin-only).
    ///
    /// All parameters are optional; only provided fields are updated.
    /// Zero-address values and a zero USD fee are rejected. The price feed and
    /// USD fee can only change while no round is running.
    pub fn update_config(
        ctx: Context<UpdateConfig>,
        new_operator: Option<Pubkey>,
        new_price_feed: Option<Pubkey>,
        new_entrance_fee_usd_cents: Option<u64>,
        new_max_price_age_secs: Option<u64>,
        new_callback_compute_limit: Option<u32>,
        new_admin: Option<Pubkey>,
    ) -> Result<()> {
        instructions::update_config::handler(
            ctx,
            new_operator,
            new_price_feed,
            new_entrance_fee_usd_cents,
            new_max_price_age_secs,
            new_callback_compute_limit,
            new_admin,
        )
    }

    /// Open a new round (operator-only). Fails while a prize is unpaid.
    pub fn start_round(ctx: Context<StartRound>) -> Result<()> {
        instructions::start_round::handler(ctx)
    }

    /// Enter the open round, paying `amount` lamports into the pool.
    pub fn enter(ctx: Context<Enter>, amount: u64) -> Result<()> {
        instructions::enter::handler(ctx, amount)
    }

    /// Close entry and request randomness (operator-only).
    pub fn close_round(ctx: Context<CloseRound>) -> Result<()> {
        instructions::close_round::handler(ctx)
    }

    /// Coordinator callback delivering the random words for `request_id`.
    ///
    /// Only the coordinator config PDA may sign this.
    pub fn fulfill_random_words(
        ctx: Context<FulfillRandomWords>,
        request_id: u64,
        random_words: Vec<[u8; 32]>,
    ) -> Result<()> {
        instructions::fulfill_random_words::handler(ctx, request_id, random_words)
    }

    /// Transfer the settled prize to the recorded winner. Permissionless.
    pub fn payout_winner(ctx: Context<PayoutWinner>) -> Result<()> {
        instructions::payout_winner::handler(ctx)
    }

    /// Move a prize the winner cannot receive into an `UnclaimedPrize` record
    /// (operator-only), so the next round can start.
    pub fn park_prize(ctx: Context<ParkPrize>) -> Result<()> {
        instructions::park_prize::handler(ctx)
    }

    /// Close an `UnclaimedPrize` record to its winner. Permissionless.
    pub fn claim_prize(ctx: Context<ClaimPrize>) -> Result<()> {
        instructions::claim_prize::handler(ctx)
    }

    /// Entrance fee in lamports at the current price, returned via return data.
    pub fn entrance_fee(ctx: Context<EntranceFee>) -> Result<u64> {
        instructions::entrance_fee::handler(ctx)
    }
}
