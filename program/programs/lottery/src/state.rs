use anchor_lang::prelude::*;

use crate::errors::LotteryError;

/// Upper bound on entries per round; sizes the `LotteryRound` account.
pub const MAX_ENTRANTS: usize = 100;

/// Lottery configuration, stored as a singleton PDA.
///
/// Seeds: `["lottery-config"]`
///
/// Collaborator addresses (coordinator, subscription, price feed) are resolved
/// once in [`initialize`](crate::lottery::initialize). Only the `admin` may
/// update the mutable fields via [`update_config`](crate::lottery::update_config).
#[account]
#[derive(InitSpace)]
pub struct LotteryConfig {
    /// Privileged key that may update this configuration.
    pub admin: Pubkey,
    /// Key allowed to start and close rounds.
    pub operator: Pubkey,
    /// Program ID of the VRF coordinator.
    pub coordinator_program: Pubkey,
    /// The coordinator's config PDA; signs the fulfillment callback.
    pub coordinator_config: Pubkey,
    /// Coordinator subscription paying for randomness requests.
    pub subscription_id: u64,
    /// The subscription PDA derived from `subscription_id`.
    pub subscription: Pubkey,
    /// SOL/USD price feed account.
    pub price_feed: Pubkey,
    /// Entrance fee target in US cents.
    pub entrance_fee_usd_cents: u64,
    /// Maximum age of a price answer before the feed counts as unavailable.
    pub max_price_age_secs: u64,
    /// Compute unit limit the coordinator grants the fulfillment callback.
    pub callback_compute_limit: u32,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

impl LotteryConfig {
    pub const SEED: &'static [u8] = b"lottery-config";

    /// Apply an admin update. Every field is validated before any is written.
    ///
    /// The price feed and USD fee decide what an entry costs, so they may only
    /// change between rounds.
    pub fn apply(&mut self, update: &ConfigUpdate, round_state: RoundState) -> Result<()> {
        if update.reprices() {
            require!(round_state == RoundState::Closed, LotteryError::InvalidState);
        }
        for key in [update.operator, update.price_feed, update.admin]
            .into_iter()
            .flatten()
        {
            require!(key != Pubkey::default(), LotteryError::ZeroAddressNotAllowed);
        }
        if let Some(fee) = update.entrance_fee_usd_cents {
            require!(fee > 0, LotteryError::InvalidEntranceFee);
        }

        if let Some(operator) = update.operator {
            self.operator = operator;
        }
        if let Some(price_feed) = update.price_feed {
            self.price_feed = price_feed;
        }
        if let Some(fee) = update.entrance_fee_usd_cents {
            self.entrance_fee_usd_cents = fee;
        }
        if let Some(max_age) = update.max_price_age_secs {
            self.max_price_age_secs = max_age;
        }
        if let Some(limit) = update.callback_compute_limit {
            self.callback_compute_limit = limit;
        }
        if let Some(admin) = update.admin {
            self.admin = admin;
        }
        Ok(())
    }
}

/// Admin changes to [`LotteryConfig`]; `None` leaves a field untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub operator: Option<Pubkey>,
    pub price_feed: Option<Pubkey>,
    pub entrance_fee_usd_cents: Option<u64>,
    pub max_price_age_secs: Option<u64>,
    pub callback_compute_limit: Option<u32>,
    pub admin: Option<Pubkey>,
}

impl ConfigUpdate {
    fn reprices(&self) -> bool {
        self.price_feed.is_some() || self.entrance_fee_usd_cents.is_some()
    }
}

/// Lifecycle state of the active round.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub enum RoundState {
    /// No round is accepting entries. Initial state and end of every round.
    Closed,
    /// Entries are accepted.
    Open,
    /// Entry is closed and the round waits for the coordinator callback.
    Calculating,
}

/// One paid entry in the ledger.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct Entry {
    pub player: Pubkey,
    /// Lamports paid for this entry.
    pub amount: u64,
}

/// The outstanding randomness request of a `Calculating` round.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct PendingRequest {
    /// Request id assigned by the coordinator (its `request_counter` at request time).
    pub request_id: u64,
    pub issued_at_round: u64,
    pub request_slot: u64,
}

/// A settled prize that has not reached the winner yet.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct PendingPayout {
    pub round_id: u64,
    pub winner: Pubkey,
    pub amount: u64,
}

/// Outcome of a successful fulfillment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub request_id: u64,
    pub winner_index: usize,
    pub payout: PendingPayout,
}

/// The single lottery round, stored as a singleton PDA.
///
/// Seeds: `["lottery-round"]`
///
/// The account also custodies the pooled lamports. Every transition goes
/// through one of the methods below, each gated on `state`:
///
/// ```text
/// Closed --start_round--> Open --begin_calculating--> Calculating --settle--> Closed
/// ```
#[account]
#[derive(InitSpace)]
pub struct LotteryRound {
    /// Monotonically increasing round counter; `0` before the first round.
    pub round_id: u64,
    pub state: RoundState,
    /// Entries in arrival order. Duplicates are allowed and weight the draw.
    #[max_len(MAX_ENTRANTS)]
    pub entrants: Vec<Entry>,
    /// Sum of accepted entry payments since the last settlement.
    pub pooled_balance: u64,
    /// Unix timestamp at which the current round was opened.
    pub opened_at: i64,
    /// Set iff `state == Calculating`.
    pub pending_request: Option<PendingRequest>,
    pub recent_winner: Option<Pubkey>,
    /// Prize awaiting `payout_winner`; blocks the next `start_round`.
    pub pending_payout: Option<PendingPayout>,
    /// PDA bump seed cached for efficient re-derivation.
    pub bump: u8,
}

/// A prize that could not be delivered, held until the winner claims it.
///
/// Seeds: `["unclaimed-prize", round_id.to_le_bytes()]`
///
/// Holds `amount` lamports on top of its own rent deposit; `claim_prize`
/// closes it to the winner.
#[account]
#[derive(InitSpace)]
pub struct UnclaimedPrize {
    pub round_id: u64,
    pub winner: Pubkey,
    pub amount: u64,
    pub bump: u8,
}

impl UnclaimedPrize {
    pub const SEED: &'static [u8] = b"unclaimed-prize";
}

/// Map a random value onto the entrant ledger: `random_value mod entrant_count`.
pub fn winner_index(random_value: u64, entrant_count: usize) -> Result<usize> {
    require!(entrant_count > 0, LotteryError::NoEntrants);
    Ok((random_value % entrant_count as u64) as usize)
}

impl LotteryRound {
    pub const SEED: &'static [u8] = b"lottery-round";

    /// A fresh, closed round with no history.
    pub fn new(bump: u8) -> Self {
        Self {
            round_id: 0,
            state: RoundState::Closed,
            entrants: Vec::new(),
            pooled_balance: 0,
            opened_at: 0,
            pending_request: None,
            recent_winner: None,
            pending_payout: None,
            bump,
        }
    }

    pub fn ensure_state(&self, expected: RoundState) -> Result<()> {
        require!(self.state == expected, LotteryError::InvalidState);
        Ok(())
    }

    /// `Closed -> Open`. Returns the new round id.
    pub fn start_round(&mut self, now: i64) -> Result<u64> {
        self.ensure_state(RoundState::Closed)?;
        require!(self.pending_payout.is_none(), LotteryError::PayoutPending);

        let round_id = self
            .round_id
            .checked_add(1)
            .ok_or(LotteryError::MathOverflow)?;

        self.round_id = round_id;
        self.state = RoundState::Open;
        self.opened_at = now;
        self.entrants.clear();
        self.pooled_balance = 0;
        Ok(round_id)
    }

    /// Append a paid entry. Returns the new entrant count.
    ///
    /// All checks run before any field is written, so a rejected entry leaves
    /// the ledger untouched.
    pub fn record_entry(&mut self, player: Pubkey, amount: u64, required_fee: u64) -> Result<usize> {
        self.ensure_state(RoundState::Open)?;
        require!(amount >= required_fee, LotteryError::InsufficientPayment);
        require!(self.entrants.len() < MAX_ENTRANTS, LotteryError::LotteryFull);

        let pooled_balance = self
            .pooled_balance
            .checked_add(amount)
            .ok_or(LotteryError::MathOverflow)?;

        self.entrants.push(Entry { player, amount });
        self.pooled_balance = pooled_balance;
        Ok(self.entrants.len())
    }

    /// Checks shared by `close_round` before any coordinator account is read.
    pub fn ensure_closable(&self) -> Result<()> {
        self.ensure_state(RoundState::Open)?;
        require!(!self.entrants.is_empty(), LotteryError::NoEntrants);
        Ok(())
    }

    /// `Open -> Calculating`, recording the outstanding request.
    pub fn begin_calculating(&mut self, request: PendingRequest) -> Result<()> {
        self.ensure_closable()?;
        self.state = RoundState::Calculating;
        self.pending_request = Some(request);
        Ok(())
    }

    /// `Calculating -> Closed`. Picks the winner and moves the whole pool into
    /// a [`PendingPayout`].
    ///
    /// A mismatched `request_id` fails before anything is written.
    pub fn settle(&mut self, request_id: u64, random_value: u64) -> Result<Settlement> {
        self.ensure_state(RoundState::Calculating)?;
        let pending = self.pending_request.ok_or(LotteryError::UnknownRequest)?;
        require!(
            pending.request_id == request_id,
            LotteryError::UnknownRequest
        );

        let index = winner_index(random_value, self.entrants.len())?;
        let winner = self.entrants[index].player;
        let payout = PendingPayout {
            round_id: self.round_id,
            winner,
            amount: self.pooled_balance,
        };

        self.entrants.clear();
        self.pooled_balance = 0;
        self.pending_request = None;
        self.state = RoundState::Closed;
        self.recent_winner = Some(winner);
        self.pending_payout = Some(payout);

        Ok(Settlement {
            request_id,
            winner_index: index,
            payout,
        })
    }

    /// The pending payout, provided `winner` is its recipient.
    pub fn payout_for(&self, winner: &Pubkey) -> Result<PendingPayout> {
        let pending = self
            .pending_payout
            .ok_or(LotteryError::NoPendingPayout)?;
        require_keys_eq!(*winner, pending.winner, LotteryError::WinnerMismatch);
        Ok(pending)
    }

    /// Remove the pending payout so the transfer happens against cleared state.
    pub fn take_payout(&mut self) -> Result<PendingPayout> {
        self.pending_payout
            .take()
            .ok_or_else(|| error!(LotteryError::NoPendingPayout))
    }
}
