use anchor_lang::prelude::*;

/// Error codes for the lottery program.
///
/// Anchor encodes these as `6000 + variant index` in on-chain error responses.
#[error_code]
pub enum LotteryError {
    /// The round is not in the state the instruction requires.
    #[msg("Operation not allowed in the current round state")]
    InvalidState,
    /// The entry payment is below the entrance fee derived from the live price.
    #[msg("Payment is below the entrance fee")]
    InsufficientPayment,
    /// `close_round` was called on an open round without any entrants.
    #[msg("Round has no entrants")]
    NoEntrants,
    /// The price feed reported a zero, negative or stale answer.
    #[msg("Price oracle unavailable")]
    OracleUnavailable,
    /// The coordinator subscription cannot pay for a randomness request.
    #[msg("Randomness subscription is underfunded")]
    SubscriptionUnderfunded,
    /// The fulfillment does not match the pending randomness request.
    #[msg("Unknown randomness request")]
    UnknownRequest,
    /// The prize could not be moved to the winner, e.g. it would leave the
    /// winner below the rent-exempt minimum.
    #[msg("Prize transfer failed")]
    TransferFailed,
    /// Signer does not have permission for this action (wrong admin, operator or coordinator).
    #[msg("Unauthorized")]
    Unauthorized,
    /// The entrant ledger reached `MAX_ENTRANTS`.
    #[msg("Round is full")]
    LotteryFull,
    /// A previous winner has not been paid yet.
    #[msg("Previous prize has not been paid out")]
    PayoutPending,
    /// `payout_winner` was called with nothing to pay.
    #[msg("No pending payout")]
    NoPendingPayout,
    /// The winner account passed to `payout_winner` is not the recorded winner.
    #[msg("Winner account mismatch")]
    WinnerMismatch,
    /// The price feed account is not the configured one or is malformed.
    #[msg("Invalid price feed account")]
    InvalidPriceFeed,
    /// A coordinator account has the wrong owner, address or layout.
    #[msg("Invalid coordinator account")]
    InvalidCoordinatorAccount,
    /// The coordinator delivered an empty `random_words` vector.
    #[msg("Fulfillment carried no random words")]
    MissingRandomWords,
    /// The configured USD entrance fee is zero.
    #[msg("Entrance fee must be positive")]
    InvalidEntranceFee,
    /// Checked arithmetic overflowed.
    #[msg("Math overflow")]
    MathOverflow,
    /// A public key argument was the zero address (`11111111111111111111111111111111`).
    #[msg("Zero address not allowed")]
    ZeroAddressNotAllowed,
    /// `park_prize` was called although the winner can be paid directly.
    #[msg("Prize can be paid to the winner directly")]
    PrizeDeliverable,
}
