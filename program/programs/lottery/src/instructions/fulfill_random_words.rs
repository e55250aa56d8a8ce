use anchor_lang::prelude::*;

use crate::coordinator::first_random_value;
use crate::errors::LotteryError;
use crate::events::WinnerPicked;
use crate::state::{LotteryConfig, LotteryRound, RoundState};

/// Accounts of the coordinator's callback CPI.
///
/// The coordinator passes its config PDA as the first account and signs for
/// it; the remaining accounts are forwarded from the fulfillment transaction.
#[derive(Accounts)]
pub struct FulfillRandomWords<'info> {
    /// Coordinator config PDA, signing via `invoke_signed`.
    #[account(address = config.coordinator_config @ LotteryError::Unauthorized)]
    pub coordinator_config: Signer<'info>,

    #[account(
        seeds = [LotteryConfig::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, LotteryConfig>,

    #[account(
        mut,
        seeds = [LotteryRound::SEED],
        bump = round.bump,
    )]
    pub round: Account<'info, LotteryRound>,
}

/// Pick the winner and park the prize as a pending payout. No lamports move here.
pub fn handler(
    ctx: Context<FulfillRandomWords>,
    request_id: u64,
    random_words: Vec<[u8; 32]>,
) -> Result<()> {
    let round = &mut ctx.accounts.round;
    round.ensure_state(RoundState::Calculating)?;
    let value = first_random_value(&random_words)?;

    let settlement = round.settle(request_id, value)?;
    let payout = settlement.payout;

    emit!(WinnerPicked {
        round_id: payout.round_id,
        request_id,
        winner: payout.winner,
        winner_index: settlement.winner_index as u32,
        prize: payout.amount,
    });

    msg!(
        "Round {} winner {} (index {}), prize {} lamports",
        payout.round_id,
        payout.winner,
        settlement.winner_index,
        payout.amount
    );
    Ok(())
}
