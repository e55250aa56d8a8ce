use anchor_lang::prelude::*;

use crate::errors::LotteryError;
use crate::events::PrizePaid;
use crate::state::UnclaimedPrize;

/// Accounts required to claim a parked prize. Anyone may crank this.
#[derive(Accounts)]
pub struct ClaimPrize<'info> {
    pub caller: Signer<'info>,

    /// Closed to the winner, rent deposit included.
    #[account(
        mut,
        seeds = [UnclaimedPrize::SEED, &unclaimed_prize.round_id.to_le_bytes()],
        bump = unclaimed_prize.bump,
        has_one = winner @ LotteryError::WinnerMismatch,
        close = winner,
    )]
    pub unclaimed_prize: Account<'info, UnclaimedPrize>,

    /// CHECK: Must match the recorded winner.
    #[account(mut)]
    pub winner: UncheckedAccount<'info>,
}

pub fn handler(ctx: Context<ClaimPrize>) -> Result<()> {
    let prize = &ctx.accounts.unclaimed_prize;

    emit!(PrizePaid {
        round_id: prize.round_id,
        winner: prize.winner,
        amount: prize.amount,
    });

    msg!(
        "Round {} unclaimed prize of {} lamports paid to {}",
        prize.round_id,
        prize.amount,
        prize.winner
    );
    Ok(())
}
