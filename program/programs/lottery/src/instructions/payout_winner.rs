use anchor_lang::prelude::*;

use crate::events::PrizePaid;
use crate::payout::transfer_prize;
use crate::state::LotteryRound;

/// Accounts required to pay the settled prize. Anyone may crank this.
#[derive(Accounts)]
pub struct PayoutWinner<'info> {
    pub caller: Signer<'info>,

    #[account(
        mut,
        seeds = [LotteryRound::SEED],
        bump = round.bump,
    )]
    pub round: Account<'info, LotteryRound>,

    /// CHECK: Must match the recorded winner.
    #[account(mut)]
    pub winner: UncheckedAccount<'info>,
}

/// Fails with `TransferFailed` when the winner cannot accept the prize; the
/// operator can then `park_prize` it.
pub fn handler(ctx: Context<PayoutWinner>) -> Result<()> {
    ctx.accounts.round.payout_for(&ctx.accounts.winner.key())?;

    // Clear the record before moving lamports.
    let payout = ctx.accounts.round.take_payout()?;

    transfer_prize(
        &ctx.accounts.round.to_account_info(),
        &ctx.accounts.winner.to_account_info(),
        payout.amount,
        &Rent::get()?,
    )?;

    emit!(PrizePaid {
        round_id: payout.round_id,
        winner: payout.winner,
        amount: payout.amount,
    });

    msg!(
        "Round {} prize of {} lamports paid to {}",
        payout.round_id,
        payout.amount,
        payout.winner
    );
    Ok(())
}
