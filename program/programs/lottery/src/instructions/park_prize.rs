use anchor_lang::prelude::*;

use crate::errors::LotteryError;
use crate::events::PrizeParked;
use crate::payout::{prize_lands, transfer_prize};
use crate::state::{LotteryConfig, LotteryRound, UnclaimedPrize};

/// Accounts required to park an undeliverable prize.
#[derive(Accounts)]
pub struct ParkPrize<'info> {
    /// Operator; pays the record's rent.
    #[account(mut)]
    pub operator: Signer<'info>,

    #[account(
        seeds = [LotteryConfig::SEED],
        bump = config.bump,
        constraint = config.operator == operator.key() @ LotteryError::Unauthorized,
    )]
    pub config: Account<'info, LotteryConfig>,

    #[account(
        mut,
        seeds = [LotteryRound::SEED],
        bump = round.bump,
    )]
    pub round: Account<'info, LotteryRound>,

    /// CHECK: Must match the recorded winner; only its balance is read.
    pub winner: UncheckedAccount<'info>,

    /// The settled round's id is still `round.round_id` while a payout is pending.
    #[account(
        init,
        payer = operator,
        space = 8 + UnclaimedPrize::INIT_SPACE,
        seeds = [UnclaimedPrize::SEED, &round.round_id.to_le_bytes()],
        bump,
    )]
    pub unclaimed_prize: Account<'info, UnclaimedPrize>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<ParkPrize>) -> Result<()> {
    let rent = Rent::get()?;
    let winner = &ctx.accounts.winner;
    let pending = ctx.accounts.round.payout_for(&winner.key())?;
    require!(
        !prize_lands(winner.lamports(), winner.data_len(), pending.amount, &rent),
        LotteryError::PrizeDeliverable
    );

    let payout = ctx.accounts.round.take_payout()?;
    ctx.accounts.unclaimed_prize.set_inner(UnclaimedPrize {
        round_id: payout.round_id,
        winner: payout.winner,
        amount: payout.amount,
        bump: ctx.bumps.unclaimed_prize,
    });

    transfer_prize(
        &ctx.accounts.round.to_account_info(),
        &ctx.accounts.unclaimed_prize.to_account_info(),
        payout.amount,
        &rent,
    )?;

    emit!(PrizeParked {
        round_id: payout.round_id,
        winner: payout.winner,
        amount: payout.amount,
    });

    msg!(
        "Round {} prize of {} lamports parked for {}",
        payout.round_id,
        payout.amount,
        payout.winner
    );
    Ok(())
}
