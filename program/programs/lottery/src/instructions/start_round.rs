use anchor_lang::prelude::*;

use crate::errors::LotteryError;
use crate::events::RoundStarted;
use crate::state::{LotteryConfig, LotteryRound};

/// Accounts required to open a new round.
#[derive(Accounts)]
pub struct StartRound<'info> {
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
}

pub fn handler(ctx: Context<StartRound>) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let round_id = ctx.accounts.round.start_round(now)?;

    emit!(RoundStarted {
        round_id,
        operator: ctx.accounts.operator.key(),
        entrance_fee_usd_cents: ctx.accounts.config.entrance_fee_usd_cents,
        opened_at: now,
    });

    msg!("Round {} opened", round_id);
    Ok(())
}
