use anchor_lang::prelude::*;
use anchor_lang::system_program::{transfer, Transfer};

use crate::errors::LotteryError;
use crate::events::PlayerEntered;
use crate::instructions::entrance_fee::quote;
use crate::state::{LotteryConfig, LotteryRound, RoundState};

/// Accounts required to enter the open round.
#[derive(Accounts)]
pub struct Enter<'info> {
    /// The entrant; pays `amount` into the round.
    #[account(mut)]
    pub player: Signer<'info>,

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

    /// CHECK: Must be the configured feed; decoded by the price adapter.
    #[account(address = config.price_feed @ LotteryError::InvalidPriceFeed)]
    pub price_feed: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Record an entry and move `amount` lamports from the player into the round.
pub fn handler(ctx: Context<Enter>, amount: u64) -> Result<()> {
    // Reject before touching the oracle.
    ctx.accounts.round.ensure_state(RoundState::Open)?;

    let required_fee = quote(&ctx.accounts.config, &ctx.accounts.price_feed)?;
    let player = ctx.accounts.player.key();

    let round = &mut ctx.accounts.round;
    let entrant_count = round.record_entry(player, amount, required_fee)?;
    let round_id = round.round_id;

    transfer(
        CpiContext::new(
            ctx.accounts.system_program.to_account_info(),
            Transfer {
                from: ctx.accounts.player.to_account_info(),
                to: ctx.accounts.round.to_account_info(),
            },
        ),
        amount,
    )?;

    emit!(PlayerEntered {
        round_id,
        player,
        amount,
        required_fee,
        entrant_count: entrant_count as u32,
    });

    msg!(
        "Entry #{} in round {}: {} lamports (fee {})",
        entrant_count,
        round_id,
        amount,
        required_fee
    );
    Ok(())
}
