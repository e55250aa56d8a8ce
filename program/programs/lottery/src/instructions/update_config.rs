use anchor_lang::prelude::*;

use crate::errors::LotteryError;
use crate::state::{ConfigUpdate, LotteryConfig, LotteryRound};

/// Accounts required to update the lottery configuration.
#[derive(Accounts)]
pub struct UpdateConfig<'info> {
    /// Current admin; must sign.
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [LotteryConfig::SEED],
        bump = config.bump,
        constraint = config.admin == admin.key() @ LotteryError::Unauthorized,
    )]
    pub config: Account<'info, LotteryConfig>,

    /// Read to keep the entry price fixed while a round runs.
    #[account(
        seeds = [LotteryRound::SEED],
        bump = round.bump,
    )]
    pub round: Account<'info, LotteryRound>,
}

/// Update one or more configuration fields. The coordinator wiring is not updatable.
pub fn handler(
    ctx: Context<UpdateConfig>,
    new_operator: Option<Pubkey>,
    new_price_feed: Option<Pubkey>,
    new_entrance_fee_usd_cents: Option<u64>,
    new_max_price_age_secs: Option<u64>,
    new_callback_compute_limit: Option<u32>,
    new_admin: Option<Pubkey>,
) -> Result<()> {
    let update = ConfigUpdate {
        operator: new_operator,
        price_feed: new_price_feed,
        entrance_fee_usd_cents: new_entrance_fee_usd_cents,
        max_price_age_secs: new_max_price_age_secs,
        callback_compute_limit: new_callback_compute_limit,
        admin: new_admin,
    };
    let round_state = ctx.accounts.round.state;
    ctx.accounts.config.apply(&update, round_state)?;

    msg!("Config updated");
    Ok(())
}
