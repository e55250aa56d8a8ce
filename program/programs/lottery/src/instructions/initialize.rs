use anchor_lang::prelude::*;

use crate::coordinator::{coordinator_config_address, subscription_address};
use crate::errors::LotteryError;
use crate::state::{LotteryConfig, LotteryRound};

/// Settings fixed when the lottery is created.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct InitializeParams {
    pub operator: Pubkey,
    pub price_feed: Pubkey,
    pub subscription_id: u64,
    pub entrance_fee_usd_cents: u64,
    pub max_price_age_secs: u64,
    pub callback_compute_limit: u32,
}

/// Accounts required to create the lottery singletons.
#[derive(Accounts)]
pub struct Initialize<'info> {
    /// The initial admin who pays for account creation.
    #[account(mut)]
    pub admin: Signer<'info>,

    /// Lottery configuration PDA. Seeds: `["lottery-config"]`.
    #[account(
        init,
        payer = admin,
        space = 8 + LotteryConfig::INIT_SPACE,
        seeds = [LotteryConfig::SEED],
        bump,
    )]
    pub config: Account<'info, LotteryConfig>,

    /// Round PDA; also holds the pooled lamports. Seeds: `["lottery-round"]`.
    #[account(
        init,
        payer = admin,
        space = 8 + LotteryRound::INIT_SPACE,
        seeds = [LotteryRound::SEED],
        bump,
    )]
    pub round: Account<'info, LotteryRound>,

    /// The VRF coordinator program that serves randomness.
    /// CHECK: Only its key is stored; must be an executable program.
    #[account(executable)]
    pub coordinator_program: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<Initialize>, params: InitializeParams) -> Result<()> {
    require!(
        params.operator != Pubkey::default(),
        LotteryError::ZeroAddressNotAllowed
    );
    require!(
        params.price_feed != Pubkey::default(),
        LotteryError::ZeroAddressNotAllowed
    );
    require!(
        params.entrance_fee_usd_cents > 0,
        LotteryError::InvalidEntranceFee
    );

    let coordinator_program = ctx.accounts.coordinator_program.key();

    let config = &mut ctx.accounts.config;
    config.admin = ctx.accounts.admin.key();
    config.operator = params.operator;
    config.coordinator_program = coordinator_program;
    config.coordinator_config = coordinator_config_address(&coordinator_program);
    config.subscription_id = params.subscription_id;
    config.subscription = subscription_address(&coordinator_program, params.subscription_id);
    config.price_feed = params.price_feed;
    config.entrance_fee_usd_cents = params.entrance_fee_usd_cents;
    config.max_price_age_secs = params.max_price_age_secs;
    config.callback_compute_limit = params.callback_compute_limit;
    config.bump = ctx.bumps.config;

    ctx.accounts.round.set_inner(LotteryRound::new(ctx.bumps.round));

    msg!(
        "Lottery initialized: coordinator={}, subscription_id={}, fee_usd_cents={}",
        coordinator_program,
        params.subscription_id,
        params.entrance_fee_usd_cents
    );
    Ok(())
}
