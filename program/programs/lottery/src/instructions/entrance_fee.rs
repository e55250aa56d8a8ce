use anchor_lang::prelude::*;

use crate::errors::LotteryError;
use crate::price::{current_price, entrance_fee_lamports};
use crate::state::LotteryConfig;

/// Accounts required to quote the entrance fee.
#[derive(Accounts)]
pub struct EntranceFee<'info> {
    #[account(
        seeds = [LotteryConfig::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, LotteryConfig>,

    /// CHECK: Must be the configured feed; decoded by the price adapter.
    #[account(address = config.price_feed @ LotteryError::InvalidPriceFeed)]
    pub price_feed: UncheckedAccount<'info>,
}

/// Current entrance fee in lamports, derived from the live price.
pub fn quote(config: &LotteryConfig, price_feed: &AccountInfo) -> Result<u64> {
    let now = Clock::get()?.unix_timestamp;
    let price = current_price(price_feed, now, config.max_price_age_secs)?;
    entrance_fee_lamports(config.entrance_fee_usd_cents, price)
}

pub fn handler(ctx: Context<EntranceFee>) -> Result<u64> {
    quote(&ctx.accounts.config, &ctx.accounts.price_feed)
}
