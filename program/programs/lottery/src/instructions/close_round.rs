use anchor_lang::prelude::*;

use crate::coordinator::{
    ensure_funded, ensure_request_address, request_seed, CoordinatorConfigView, RequestRandomWords,
    SubscriptionView,
};
use crate::errors::LotteryError;
use crate::events::WinnerRequested;
use crate::state::{LotteryConfig, LotteryRound, PendingRequest};

/// Accounts required to close entry and request randomness.
#[derive(Accounts)]
pub struct CloseRound<'info> {
    /// Operator; signs as the coordinator requester and pays the request PDA rent.
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

    /// CHECK: Address pinned to the configured coordinator.
    #[account(
        executable,
        address = config.coordinator_program @ LotteryError::InvalidCoordinatorAccount,
    )]
    pub coordinator_program: UncheckedAccount<'info>,

    /// Coordinator config PDA; read for `request_counter` and `fee_per_word`.
    /// CHECK: Address pinned; owner and layout checked when decoded.
    #[account(
        mut,
        address = config.coordinator_config @ LotteryError::InvalidCoordinatorAccount,
    )]
    pub coordinator_config: UncheckedAccount<'info>,

    /// Subscription paying for the request.
    /// CHECK: Address pinned; owner and layout checked when decoded.
    #[account(
        mut,
        address = config.subscription @ LotteryError::InvalidCoordinatorAccount,
    )]
    pub subscription: UncheckedAccount<'info>,

    /// This program's consumer registration under the subscription.
    /// CHECK: Validated by the coordinator during CPI.
    pub consumer_registration: UncheckedAccount<'info>,

    /// Request PDA the coordinator creates. Seeds: `["request", request_counter.to_le_bytes()]`.
    /// CHECK: Address checked against the coordinator's counter below.
    #[account(mut)]
    pub randomness_request: UncheckedAccount<'info>,

    pub lottery_program: Program<'info, crate::program::Lottery>,
    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<CloseRound>) -> Result<()> {
    ctx.accounts.round.ensure_closable()?;

    let coordinator_program = ctx.accounts.config.coordinator_program;
    let coordinator =
        CoordinatorConfigView::load(&ctx.accounts.coordinator_config, &coordinator_program)?;
    let subscription = SubscriptionView::load(&ctx.accounts.subscription, &coordinator_program)?;
    ensure_funded(&coordinator, &subscription)?;

    let request_id = coordinator.request_counter;
    ensure_request_address(
        &coordinator_program,
        request_id,
        &ctx.accounts.randomness_request.key(),
    )?;

    let slot = Clock::get()?.slot;
    let round_key = ctx.accounts.round.key();
    let round = &mut ctx.accounts.round;
    let round_id = round.round_id;
    let entrant_count = round.entrants.len() as u32;
    let pooled_balance = round.pooled_balance;
    let seed = request_seed(&round_key, round_id, entrant_count, pooled_balance, slot);

    round.begin_calculating(PendingRequest {
        request_id,
        issued_at_round: round_id,
        request_slot: slot,
    })?;

    RequestRandomWords {
        coordinator_program: &ctx.accounts.coordinator_program,
        requester: &ctx.accounts.operator,
        config: &ctx.accounts.coordinator_config,
        subscription: &ctx.accounts.subscription,
        consumer_registration: &ctx.accounts.consumer_registration,
        consumer_program: &ctx.accounts.lottery_program,
        request: &ctx.accounts.randomness_request,
        system_program: &ctx.accounts.system_program,
    }
    .invoke(seed, ctx.accounts.config.callback_compute_limit)?;

    emit!(WinnerRequested {
        round_id,
        request_id,
        entrant_count,
        pooled_balance,
    });

    msg!(
        "Round {} calculating: request_id={}, entrants={}",
        round_id,
        request_id,
        entrant_count
    );
    Ok(())
}
