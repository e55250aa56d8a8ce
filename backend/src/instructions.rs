//! Lottery instruction builders and the transaction sender.
//!
//! Account order follows the program's `#[derive(Accounts)]` structs.

use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::transaction::Transaction;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::accounts::{
    config_address, discriminator, round_address, unclaimed_prize_address, LotteryConfigAccount,
};
use crate::config::AppConfig;

const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);
const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ComputeBudget111111111111111111111111111111");

/// Lottery error codes (`6000 + variant index`) that a retry cannot fix.
const NON_RETRYABLE_ERRORS: &[(u32, &str)] = &[
    (6000, "InvalidState"),
    (6002, "NoEntrants"),
    (6007, "Unauthorized"),
    (6009, "PayoutPending"),
    (6010, "NoPendingPayout"),
    (6011, "WinnerMismatch"),
    (6018, "PrizeDeliverable"),
];

/// Check if an error string contains a known non-retryable program error.
pub fn is_non_retryable(err_str: &str) -> bool {
    NON_RETRYABLE_ERRORS.iter().any(|(code, name)| {
        err_str.contains(&format!("0x{code:x}")) || err_str.contains(name)
    })
}

fn ix_data(name: &str) -> Vec<u8> {
    discriminator("global", name).to_vec()
}

pub fn build_start_round(program_id: &Pubkey, operator: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*operator, true),
            AccountMeta::new_readonly(config_address(program_id), false),
            AccountMeta::new(round_address(program_id), false),
        ],
        data: ix_data("start_round"),
    }
}

/// Build `close_round` for the coordinator request numbered `request_id`.
pub fn build_close_round(
    program_id: &Pubkey,
    operator: &Pubkey,
    config: &LotteryConfigAccount,
    request_id: u64,
) -> Instruction {
    let coordinator = &config.coordinator_program;
    let (consumer_registration, _) = Pubkey::find_program_address(
        &[
            b"consumer",
            &config.subscription_id.to_le_bytes(),
            program_id.as_ref(),
        ],
        coordinator,
    );
    let (request_pda, _) =
        Pubkey::find_program_address(&[b"request", &request_id.to_le_bytes()], coordinator);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*operator, true),                          // operator (requester, payer)
            AccountMeta::new_readonly(config_address(program_id), false), // lottery config
            AccountMeta::new(round_address(program_id), false),         // lottery round
            AccountMeta::new_readonly(*coordinator, false),             // coordinator program
            AccountMeta::new(config.coordinator_config, false),         // coordinator config
            AccountMeta::new(config.subscription, false),               // subscription
            AccountMeta::new_readonly(consumer_registration, false),    // consumer registration
            AccountMeta::new(request_pda, false),                       // randomness request
            AccountMeta::new_readonly(*program_id, false),              // lottery program (consumer)
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: ix_data("close_round"),
    }
}

pub fn build_payout_winner(program_id: &Pubkey, caller: &Pubkey, winner: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(round_address(program_id), false),
            AccountMeta::new(*winner, false),
        ],
        data: ix_data("payout_winner"),
    }
}

/// Build `park_prize` for the prize settled in round `round_id`.
pub fn build_park_prize(
    program_id: &Pubkey,
    operator: &Pubkey,
    winner: &Pubkey,
    round_id: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*operator, true),
            AccountMeta::new_readonly(config_address(program_id), false),
            AccountMeta::new(round_address(program_id), false),
            AccountMeta::new_readonly(*winner, false),
            AccountMeta::new(unclaimed_prize_address(program_id, round_id), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: ix_data("park_prize"),
    }
}

/// Build a `SetComputeUnitPrice` instruction.
pub fn build_set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(3u8);
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// Prefix the priority-fee instruction when one is configured.
pub fn with_priority_fee(config: &AppConfig, ix: Instruction) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(2);
    if config.priority_fee_micro_lamports > 0 {
        instructions.push(build_set_compute_unit_price(
            config.priority_fee_micro_lamports,
        ));
    }
    instructions.push(ix);
    instructions
}

/// Sign with the operator and send, with exponential backoff on BlockhashNotFound.
#[instrument(skip(rpc_client, config, instructions))]
pub async fn send_with_retries(
    rpc_client: &RpcClient,
    config: &AppConfig,
    instructions: &[Instruction],
    action: &str,
) -> Result<String> {
    let mut retry_delay = Duration::from_millis(config.initial_retry_delay_ms);
    let operator = config.operator_keypair.as_ref();

    for attempt in 0..config.max_retries {
        let blockhash = rpc_client
            .get_latest_blockhash()
            .await
            .context("failed to fetch latest blockhash")?;

        let tx = Transaction::new_signed_with_payer(
            instructions,
            Some(&operator.pubkey()),
            &[operator],
            blockhash,
        );

        match rpc_client.send_and_confirm_transaction(&tx).await {
            Ok(sig) => return Ok(sig.to_string()),
            Err(e)
                if e.to_string().contains("BlockhashNotFound")
                    && attempt + 1 < config.max_retries =>
            {
                warn!(
                    attempt = attempt + 1,
                    delay = ?retry_delay,
                    "BlockhashNotFound, retrying"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2).min(Duration::from_secs(60));
            }
            Err(e) => return Err(e).context("send_and_confirm_transaction failed"),
        }
    }

    anyhow::bail!("max retries ({}) exceeded for {action}", config.max_retries)
}
