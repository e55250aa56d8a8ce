//! Randomness requester: read-only mirrors of the VRF coordinator's accounts
//! and the hand-built `request_random_words` CPI.
//!
//! The coordinator is an external program, so its account layouts and
//! instruction encoding are reproduced here instead of linking its crate.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::solana_program::program::invoke;
use sha2::{Digest, Sha256};

use crate::errors::LotteryError;

/// Random words requested per round. One word picks one winner.
pub const NUM_WORDS: u32 = 1;

pub const COORDINATOR_CONFIG_SEED: &[u8] = b"coordinator-config";
pub const SUBSCRIPTION_SEED: &[u8] = b"subscription";
pub const CONSUMER_SEED: &[u8] = b"consumer";
pub const REQUEST_SEED: &[u8] = b"request";

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let hash = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..8]);
    disc
}

/// Anchor account discriminator: `sha256("account:<name>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

/// Anchor instruction discriminator: `sha256("global:<name>")[..8]`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// Coordinator config PDA. Seeds: `["coordinator-config"]`.
pub fn coordinator_config_address(coordinator_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[COORDINATOR_CONFIG_SEED], coordinator_program).0
}

/// Subscription PDA. Seeds: `["subscription", id.to_le_bytes()]`.
pub fn subscription_address(coordinator_program: &Pubkey, subscription_id: u64) -> Pubkey {
    Pubkey::find_program_address(
        &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes()],
        coordinator_program,
    )
    .0
}

/// Consumer registration PDA. Seeds: `["consumer", subscription_id.to_le_bytes(), consumer]`.
pub fn consumer_address(
    coordinator_program: &Pubkey,
    subscription_id: u64,
    consumer_program: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            CONSUMER_SEED,
            &subscription_id.to_le_bytes(),
            consumer_program.as_ref(),
        ],
        coordinator_program,
    )
    .0
}

/// Request PDA the coordinator creates for `request_id`. Seeds: `["request", id.to_le_bytes()]`.
pub fn request_address(coordinator_program: &Pubkey, request_id: u64) -> Pubkey {
    Pubkey::find_program_address(&[REQUEST_SEED, &request_id.to_le_bytes()], coordinator_program).0
}

/// Fail unless `request` is the PDA the coordinator will create for `request_id`.
pub fn ensure_request_address(
    coordinator_program: &Pubkey,
    request_id: u64,
    request: &Pubkey,
) -> Result<()> {
    require_keys_eq!(
        *request,
        request_address(coordinator_program, request_id),
        LotteryError::InvalidCoordinatorAccount
    );
    Ok(())
}

/// Decode an Anchor account owned by `coordinator_program`, checking owner
/// and discriminator first.
fn decode_owned<T: AnchorDeserialize>(
    info: &AccountInfo,
    coordinator_program: &Pubkey,
    name: &str,
) -> Result<T> {
    require_keys_eq!(
        *info.owner,
        *coordinator_program,
        LotteryError::InvalidCoordinatorAccount
    );
    let data = info.try_borrow_data()?;
    decode_account(&data, name)
}

fn decode_account<T: AnchorDeserialize>(data: &[u8], name: &str) -> Result<T> {
    require!(
        data.len() >= 8 && data[..8] == account_discriminator(name),
        LotteryError::InvalidCoordinatorAccount
    );
    T::deserialize(&mut &data[8..]).map_err(|_| error!(LotteryError::InvalidCoordinatorAccount))
}

/// Mirror of the coordinator's `CoordinatorConfig` account.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorConfigView {
    pub admin: Pubkey,
    pub authority: Pubkey,
    pub fee_per_word: u64,
    pub max_num_words: u32,
    /// The id the coordinator assigns to the next request.
    pub request_counter: u64,
    pub subscription_counter: u64,
    pub bump: u8,
}

impl CoordinatorConfigView {
    pub fn load(info: &AccountInfo, coordinator_program: &Pubkey) -> Result<Self> {
        decode_owned(info, coordinator_program, "CoordinatorConfig")
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_account(data, "CoordinatorConfig")
    }

    /// Lamports the coordinator charges for one round's request.
    pub fn request_fee(&self) -> Result<u64> {
        self.fee_per_word
            .checked_mul(NUM_WORDS as u64)
            .ok_or_else(|| error!(LotteryError::MathOverflow))
    }
}

/// Mirror of the coordinator's `Subscription` account.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionView {
    pub id: u64,
    pub owner: Pubkey,
    pub balance: u64,
    pub req_count: u64,
    pub consumer_count: u32,
    pub bump: u8,
}

impl SubscriptionView {
    pub fn load(info: &AccountInfo, coordinator_program: &Pubkey) -> Result<Self> {
        decode_owned(info, coordinator_program, "Subscription")
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_account(data, "Subscription")
    }
}

/// Fail with `SubscriptionUnderfunded` unless the subscription covers one
/// request. Returns the fee.
pub fn ensure_funded(config: &CoordinatorConfigView, subscription: &SubscriptionView) -> Result<u64> {
    let fee = config.request_fee()?;
    require!(
        subscription.balance >= fee,
        LotteryError::SubscriptionUnderfunded
    );
    Ok(fee)
}

/// Caller entropy mixed into the VRF input:
/// `sha256(round_key || round_id || entrant_count || pooled_balance || slot)`.
pub fn request_seed(
    round_key: &Pubkey,
    round_id: u64,
    entrant_count: u32,
    pooled_balance: u64,
    slot: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(round_key.as_ref());
    hasher.update(round_id.to_le_bytes());
    hasher.update(entrant_count.to_le_bytes());
    hasher.update(pooled_balance.to_le_bytes());
    hasher.update(slot.to_le_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}

/// The lottery's random value: little-endian `u64` of the first 8 bytes of a word.
pub fn random_value(word: &[u8; 32]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[..8]);
    u64::from_le_bytes(bytes)
}

/// The random value of a fulfillment, taken from its first word.
pub fn first_random_value(random_words: &[[u8; 32]]) -> Result<u64> {
    random_words
        .first()
        .map(random_value)
        .ok_or_else(|| error!(LotteryError::MissingRandomWords))
}

/// Account keys of `request_random_words`, in the coordinator's order.
#[derive(Clone, Copy, Debug)]
pub struct RequestRandomWordsKeys {
    pub requester: Pubkey,
    pub config: Pubkey,
    pub subscription: Pubkey,
    pub consumer_registration: Pubkey,
    pub consumer_program: Pubkey,
    pub request: Pubkey,
    pub system_program: Pubkey,
}

/// Build `request_random_words(num_words, seed, callback_compute_limit)`.
pub fn request_random_words_ix(
    coordinator_program: Pubkey,
    keys: &RequestRandomWordsKeys,
    seed: [u8; 32],
    callback_compute_limit: u32,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 4 + 32 + 4);
    data.extend_from_slice(&instruction_discriminator("request_random_words"));
    data.extend_from_slice(&NUM_WORDS.to_le_bytes());
    data.extend_from_slice(&seed);
    data.extend_from_slice(&callback_compute_limit.to_le_bytes());

    Instruction {
        program_id: coordinator_program,
        accounts: vec![
            AccountMeta::new(keys.requester, true),
            AccountMeta::new(keys.config, false),
            AccountMeta::new(keys.subscription, false),
            AccountMeta::new_readonly(keys.consumer_registration, false),
            AccountMeta::new_readonly(keys.consumer_program, false),
            AccountMeta::new(keys.request, false),
            AccountMeta::new_readonly(keys.system_program, false),
        ],
        data,
    }
}

/// Account infos for the `request_random_words` CPI.
pub struct RequestRandomWords<'a, 'info> {
    pub coordinator_program: &'a AccountInfo<'info>,
    pub requester: &'a AccountInfo<'info>,
    pub config: &'a AccountInfo<'info>,
    pub subscription: &'a AccountInfo<'info>,
    pub consumer_registration: &'a AccountInfo<'info>,
    pub consumer_program: &'a AccountInfo<'info>,
    pub request: &'a AccountInfo<'info>,
    pub system_program: &'a AccountInfo<'info>,
}

impl RequestRandomWords<'_, '_> {
    fn keys(&self) -> RequestRandomWordsKeys {
        RequestRandomWordsKeys {
            requester: self.requester.key(),
            config: self.config.key(),
            subscription: self.subscription.key(),
            consumer_registration: self.consumer_registration.key(),
            consumer_program: self.consumer_program.key(),
            request: self.request.key(),
            system_program: self.system_program.key(),
        }
    }

    /// The requester signs the outer transaction, so a plain `invoke` suffices.
    pub fn invoke(&self, seed: [u8; 32], callback_compute_limit: u32) -> Result<()> {
        let ix = request_random_words_ix(
            self.coordinator_program.key(),
            &self.keys(),
            seed,
            callback_compute_limit,
        );
        invoke(
            &ix,
            &[
                self.requester.clone(),
                self.config.clone(),
                self.subscription.clone(),
                self.consumer_registration.clone(),
                self.consumer_program.clone(),
                self.request.clone(),
                self.system_program.clone(),
                self.coordinator_program.clone(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_view(fee_per_word: u64, request_counter: u64) -> CoordinatorConfigView {
        CoordinatorConfigView {
            admin: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            fee_per_word,
            max_num_words: 10,
            request_counter,
            subscription_counter: 3,
            bump: 254,
        }
    }

    fn subscription_view(balance: u64) -> SubscriptionView {
        SubscriptionView {
            id: 2,
            owner: Pubkey::new_unique(),
            balance,
            req_count: 0,
            consumer_count: 1,
            bump: 253,
        }
    }

    fn account_bytes<T: AnchorSerialize>(name: &str, value: &T) -> Vec<u8> {
        let mut data = account_discriminator(name).to_vec();
        value.serialize(&mut data).unwrap();
        data
    }

    #[test]
    fn discriminators_follow_anchor_convention() {
        let expected: [u8; 8] = Sha256::digest(b"global:request_random_words")[..8]
            .try_into()
            .unwrap();
        assert_eq!(instruction_discriminator("request_random_words"), expected);
        assert_ne!(
            account_discriminator("CoordinatorConfig"),
            account_discriminator("Subscription")
        );
    }

    #[test]
    fn request_counter_sits_after_the_fixed_header() {
        let view = config_view(1_000, 0xdead_beef);
        let data = account_bytes("CoordinatorConfig", &view);
        // discriminator + admin + authority + fee_per_word + max_num_words
        let offset = 8 + 32 + 32 + 8 + 4;
        let counter = u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
        assert_eq!(counter, 0xdead_beef);
        assert_eq!(CoordinatorConfigView::decode(&data).unwrap(), view);
    }

    #[test]
    fn foreign_accounts_are_rejected() {
        let invalid = anchor_lang::error::Error::from(LotteryError::InvalidCoordinatorAccount);
        let subscription = account_bytes("Subscription", &subscription_view(5));

        assert_eq!(
            CoordinatorConfigView::decode(&subscription).unwrap_err(),
            invalid
        );
        assert_eq!(SubscriptionView::decode(&[1, 2, 3]).unwrap_err(), invalid);
        assert_eq!(
            SubscriptionView::decode(&subscription[..20]).unwrap_err(),
            invalid
        );
        assert_eq!(SubscriptionView::decode(&subscription).unwrap().balance, 5);
    }

    #[test]
    fn funding_requires_one_word_fee() {
        let config = config_view(50_000, 0);
        assert_eq!(ensure_funded(&config, &subscription_view(50_000)).unwrap(), 50_000);
        assert_eq!(
            ensure_funded(&config, &subscription_view(49_999)).unwrap_err(),
            anchor_lang::error::Error::from(LotteryError::SubscriptionUnderfunded)
        );
        assert_eq!(
            ensure_funded(&config_view(0, 0), &subscription_view(0)).unwrap(),
            0
        );
    }

    #[test]
    fn seed_commits_to_round_snapshot() {
        let round_key = Pubkey::new_unique();
        let base = request_seed(&round_key, 1, 3, 75, 1_000);
        assert_eq!(base, request_seed(&round_key, 1, 3, 75, 1_000));
        assert_ne!(base, request_seed(&round_key, 2, 3, 75, 1_000));
        assert_ne!(base, request_seed(&round_key, 1, 4, 75, 1_000));
        assert_ne!(base, request_seed(&round_key, 1, 3, 76, 1_000));
        assert_ne!(base, request_seed(&round_key, 1, 3, 75, 1_001));
        assert_ne!(base, request_seed(&Pubkey::new_unique(), 1, 3, 75, 1_000));
    }

    #[test]
    fn random_value_reads_first_eight_bytes_le() {
        let mut word = [0xffu8; 32];
        word[..8].copy_from_slice(&7u64.to_le_bytes());
        assert_eq!(random_value(&word), 7);

        let mut word = [0u8; 32];
        word[0] = 1;
        word[7] = 0x80;
        assert_eq!(random_value(&word), 0x8000_0000_0000_0001);
    }

    #[test]
    fn fulfillment_without_words_is_rejected() {
        assert_eq!(
            first_random_value(&[]).unwrap_err(),
            anchor_lang::error::Error::from(LotteryError::MissingRandomWords)
        );

        let mut first = [0u8; 32];
        first[..8].copy_from_slice(&11u64.to_le_bytes());
        let second = [0xffu8; 32];
        assert_eq!(first_random_value(&[first, second]).unwrap(), 11);
    }

    #[test]
    fn request_pda_must_match_the_counter() {
        let program = Pubkey::new_unique();
        ensure_request_address(&program, 4, &request_address(&program, 4)).unwrap();

        let invalid = anchor_lang::error::Error::from(LotteryError::InvalidCoordinatorAccount);
        assert_eq!(
            ensure_request_address(&program, 4, &request_address(&program, 3)).unwrap_err(),
            invalid
        );
        assert_eq!(
            ensure_request_address(&program, 4, &request_address(&Pubkey::new_unique(), 4))
                .unwrap_err(),
            invalid
        );
    }

    #[test]
    fn request_instruction_layout() {
        let program = Pubkey::new_unique();
        let keys = RequestRandomWordsKeys {
            requester: Pubkey::new_unique(),
            config: coordinator_config_address(&program),
            subscription: subscription_address(&program, 2),
            consumer_registration: consumer_address(&program, 2, &crate::ID),
            consumer_program: crate::ID,
            request: request_address(&program, 9),
            system_program: anchor_lang::system_program::ID,
        };
        let seed = [7u8; 32];
        let ix = request_random_words_ix(program, &keys, seed, 200_000);

        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data.len(), 48);
        assert_eq!(ix.data[..8], instruction_discriminator("request_random_words"));
        assert_eq!(ix.data[8..12], NUM_WORDS.to_le_bytes());
        assert_eq!(ix.data[12..44], seed);
        assert_eq!(ix.data[44..48], 200_000u32.to_le_bytes());

        let flags: Vec<(bool, bool)> = ix
            .accounts
            .iter()
            .map(|meta| (meta.is_signer, meta.is_writable))
            .collect();
        assert_eq!(
            flags,
            vec![
                (true, true),
                (false, true),
                (false, true),
                (false, false),
                (false, false),
                (false, true),
                (false, false),
            ]
        );
        assert_eq!(ix.accounts[5].pubkey, keys.request);
    }

    #[test]
    fn derived_addresses_are_distinct_per_id() {
        let program = Pubkey::new_unique();
        assert_ne!(request_address(&program, 0), request_address(&program, 1));
        assert_ne!(
            subscription_address(&program, 1),
            subscription_address(&program, 2)
        );
        assert_ne!(
            consumer_address(&program, 1, &crate::ID),
            consumer_address(&program, 1, &Pubkey::new_unique())
        );
    }
}
