//! Lottery and coordinator account decoding.
//!
//! The keeper reads raw account data over RPC and decodes the Borsh layouts
//! by hand; offsets below include the 8-byte Anchor discriminator.

use anyhow::{bail, ensure, Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

pub const LOTTERY_CONFIG_SEED: &[u8] = b"lottery-config";
pub const LOTTERY_ROUND_SEED: &[u8] = b"lottery-round";
pub const UNCLAIMED_PRIZE_SEED: &[u8] = b"unclaimed-prize";

/// Offset of `request_counter` in the coordinator's `CoordinatorConfig`:
/// discriminator (8) + admin (32) + authority (32) + fee_per_word (8) + max_num_words (4).
const REQUEST_COUNTER_OFFSET: usize = 84;

/// Compute the Anchor discriminator `sha256("<namespace>:<name>")[..8]`.
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(format!("{namespace}:{name}"));
    let hash = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..8]);
    disc
}

pub fn config_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[LOTTERY_CONFIG_SEED], program_id).0
}

pub fn round_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[LOTTERY_ROUND_SEED], program_id).0
}

/// Record holding the parked prize of round `round_id`.
pub fn unclaimed_prize_address(program_id: &Pubkey, round_id: u64) -> Pubkey {
    Pubkey::find_program_address(&[UNCLAIMED_PRIZE_SEED, &round_id.to_le_bytes()], program_id).0
}

/// Sequential little-endian reader over Borsh data.
pub struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check and skip an Anchor discriminator.
    pub fn expect_discriminator(&mut self, expected: &[u8; 8], what: &str) -> Result<()> {
        let disc = self.take(8)?;
        ensure!(disc == expected, "account is not a {what}");
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        ensure!(
            self.data.len() >= len,
            "unexpected end of data: need {len} bytes, have {}",
            self.data.len()
        );
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn pubkey(&mut self) -> Result<Pubkey> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    /// Borsh `Option<T>`: a `0`/`1` tag followed by the value.
    pub fn option<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        match self.u8()? {
            0 => Ok(None),
            1 => read(self).map(Some),
            tag => bail!("invalid option tag {tag}"),
        }
    }
}

/// Decoded `LotteryConfig` account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryConfigAccount {
    pub admin: Pubkey,
    pub operator: Pubkey,
    pub coordinator_program: Pubkey,
    pub coordinator_config: Pubkey,
    pub subscription_id: u64,
    pub subscription: Pubkey,
    pub price_feed: Pubkey,
    pub entrance_fee_usd_cents: u64,
    pub max_price_age_secs: u64,
    pub callback_compute_limit: u32,
}

impl LotteryConfigAccount {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        r.expect_discriminator(&discriminator("account", "LotteryConfig"), "LotteryConfig")?;
        Ok(Self {
            admin: r.pubkey()?,
            operator: r.pubkey()?,
            coordinator_program: r.pubkey()?,
            coordinator_config: r.pubkey()?,
            subscription_id: r.u64()?,
            subscription: r.pubkey()?,
            price_feed: r.pubkey()?,
            entrance_fee_usd_cents: r.u64()?,
            max_price_age_secs: r.u64()?,
            callback_compute_limit: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Closed,
    Open,
    Calculating,
}

impl RoundState {
    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Closed,
            1 => Self::Open,
            2 => Self::Calculating,
            other => bail!("unknown round state {other}"),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Calculating => "calculating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    pub player: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u64,
    pub issued_at_round: u64,
    pub request_slot: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPayout {
    pub round_id: u64,
    pub winner: Pubkey,
    pub amount: u64,
}

/// Decoded `LotteryRound` account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryRoundAccount {
    pub round_id: u64,
    pub state: RoundState,
    pub entrants: Vec<EntryRecord>,
    pub pooled_balance: u64,
    pub opened_at: i64,
    pub pending_request: Option<PendingRequest>,
    pub recent_winner: Option<Pubkey>,
    pub pending_payout: Option<PendingPayout>,
}

impl LotteryRoundAccount {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        r.expect_discriminator(&discriminator("account", "LotteryRound"), "LotteryRound")?;

        let round_id = r.u64()?;
        let state = RoundState::from_tag(r.u8()?)?;
        let count = r.u32()? as usize;
        ensure!(count <= 1_000, "implausible entrant count {count}");
        let mut entrants = Vec::with_capacity(count);
        for _ in 0..count {
            entrants.push(EntryRecord {
                player: r.pubkey()?,
                amount: r.u64()?,
            });
        }

        Ok(Self {
            round_id,
            state,
            entrants,
            pooled_balance: r.u64()?,
            opened_at: r.i64()?,
            pending_request: r.option(|r| {
                Ok(PendingRequest {
                    request_id: r.u64()?,
                    issued_at_round: r.u64()?,
                    request_slot: r.u64()?,
                })
            })?,
            recent_winner: r.option(|r| r.pubkey())?,
            pending_payout: r.option(|r| {
                Ok(PendingPayout {
                    round_id: r.u64()?,
                    winner: r.pubkey()?,
                    amount: r.u64()?,
                })
            })?,
        })
    }
}

/// Read the id the coordinator will assign to its next request.
pub fn decode_request_counter(data: &[u8]) -> Result<u64> {
    let mut r = Reader::new(data);
    r.expect_discriminator(
        &discriminator("account", "CoordinatorConfig"),
        "CoordinatorConfig",
    )?;
    let end = REQUEST_COUNTER_OFFSET + 8;
    ensure!(data.len() >= end, "CoordinatorConfig data too short");
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[REQUEST_COUNTER_OFFSET..end]);
    Ok(u64::from_le_bytes(bytes))
}

pub async fn fetch_config(rpc: &RpcClient, program_id: &Pubkey) -> Result<LotteryConfigAccount> {
    let address = config_address(program_id);
    let data = rpc
        .get_account_data(&address)
        .await
        .with_context(|| format!("failed to fetch lottery config {address}"))?;
    LotteryConfigAccount::decode(&data)
}

pub async fn fetch_round(rpc: &RpcClient, program_id: &Pubkey) -> Result<LotteryRoundAccount> {
    let address = round_address(program_id);
    let data = rpc
        .get_account_data(&address)
        .await
        .with_context(|| format!("failed to fetch lottery round {address}"))?;
    LotteryRoundAccount::decode(&data)
}

pub async fn fetch_request_counter(rpc: &RpcClient, coordinator_config: &Pubkey) -> Result<u64> {
    let data = rpc
        .get_account_data(coordinator_config)
        .await
        .with_context(|| format!("failed to fetch coordinator config {coordinator_config}"))?;
    decode_request_counter(&data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    /// Borsh encoding of a `LotteryRound` as the program writes it.
    pub(crate) fn encode_round(round: &LotteryRoundAccount) -> Vec<u8> {
        let mut data = discriminator("account", "LotteryRound").to_vec();
        data.extend_from_slice(&round.round_id.to_le_bytes());
        data.push(match round.state {
            RoundState::Closed => 0,
            RoundState::Open => 1,
            RoundState::Calculating => 2,
        });
        data.extend_from_slice(&(round.entrants.len() as u32).to_le_bytes());
        for entry in &round.entrants {
            data.extend_from_slice(entry.player.as_ref());
            data.extend_from_slice(&entry.amount.to_le_bytes());
        }
        data.extend_from_slice(&round.pooled_balance.to_le_bytes());
        data.extend_from_slice(&round.opened_at.to_le_bytes());
        match round.pending_request {
            Some(req) => {
                data.push(1);
                data.extend_from_slice(&req.request_id.to_le_bytes());
                data.extend_from_slice(&req.issued_at_round.to_le_bytes());
                data.extend_from_slice(&req.request_slot.to_le_bytes());
            }
            None => data.push(0),
        }
        match round.recent_winner {
            Some(winner) => {
                data.push(1);
                data.extend_from_slice(winner.as_ref());
            }
            None => data.push(0),
        }
        match round.pending_payout {
            Some(payout) => {
                data.push(1);
                data.extend_from_slice(&payout.round_id.to_le_bytes());
                data.extend_from_slice(payout.winner.as_ref());
                data.extend_from_slice(&payout.amount.to_le_bytes());
            }
            None => data.push(0),
        }
        data.push(254); // bump
        data
    }

    pub(crate) fn open_round(entrants: usize, opened_at: i64) -> LotteryRoundAccount {
        LotteryRoundAccount {
            round_id: 3,
            state: RoundState::Open,
            entrants: (0..entrants)
                .map(|i| EntryRecord {
                    player: key(i as u8 + 1),
                    amount: 25_000_000,
                })
                .collect(),
            pooled_balance: 25_000_000 * entrants as u64,
            opened_at,
            pending_request: None,
            recent_winner: None,
            pending_payout: None,
        }
    }

    #[test]
    fn decodes_open_round() {
        let round = open_round(3, 1_700_000_000);
        assert_eq!(LotteryRoundAccount::decode(&encode_round(&round)).unwrap(), round);
    }

    #[test]
    fn decodes_settled_round_with_options() {
        let round = LotteryRoundAccount {
            round_id: 9,
            state: RoundState::Closed,
            entrants: vec![],
            pooled_balance: 0,
            opened_at: 5,
            pending_request: None,
            recent_winner: Some(key(7)),
            pending_payout: Some(PendingPayout {
                round_id: 9,
                winner: key(7),
                amount: 75_000_000,
            }),
        };
        assert_eq!(LotteryRoundAccount::decode(&encode_round(&round)).unwrap(), round);

        let calculating = LotteryRoundAccount {
            state: RoundState::Calculating,
            pending_request: Some(PendingRequest {
                request_id: 41,
                issued_at_round: 3,
                request_slot: 900,
            }),
            ..open_round(2, 10)
        };
        assert_eq!(
            LotteryRoundAccount::decode(&encode_round(&calculating)).unwrap(),
            calculating
        );
    }

    #[test]
    fn rejects_wrong_discriminator_and_truncation() {
        let mut data = encode_round(&open_round(1, 0));
        assert!(LotteryRoundAccount::decode(&data[..data.len() - 20]).is_err());
        data[0] ^= 1;
        assert!(LotteryRoundAccount::decode(&data).is_err());
    }

    #[test]
    fn decodes_config() {
        let mut data = discriminator("account", "LotteryConfig").to_vec();
        for byte in 1..=4u8 {
            data.extend_from_slice(key(byte).as_ref());
        }
        data.extend_from_slice(&7u64.to_le_bytes());
        data.extend_from_slice(key(5).as_ref());
        data.extend_from_slice(key(6).as_ref());
        data.extend_from_slice(&5_000u64.to_le_bytes());
        data.extend_from_slice(&60u64.to_le_bytes());
        data.extend_from_slice(&200_000u32.to_le_bytes());
        data.push(255);

        let config = LotteryConfigAccount::decode(&data).unwrap();
        assert_eq!(config.operator, key(2));
        assert_eq!(config.coordinator_config, key(4));
        assert_eq!(config.subscription_id, 7);
        assert_eq!(config.price_feed, key(6));
        assert_eq!(config.entrance_fee_usd_cents, 5_000);
        assert_eq!(config.callback_compute_limit, 200_000);
    }

    #[test]
    fn reads_coordinator_request_counter() {
        let mut data = discriminator("account", "CoordinatorConfig").to_vec();
        data.extend_from_slice(key(1).as_ref());
        data.extend_from_slice(key(2).as_ref());
        data.extend_from_slice(&1_000u64.to_le_bytes());
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(&77u64.to_le_bytes());
        data.extend_from_slice(&1u64.to_le_bytes());
        data.push(253);

        assert_eq!(decode_request_counter(&data).unwrap(), 77);
        assert!(decode_request_counter(&data[..90]).is_err());
    }

    #[test]
    fn invalid_option_tag_is_an_error() {
        let mut r = Reader::new(&[2, 0, 0]);
        assert!(r.option(|r| r.u8()).is_err());
    }
}
