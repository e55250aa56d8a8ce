//! Price reference adapter: reads the SOL/USD feed and converts the USD
//! entrance fee into lamports.

use anchor_lang::prelude::*;

use crate::coordinator::account_discriminator;
use crate::errors::LotteryError;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
const CENTS_PER_USD: u64 = 100;
/// Largest feed precision accepted; keeps `10^decimals` well inside `u128`.
const MAX_FEED_DECIMALS: u8 = 18;

/// Latest-answer record of an aggregator-style price feed.
///
/// Account layout: discriminator `sha256("account:PriceFeed")[..8]` followed
/// by the Borsh encoding of this struct.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceFeedAnswer {
    /// Number of decimal places in `answer` (8 for SOL/USD).
    pub decimals: u8,
    /// Fixed-point USD price of one SOL.
    pub answer: i64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

/// A validated, strictly positive price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Price {
    pub value: u64,
    pub decimals: u8,
}

impl PriceFeedAnswer {
    pub fn decode(data: &[u8]) -> Result<Self> {
        require!(data.len() >= 8, LotteryError::InvalidPriceFeed);
        require!(
            data[..8] == account_discriminator("PriceFeed"),
            LotteryError::InvalidPriceFeed
        );
        let answer = Self::deserialize(&mut &data[8..])
            .map_err(|_| error!(LotteryError::InvalidPriceFeed))?;
        require!(
            answer.decimals <= MAX_FEED_DECIMALS,
            LotteryError::InvalidPriceFeed
        );
        Ok(answer)
    }

    /// Reject zero, negative and stale answers.
    pub fn validate(&self, now: i64, max_age_secs: u64) -> Result<Price> {
        require!(self.answer > 0, LotteryError::OracleUnavailable);
        require!(self.updated_at > 0, LotteryError::OracleUnavailable);

        let age = now.saturating_sub(self.updated_at);
        require!(
            age <= i64::try_from(max_age_secs).unwrap_or(i64::MAX),
            LotteryError::OracleUnavailable
        );

        Ok(Price {
            value: self.answer as u64,
            decimals: self.decimals,
        })
    }
}

/// Read the current price from the feed account.
pub fn current_price(feed: &AccountInfo, now: i64, max_age_secs: u64) -> Result<Price> {
    let data = feed.try_borrow_data()?;
    let answer = PriceFeedAnswer::decode(&data)?;
    answer.validate(now, max_age_secs)
}

/// Lamports equivalent to `usd_cents` at `price`, rounded up so that paying
/// the returned amount is never worth less than the USD target.
///
/// ```text
/// fee = ceil(usd_cents * 10^decimals * LAMPORTS_PER_SOL / (100 * price))
/// ```
pub fn entrance_fee_lamports(usd_cents: u64, price: Price) -> Result<u64> {
    require!(usd_cents > 0, LotteryError::InvalidEntranceFee);
    require!(price.value > 0, LotteryError::OracleUnavailable);

    let numerator = (usd_cents as u128)
        .checked_mul(10u128.pow(price.decimals as u32))
        .ok_or(LotteryError::MathOverflow)?
        .checked_mul(LAMPORTS_PER_SOL as u128)
        .ok_or(LotteryError::MathOverflow)?;
    let denominator = (CENTS_PER_USD as u128)
        .checked_mul(price.value as u128)
        .ok_or(LotteryError::MathOverflow)?;

    let fee = numerator.div_ceil(denominator);
    u64::try_from(fee).map_err(|_| LotteryError::MathOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_AT_2000: Price = Price {
        value: 200_000_000_000,
        decimals: 8,
    };

    fn encoded(answer: PriceFeedAnswer) -> Vec<u8> {
        let mut data = account_discriminator("PriceFeed").to_vec();
        answer.serialize(&mut data).unwrap();
        data
    }

    #[test]
    fn fifty_dollars_at_two_thousand() {
        // $50 at $2000/SOL = 0.025 SOL
        assert_eq!(entrance_fee_lamports(5_000, SOL_AT_2000).unwrap(), 25_000_000);
    }

    #[test]
    fn fee_rounds_up() {
        let three_dollars = Price {
            value: 300_000_000,
            decimals: 8,
        };
        // $1 at $3/SOL = 0.333.. SOL
        assert_eq!(entrance_fee_lamports(100, three_dollars).unwrap(), 333_333_334);
    }

    #[test]
    fn fee_covers_target_across_prices() {
        for raw in [3u64, 7, 99_999_999, 150_12345678, 2_000_00000000, 987_654_321_000] {
            let price = Price { value: raw, decimals: 8 };
            let fee = entrance_fee_lamports(5_000, price).unwrap() as u128;
            // fee * price >= usd target, and one lamport less falls short
            let target = 5_000u128 * 10u128.pow(8) * LAMPORTS_PER_SOL as u128;
            assert!(fee * 100 * raw as u128 >= target);
            assert!((fee - 1) * 100 * (raw as u128) < target);
        }
    }

    #[test]
    fn fee_respects_feed_precision() {
        let six_decimals = Price {
            value: 2_000_000_000,
            decimals: 6,
        };
        assert_eq!(entrance_fee_lamports(5_000, six_decimals).unwrap(), 25_000_000);
    }

    #[test]
    fn zero_usd_fee_is_rejected() {
        assert_eq!(
            entrance_fee_lamports(0, SOL_AT_2000).unwrap_err(),
            anchor_lang::error::Error::from(LotteryError::InvalidEntranceFee)
        );
    }

    #[test]
    fn tiny_price_overflows_u64() {
        let dust = Price { value: 1, decimals: 18 };
        assert_eq!(
            entrance_fee_lamports(u64::MAX, dust).unwrap_err(),
            anchor_lang::error::Error::from(LotteryError::MathOverflow)
        );
    }

    #[test]
    fn decodes_feed_account() {
        let answer = PriceFeedAnswer {
            decimals: 8,
            answer: 150_00000000,
            updated_at: 1_700_000_000,
        };
        assert_eq!(PriceFeedAnswer::decode(&encoded(answer)).unwrap(), answer);
    }

    #[test]
    fn rejects_foreign_or_short_accounts() {
        let answer = PriceFeedAnswer {
            decimals: 8,
            answer: 1,
            updated_at: 1,
        };
        let mut wrong = encoded(answer);
        wrong[0] ^= 0xff;
        let invalid = anchor_lang::error::Error::from(LotteryError::InvalidPriceFeed);

        assert_eq!(PriceFeedAnswer::decode(&wrong).unwrap_err(), invalid);
        assert_eq!(PriceFeedAnswer::decode(&[0u8; 4]).unwrap_err(), invalid);
        assert_eq!(
            PriceFeedAnswer::decode(&encoded(answer)[..12]).unwrap_err(),
            invalid
        );
        let too_precise = PriceFeedAnswer {
            decimals: 19,
            ..answer
        };
        assert_eq!(PriceFeedAnswer::decode(&encoded(too_precise)).unwrap_err(), invalid);
    }

    #[test]
    fn zero_negative_and_stale_answers_are_unavailable() {
        let now = 1_700_000_600;
        let unavailable = anchor_lang::error::Error::from(LotteryError::OracleUnavailable);
        let fresh = PriceFeedAnswer {
            decimals: 8,
            answer: 150_00000000,
            updated_at: now - 60,
        };

        assert_eq!(
            fresh.validate(now, 60).unwrap(),
            Price {
                value: 150_00000000,
                decimals: 8
            }
        );
        assert_eq!(fresh.validate(now, 59).unwrap_err(), unavailable);

        for answer in [0i64, -5] {
            let bad = PriceFeedAnswer { answer, ..fresh };
            assert_eq!(bad.validate(now, 3_600).unwrap_err(), unavailable);
        }
        let never_updated = PriceFeedAnswer {
            updated_at: 0,
            ..fresh
        };
        assert_eq!(never_updated.validate(now, u64::MAX).unwrap_err(), unavailable);
    }
}
