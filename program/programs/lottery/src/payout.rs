//! Payout executor: moves the settled prize from the round PDA to the winner.

use anchor_lang::prelude::*;

use crate::errors::LotteryError;

/// New `(vault, winner)` balances after moving `amount`, or `TransferFailed`
/// when the vault would drop below `rent_reserve`.
pub fn plan_transfer(
    vault_lamports: u64,
    winner_lamports: u64,
    rent_reserve: u64,
    amount: u64,
) -> Result<(u64, u64)> {
    let vault_after = vault_lamports
        .checked_sub(amount)
        .ok_or(LotteryError::TransferFailed)?;
    require!(vault_after >= rent_reserve, LotteryError::TransferFailed);
    let winner_after = winner_lamports
        .checked_add(amount)
        .ok_or(LotteryError::TransferFailed)?;
    Ok((vault_after, winner_after))
}

/// Whether crediting `amount` leaves the recipient rent-exempt.
///
/// The runtime rejects a transaction that leaves a funded account below the
/// minimum for its data length, so such a prize can never land directly.
pub fn prize_lands(
    recipient_lamports: u64,
    recipient_data_len: usize,
    amount: u64,
    rent: &Rent,
) -> bool {
    amount == 0
        || recipient_lamports
            .checked_add(amount)
            .is_some_and(|after| rent.is_exempt(after, recipient_data_len))
}

/// Move `amount` lamports out of the program-owned `vault`.
///
/// The vault carries account data, so the system program cannot debit it;
/// lamports are moved directly. The whole instruction reverts on failure.
pub fn transfer_prize(
    vault: &AccountInfo,
    winner: &AccountInfo,
    amount: u64,
    rent: &Rent,
) -> Result<()> {
    require!(winner.is_writable, LotteryError::TransferFailed);
    require!(!winner.executable, LotteryError::TransferFailed);
    require!(
        prize_lands(winner.lamports(), winner.data_len(), amount, rent),
        LotteryError::TransferFailed
    );

    let reserve = rent.minimum_balance(vault.data_len());
    let (vault_after, winner_after) =
        plan_transfer(vault.lamports(), winner.lamports(), reserve, amount)?;

    **vault.try_borrow_mut_lamports()? = vault_after;
    **winner.try_borrow_mut_lamports()? = winner_after;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> anchor_lang::error::Error {
        anchor_lang::error::Error::from(LotteryError::TransferFailed)
    }

    #[test]
    fn whole_pool_moves_and_rent_stays() {
        let reserve = 2_000_000;
        let pool = 75_000_000;
        let (vault, winner) = plan_transfer(reserve + pool, 10, reserve, pool).unwrap();
        assert_eq!(vault, reserve);
        assert_eq!(winner, pool + 10);
    }

    #[test]
    fn zero_prize_is_a_no_op() {
        assert_eq!(plan_transfer(5, 7, 5, 0).unwrap(), (5, 7));
    }

    #[test]
    fn cannot_dip_into_rent_reserve() {
        assert_eq!(plan_transfer(100, 0, 50, 51).unwrap_err(), failed());
        assert_eq!(plan_transfer(100, 0, 0, 101).unwrap_err(), failed());
    }

    #[test]
    fn winner_balance_overflow_fails() {
        assert_eq!(plan_transfer(10, u64::MAX, 0, 1).unwrap_err(), failed());
    }

    fn with_account<R>(
        lamports: u64,
        data_len: usize,
        writable: bool,
        executable: bool,
        f: impl FnOnce(AccountInfo) -> R,
    ) -> R {
        let key = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mut lamports = lamports;
        let mut data = vec![0u8; data_len];
        let info = AccountInfo::new(
            &key,
            false,
            writable,
            &mut lamports,
            &mut data,
            &owner,
            executable,
            0,
        );
        f(info)
    }

    #[test]
    fn transfer_moves_lamports_between_accounts() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(64);
        let wallet = rent.minimum_balance(0);
        with_account(reserve + 500, 64, true, false, |vault| {
            with_account(wallet, 0, true, false, |winner| {
                transfer_prize(&vault, &winner, 500, &rent).unwrap();
                assert_eq!(vault.lamports(), reserve);
                assert_eq!(winner.lamports(), wallet + 500);
            })
        });
    }

    #[test]
    fn small_prize_to_empty_wallet_does_not_land() {
        let rent = Rent::default();
        let floor = rent.minimum_balance(0);

        assert!(!prize_lands(0, 0, 50_000, &rent));
        assert!(!prize_lands(0, 0, floor - 1, &rent));
        assert!(prize_lands(0, 0, floor, &rent));
        assert!(prize_lands(floor, 0, 1, &rent));
        assert!(!prize_lands(floor, 100, 1, &rent));
        assert!(prize_lands(0, 0, 0, &rent));
        assert!(!prize_lands(u64::MAX, 0, 1, &rent));
    }

    #[test]
    fn undeliverable_prize_is_rejected_before_moving_lamports() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(64);
        with_account(reserve + 50_000, 64, true, false, |vault| {
            with_account(0, 0, true, false, |winner| {
                assert_eq!(
                    transfer_prize(&vault, &winner, 50_000, &rent).unwrap_err(),
                    failed()
                );
                assert_eq!(vault.lamports(), reserve + 50_000);
                assert_eq!(winner.lamports(), 0);
            })
        });
    }

    #[test]
    fn transfer_rejects_unusable_winner() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(64);
        for (writable, executable) in [(false, false), (true, true)] {
            with_account(reserve + 500, 64, true, false, |vault| {
                with_account(1, 0, writable, executable, |winner| {
                    assert_eq!(
                        transfer_prize(&vault, &winner, 500, &rent).unwrap_err(),
                        failed()
                    );
                    assert_eq!(vault.lamports(), reserve + 500);
                    assert_eq!(winner.lamports(), 1);
                })
            });
        }
    }
}
