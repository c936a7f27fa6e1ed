//! The user-facing asset flows: deposit, mint, withdraw, redeem, and
//! share transfers.
//!
//! Every flow validates against current state, then mutates internal
//! ledgers, then interacts with the provider, in that order wherever the
//! flow allows. Share amounts are always computed from the exchange rate
//! *before* the provider call moves assets, so the rate a user is quoted
//! is the rate they get.
//!
//! Withdrawal requests are clamped, never rejected: asking for more than
//! the owner holds (including the `u128::MAX` "everything" sentinel)
//! resolves to the owner's full redeemable value. The clamped amount is
//! what a third-party operator's allowance is charged.

use crate::config::PRECISION;
use crate::crypto::Address;
use crate::events::VaultEvent;
use crate::math::{mul_div, Rounding};
use crate::pause::ActionKind;
use crate::provider::ProviderAction;

use super::{StrataVault, VaultError};

/// What a withdrawal actually did, after clamping and fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawOutcome {
    /// Gross asset value withdrawn, post-clamp, pre-fee.
    pub assets: u128,
    /// Shares burned.
    pub shares: u128,
    /// Fee sent to the treasury.
    pub fee: u128,
    /// Net assets delivered to the receiver.
    pub paid_out: u128,
}

impl StrataVault {
    /// Deposits `assets` pulled from `caller`, minting shares to
    /// `receiver`. Returns the shares minted.
    pub fn deposit(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
    ) -> Result<u128, VaultError> {
        self.enter()?;
        let result = self.deposit_inner(caller, assets, receiver);
        self.exit();
        result
    }

    fn deposit_inner(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
    ) -> Result<u128, VaultError> {
        self.gate.ensure_active(ActionKind::Deposit)?;
        if !self.initialized {
            return Err(VaultError::NotInitialized);
        }
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        let shares = self.preview_deposit(assets)?;
        if assets == 0 || shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if assets < self.config.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                minimum: self.config.min_deposit,
                requested: assets,
            });
        }
        let capacity = self.max_deposit(receiver)?;
        if assets > capacity {
            return Err(VaultError::ExceedsMaxDeposit {
                capacity,
                requested: assets,
            });
        }
        self.execute_deposit(caller, receiver, assets, shares)?;
        Ok(shares)
    }

    /// Mints exactly `shares` to `receiver`, pulling the required assets
    /// (rounded up) from `caller`. Returns the assets charged.
    pub fn mint(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
    ) -> Result<u128, VaultError> {
        self.enter()?;
        let result = self.mint_inner(caller, shares, receiver);
        self.exit();
        result
    }

    fn mint_inner(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
    ) -> Result<u128, VaultError> {
        self.gate.ensure_active(ActionKind::Deposit)?;
        if !self.initialized {
            return Err(VaultError::NotInitialized);
        }
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        let assets = self.preview_mint(shares)?;
        if shares == 0 || assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if assets < self.config.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                minimum: self.config.min_deposit,
                requested: assets,
            });
        }
        let share_capacity = self.max_mint(receiver)?;
        if shares > share_capacity {
            return Err(VaultError::ExceedsMaxMint {
                capacity: share_capacity,
                requested: shares,
            });
        }
        // preview_mint rounds up, so the asset charge can exceed the asset
        // capacity even when the share amount fits.
        let capacity = self.max_deposit(receiver)?;
        if assets > capacity {
            return Err(VaultError::ExceedsMaxDeposit {
                capacity,
                requested: assets,
            });
        }
        self.execute_deposit(caller, receiver, assets, shares)?;
        Ok(assets)
    }

    /// Pulls `assets` from `from` and places them with the active
    /// provider. On provider failure the pulled assets are handed back, so
    /// the operation never partially applies.
    pub(super) fn pull_and_place(&mut self, from: &Address, assets: u128) -> Result<(), VaultError> {
        let active = self.require_active()?;
        self.book.transfer(from, &self.address, assets)?;
        if let Err(err) = self.registry.invoke(
            ProviderAction::Deposit,
            assets,
            &active,
            &self.address,
            &mut self.book,
        ) {
            self.book.transfer(&self.address, from, assets)?;
            return Err(err.into());
        }
        Ok(())
    }

    fn execute_deposit(
        &mut self,
        caller: &Address,
        receiver: &Address,
        assets: u128,
        shares: u128,
    ) -> Result<(), VaultError> {
        self.pull_and_place(caller, assets)?;
        self.shares.mint(receiver, shares)?;
        tracing::info!(caller = %caller, receiver = %receiver, assets, shares, "deposit");
        self.events.push(VaultEvent::Deposited {
            caller: *caller,
            receiver: *receiver,
            assets,
            shares,
        });
        Ok(())
    }

    /// Withdraws up to `assets` of `owner`'s position to `receiver`. A
    /// request at or above the owner's redeemable value (including the
    /// `u128::MAX` sentinel) is clamped to all of it. When `caller` is not
    /// `owner`, the caller's withdraw allowance for the
    /// `(owner, caller, receiver)` triple is charged the clamped amount.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<WithdrawOutcome, VaultError> {
        self.enter()?;
        let result = self.withdraw_inner(caller, assets, receiver, owner);
        self.exit();
        result
    }

    fn withdraw_inner(
        &mut self,
        caller: &Address,
        assets: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<WithdrawOutcome, VaultError> {
        self.gate.ensure_active(ActionKind::Withdraw)?;
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        if owner.is_zero() {
            return Err(VaultError::ZeroAddress("owner"));
        }
        let balance = self.shares.balance_of(owner);
        let available = self.to_assets(balance, Rounding::Down)?;
        let (assets, shares) = if assets >= available {
            (available, balance)
        } else {
            (assets, self.preview_withdraw(assets)?)
        };
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.execute_withdrawal(caller, owner, receiver, assets, shares)
    }

    /// Redeems up to `shares` of `owner`'s shares for assets to
    /// `receiver`. Clamping and allowance rules mirror [`withdraw`].
    ///
    /// [`withdraw`]: StrataVault::withdraw
    pub fn redeem(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<WithdrawOutcome, VaultError> {
        self.enter()?;
        let result = self.redeem_inner(caller, shares, receiver, owner);
        self.exit();
        result
    }

    fn redeem_inner(
        &mut self,
        caller: &Address,
        shares: u128,
        receiver: &Address,
        owner: &Address,
    ) -> Result<WithdrawOutcome, VaultError> {
        self.gate.ensure_active(ActionKind::Withdraw)?;
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        if owner.is_zero() {
            return Err(VaultError::ZeroAddress("owner"));
        }
        let shares = shares.min(self.shares.balance_of(owner));
        let assets = self.preview_redeem(shares)?;
        if shares == 0 || assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.execute_withdrawal(caller, owner, receiver, assets, shares)
    }

    fn execute_withdrawal(
        &mut self,
        caller: &Address,
        owner: &Address,
        receiver: &Address,
        assets: u128,
        shares: u128,
    ) -> Result<WithdrawOutcome, VaultError> {
        // Fallible checks before the provider call, commits after it, so a
        // provider failure leaves every ledger untouched.
        if caller != owner {
            let granted = self.permits.withdraw_allowance(owner, caller, receiver);
            if granted < assets {
                return Err(crate::permit::PermitError::InsufficientAllowance {
                    granted,
                    requested: assets,
                }
                .into());
            }
        }
        let active = self.require_active()?;
        self.registry
            .invoke(ProviderAction::Withdraw, assets, &active, &self.address, &mut self.book)?;
        if caller != owner {
            self.permits
                .spend_withdraw_allowance(owner, caller, receiver, assets)?;
        }
        self.shares.burn(owner, shares)?;
        let fee = mul_div(assets, self.config.withdraw_fee, PRECISION, Rounding::Down)?;
        if fee > 0 {
            let treasury = self.config.treasury;
            self.book.transfer(&self.address, &treasury, fee)?;
        }
        let paid_out = assets - fee;
        self.book.transfer(&self.address, receiver, paid_out)?;
        tracing::info!(
            caller = %caller, owner = %owner, receiver = %receiver,
            assets, shares, fee, "withdrawal"
        );
        self.events.push(VaultEvent::Withdrawn {
            caller: *caller,
            owner: *owner,
            receiver: *receiver,
            assets,
            shares,
            fee,
        });
        Ok(WithdrawOutcome {
            assets,
            shares,
            fee,
            paid_out,
        })
    }

    /// Moves shares from `owner` (the authenticated caller) to `to`.
    pub fn transfer_shares(
        &mut self,
        owner: &Address,
        to: &Address,
        shares: u128,
    ) -> Result<(), VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress("to"));
        }
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.shares.transfer(owner, to, shares)?;
        self.events.push(VaultEvent::SharesTransferred {
            caller: *owner,
            owner: *owner,
            to: *to,
            shares,
        });
        Ok(())
    }

    /// Moves `value` worth of `owner`'s shares to `to`, charging
    /// `spender`'s asset-denominated transfer allowance. The share amount
    /// is fixed at the current rate, rounding down. Returns the shares
    /// moved.
    pub fn transfer_shares_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        value: u128,
    ) -> Result<u128, VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress("to"));
        }
        let shares = self.to_shares(value, Rounding::Down)?;
        if value == 0 || shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.permits.spend_transfer_allowance(owner, spender, value)?;
        self.shares.transfer(owner, to, shares)?;
        self.events.push(VaultEvent::SharesTransferred {
            caller: *spender,
            owner: *owner,
            to: *to,
            shares,
        });
        Ok(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::{FULL_BALANCE, PRECISION};
    use crate::crypto::StrataKeypair;
    use crate::ledger::assets::AssetError;
    use crate::pause::PauseError;
    use crate::permit::{PermitError, WithdrawPermit};

    fn user() -> Address {
        Address::derive("user")
    }

    #[test]
    fn deposit_mints_par_shares_into_seeded_vault() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 1_000 * UNIT);
        let shares = vault.deposit(&user(), 1_000 * UNIT, &user()).unwrap();
        assert_eq!(shares, 1_000 * UNIT);
        assert_eq!(vault.balance_of(&user()), 1_000 * UNIT);
        assert_eq!(vault.total_assets(), 1_000 * UNIT + SEED);
        assert_eq!(vault.convert_to_assets(vault.balance_of(&user())).unwrap(), 1_000 * UNIT);
        // The user's spendable assets are gone.
        assert_eq!(vault.asset_book().balance_of(&user()), 0);
    }

    #[test]
    fn deposit_requires_seeding_and_active_gate() {
        let mut vault = fresh_vault();
        fund(&mut vault, &user(), 10 * UNIT);
        // Fresh vault: paused beats unseeded.
        assert!(matches!(
            vault.deposit(&user(), 10 * UNIT, &user()),
            Err(VaultError::Pause(PauseError::ActionPaused(_)))
        ));
        vault.unpause_all(&operator()).unwrap();
        assert!(matches!(
            vault.deposit(&user(), 10 * UNIT, &user()),
            Err(VaultError::NotInitialized)
        ));
    }

    #[test]
    fn deposit_enforces_minimum_and_limits() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 200_000 * UNIT);
        assert!(matches!(
            vault.deposit(&user(), SEED - 1, &user()),
            Err(VaultError::BelowMinimumDeposit { .. })
        ));
        let over_user_limit = vault.config().user_deposit_limit + 1;
        assert!(matches!(
            vault.deposit(&user(), over_user_limit, &user()),
            Err(VaultError::ExceedsMaxDeposit { .. })
        ));
        // Right at the limit is fine.
        let at_limit = vault.config().user_deposit_limit;
        vault.deposit(&user(), at_limit, &user()).unwrap();
        // And the same user now has zero headroom.
        assert_eq!(vault.max_deposit(&user()).unwrap(), 0);
    }

    #[test]
    fn deposit_to_zero_receiver_rejected() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 10 * UNIT);
        assert!(matches!(
            vault.deposit(&user(), 10 * UNIT, &Address::ZERO),
            Err(VaultError::ZeroAddress("receiver"))
        ));
    }

    #[test]
    fn failed_provider_deposit_refunds_and_mints_nothing() {
        let (mut vault, switch) = seeded_vault_with_switch();
        fund(&mut vault, &user(), 10 * UNIT);
        switch.store(true, std::sync::atomic::Ordering::Relaxed);
        let supply_before = vault.total_supply();
        assert!(matches!(
            vault.deposit(&user(), 10 * UNIT, &user()),
            Err(VaultError::Provider(_))
        ));
        assert_eq!(vault.total_supply(), supply_before);
        assert_eq!(vault.balance_of(&user()), 0);
        // The pulled assets came back.
        assert_eq!(vault.asset_book().balance_of(&user()), 10 * UNIT);
    }

    #[test]
    fn mint_charges_rounded_up_assets() {
        let mut vault = seeded_vault();
        vault.donate_yield("paper-a", 500_000).unwrap();
        // Price is now 1.5 assets per share.
        fund(&mut vault, &user(), 10 * UNIT);
        let assets = vault.mint(&user(), 2 * UNIT, &user()).unwrap();
        assert_eq!(assets, 3 * UNIT);
        assert_eq!(vault.balance_of(&user()), 2 * UNIT);
    }

    #[test]
    fn withdraw_takes_fee_to_treasury() {
        let mut vault = seeded_vault();
        // 0.1% fee.
        vault.set_withdraw_fee(&operator(), PRECISION / 1_000).unwrap();
        fund(&mut vault, &user(), 1_000 * UNIT);
        vault.deposit(&user(), 1_000 * UNIT, &user()).unwrap();

        let outcome = vault.withdraw(&user(), 1_000 * UNIT, &user(), &user()).unwrap();
        assert_eq!(outcome.assets, 1_000 * UNIT);
        assert_eq!(outcome.fee, UNIT);
        assert_eq!(outcome.paid_out, 999 * UNIT);
        assert_eq!(vault.asset_book().balance_of(&treasury()), UNIT);
        assert_eq!(vault.asset_book().balance_of(&user()), 999 * UNIT);
        assert_eq!(vault.balance_of(&user()), 0);
        // The seed is all that remains.
        assert_eq!(vault.total_assets(), SEED);
    }

    #[test]
    fn over_withdraw_clamps_to_full_position() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 100 * UNIT);
        vault.deposit(&user(), 100 * UNIT, &user()).unwrap();

        let outcome = vault
            .withdraw(&user(), 5_000 * UNIT, &user(), &user())
            .unwrap();
        assert_eq!(outcome.assets, 100 * UNIT);
        assert_eq!(outcome.shares, 100 * UNIT);
        assert_eq!(vault.balance_of(&user()), 0);
    }

    #[test]
    fn sentinel_withdraws_everything() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 100 * UNIT);
        vault.deposit(&user(), 100 * UNIT, &user()).unwrap();
        vault.donate_yield("paper-a", 50 * UNIT).unwrap();

        let outcome = vault
            .withdraw(&user(), FULL_BALANCE, &user(), &user())
            .unwrap();
        // The position appreciated; the clamp resolves to its full current
        // value, not the deposited amount.
        assert!(outcome.assets > 100 * UNIT);
        assert_eq!(outcome.shares, 100 * UNIT);
        assert_eq!(vault.balance_of(&user()), 0);
    }

    #[test]
    fn redeem_clamps_shares_and_pays_rounded_down() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 100 * UNIT);
        vault.deposit(&user(), 100 * UNIT, &user()).unwrap();

        let outcome = vault
            .redeem(&user(), FULL_BALANCE, &user(), &user())
            .unwrap();
        assert_eq!(outcome.shares, 100 * UNIT);
        assert_eq!(outcome.assets, 100 * UNIT);
        assert_eq!(vault.balance_of(&user()), 0);
    }

    #[test]
    fn withdraw_of_empty_position_is_zero_amount() {
        let mut vault = seeded_vault();
        assert!(matches!(
            vault.withdraw(&user(), FULL_BALANCE, &user(), &user()),
            Err(VaultError::ZeroAmount)
        ));
    }

    #[test]
    fn paused_withdraw_rejected() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 10 * UNIT);
        vault.deposit(&user(), 10 * UNIT, &user()).unwrap();
        vault.pause(&operator(), ActionKind::Withdraw).unwrap();
        assert!(matches!(
            vault.withdraw(&user(), UNIT, &user(), &user()),
            Err(VaultError::Pause(PauseError::ActionPaused(_)))
        ));
        // Deposits still flow.
        fund(&mut vault, &user(), 10 * UNIT);
        vault.deposit(&user(), 10 * UNIT, &user()).unwrap();
    }

    #[test]
    fn operator_withdraw_requires_and_charges_allowance() {
        let mut vault = seeded_vault();
        let keypair = StrataKeypair::generate();
        let owner = keypair.address();
        let operator_acct = Address::derive("acct-operator");
        let receiver = Address::derive("acct-receiver");
        fund(&mut vault, &owner, 100 * UNIT);
        vault.deposit(&owner, 100 * UNIT, &owner).unwrap();

        // No allowance yet.
        assert!(matches!(
            vault.withdraw(&operator_acct, 10 * UNIT, &receiver, &owner),
            Err(VaultError::Permit(PermitError::InsufficientAllowance { .. }))
        ));

        let permit = WithdrawPermit {
            owner,
            operator: operator_acct,
            receiver,
            amount: 30 * UNIT,
            nonce: 0,
            deadline: u64::MAX,
            action_args_hash: [0u8; 32],
        };
        let signature = keypair.sign(&permit.digest(vault.address()));
        vault.apply_withdraw_permit(&permit, &signature).unwrap();

        let outcome = vault
            .withdraw(&operator_acct, 10 * UNIT, &receiver, &owner)
            .unwrap();
        assert_eq!(outcome.paid_out, 10 * UNIT);
        assert_eq!(vault.asset_book().balance_of(&receiver), 10 * UNIT);
        assert_eq!(
            vault.withdraw_allowance(&owner, &operator_acct, &receiver),
            20 * UNIT
        );

        // The allowance is scoped to the receiver it was granted for.
        let elsewhere = Address::derive("elsewhere");
        assert!(matches!(
            vault.withdraw(&operator_acct, UNIT, &elsewhere, &owner),
            Err(VaultError::Permit(PermitError::InsufficientAllowance { .. }))
        ));
    }

    #[test]
    fn operator_allowance_charged_the_clamped_amount() {
        let mut vault = seeded_vault();
        let owner = Address::derive("owner");
        let operator_acct = Address::derive("op");
        fund(&mut vault, &owner, 10 * UNIT);
        vault.deposit(&owner, 10 * UNIT, &owner).unwrap();
        vault
            .increase_withdraw_allowance(&owner, &operator_acct, &owner, 1_000 * UNIT)
            .unwrap();

        // Requests far more than the position holds; only the clamped
        // value is charged.
        vault
            .withdraw(&operator_acct, 1_000 * UNIT, &owner, &owner)
            .unwrap();
        assert_eq!(
            vault.withdraw_allowance(&owner, &operator_acct, &owner),
            990 * UNIT
        );
    }

    #[test]
    fn failed_provider_withdraw_leaves_shares_intact() {
        let (mut vault, switch) = seeded_vault_with_switch();
        fund(&mut vault, &user(), 10 * UNIT);
        vault.deposit(&user(), 10 * UNIT, &user()).unwrap();

        switch.store(true, std::sync::atomic::Ordering::Relaxed);
        let result = vault.withdraw(&user(), UNIT, &user(), &user());
        assert!(matches!(result, Err(VaultError::Provider(_))));
        assert_eq!(vault.asset_book().balance_of(&user()), 0);
        assert_eq!(vault.balance_of(&user()), 10 * UNIT);
    }

    #[test]
    fn share_transfer_moves_balances() {
        let mut vault = seeded_vault();
        let to = Address::derive("friend");
        fund(&mut vault, &user(), 10 * UNIT);
        vault.deposit(&user(), 10 * UNIT, &user()).unwrap();
        vault.transfer_shares(&user(), &to, 4 * UNIT).unwrap();
        assert_eq!(vault.balance_of(&user()), 6 * UNIT);
        assert_eq!(vault.balance_of(&to), 4 * UNIT);
    }

    #[test]
    fn transfer_from_charges_value_denominated_allowance() {
        let mut vault = seeded_vault();
        let keypair = StrataKeypair::generate();
        let owner = keypair.address();
        let spender = Address::derive("spender");
        let to = Address::derive("to");
        fund(&mut vault, &owner, 10 * UNIT);
        vault.deposit(&owner, 10 * UNIT, &owner).unwrap();

        let permit = crate::permit::TransferPermit {
            owner,
            spender,
            amount: 6 * UNIT,
            nonce: 0,
            deadline: u64::MAX,
        };
        let signature = keypair.sign(&permit.digest(vault.address()));
        vault.apply_transfer_permit(&permit, &signature).unwrap();

        let moved = vault
            .transfer_shares_from(&spender, &owner, &to, 4 * UNIT)
            .unwrap();
        assert_eq!(moved, 4 * UNIT);
        assert_eq!(vault.transfer_allowance(&owner, &spender), 2 * UNIT);
        assert!(matches!(
            vault.transfer_shares_from(&spender, &owner, &to, 4 * UNIT),
            Err(VaultError::Permit(PermitError::InsufficientAllowance { .. }))
        ));
    }

    #[test]
    fn deposit_without_funds_fails_in_the_book() {
        let mut vault = seeded_vault();
        assert!(matches!(
            vault.deposit(&user(), 10 * UNIT, &user()),
            Err(VaultError::Asset(AssetError::InsufficientBalance { .. }))
        ));
    }

    #[test]
    fn withdrawal_emits_the_full_record() {
        let mut vault = seeded_vault();
        fund(&mut vault, &user(), 10 * UNIT);
        vault.deposit(&user(), 10 * UNIT, &user()).unwrap();
        vault.take_events();
        vault.withdraw(&user(), 10 * UNIT, &user(), &user()).unwrap();
        let events = vault.take_events();
        assert_eq!(
            events,
            vec![VaultEvent::Withdrawn {
                caller: user(),
                owner: user(),
                receiver: user(),
                assets: 10 * UNIT,
                shares: 10 * UNIT,
                fee: 0,
            }]
        );
    }
}
