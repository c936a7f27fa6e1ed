//! Share/asset conversion and the deposit/withdraw capacity queries.
//!
//! All conversion goes through the live exchange rate
//! `total_supply / total_assets`, with the rounding direction chosen so
//! that error always lands on the acting user:
//!
//! * `preview_deposit` and `preview_redeem` round down (fewer shares out,
//!   fewer assets out),
//! * `preview_mint` and `preview_withdraw` round up (more assets in, more
//!   shares burned).
//!
//! With zero supply the conversion is the identity in both directions,
//! which fixes the seed price at one share per asset unit.

use crate::crypto::Address;
use crate::math::{mul_div, Rounding};
use crate::pause::ActionKind;

use super::{StrataVault, VaultError};

impl StrataVault {
    /// Total assets under management: the sum of every registered
    /// provider's reported balance for the vault. Idle assets sitting at
    /// the vault address mid-operation are deliberately not counted.
    pub fn total_assets(&self) -> u128 {
        self.registry.total_balance(&self.address, &self.book)
    }

    pub(super) fn to_shares(&self, assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
        let supply = self.shares.total_supply();
        if assets == 0 || supply == 0 {
            return Ok(assets);
        }
        Ok(mul_div(assets, supply, self.total_assets(), rounding)?)
    }

    pub(super) fn to_assets(&self, shares: u128, rounding: Rounding) -> Result<u128, VaultError> {
        let supply = self.shares.total_supply();
        if shares == 0 || supply == 0 {
            return Ok(shares);
        }
        Ok(mul_div(shares, self.total_assets(), supply, rounding)?)
    }

    /// Assets valued as shares at the current rate, rounding down.
    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Down)
    }

    /// Shares valued as assets at the current rate, rounding down.
    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Down)
    }

    /// Shares minted for depositing `assets`. Rounds down.
    pub fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Down)
    }

    /// Assets required to mint `shares`. Rounds up.
    pub fn preview_mint(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Up)
    }

    /// Shares burned to withdraw `assets`. Rounds up.
    pub fn preview_withdraw(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Up)
    }

    /// Assets received for redeeming `shares`. Rounds down.
    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Down)
    }

    /// Remaining asset deposit capacity for `receiver`: the tighter of the
    /// per-user headroom (limit minus the value already held) and the
    /// vault-wide headroom. Zero while deposits are paused or the vault is
    /// unseeded.
    pub fn max_deposit(&self, receiver: &Address) -> Result<u128, VaultError> {
        if self.gate.is_paused(ActionKind::Deposit) || !self.initialized {
            return Ok(0);
        }
        let held = self.to_assets(self.shares.balance_of(receiver), Rounding::Down)?;
        let user_room = self.config.user_deposit_limit.saturating_sub(held);
        let vault_room = self
            .config
            .vault_deposit_limit
            .saturating_sub(self.total_assets());
        Ok(user_room.min(vault_room))
    }

    /// Remaining share mint capacity for `receiver`: the deposit capacity
    /// valued as shares.
    pub fn max_mint(&self, receiver: &Address) -> Result<u128, VaultError> {
        let capacity = self.max_deposit(receiver)?;
        self.to_shares(capacity, Rounding::Down)
    }

    /// The asset value of everything `owner` can withdraw right now. Zero
    /// while withdrawals are paused.
    pub fn max_withdraw(&self, owner: &Address) -> Result<u128, VaultError> {
        if self.gate.is_paused(ActionKind::Withdraw) {
            return Ok(0);
        }
        self.to_assets(self.shares.balance_of(owner), Rounding::Down)
    }

    /// The shares `owner` can redeem right now. Zero while withdrawals are
    /// paused.
    pub fn max_redeem(&self, owner: &Address) -> Result<u128, VaultError> {
        if self.gate.is_paused(ActionKind::Withdraw) {
            return Ok(0);
        }
        Ok(self.shares.balance_of(owner))
    }
}
