//! Moving pooled assets between providers.
//!
//! Rebalancing is the rebalancer capability's whole job: pull assets out
//! of one backend, pay at most a bounded fee, place the rest with another
//! backend, and optionally make the target the new active provider. Share
//! supply never changes; only the pool's location (and, through the fee,
//! its size) does.

use crate::config::{FULL_BALANCE, MAX_REBALANCE_FEE_PCT};
use crate::crypto::Address;
use crate::events::VaultEvent;
use crate::math::{mul_div, Rounding};
use crate::provider::ProviderAction;

use super::{Capability, StrataVault, VaultError};

/// What a rebalance actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceOutcome {
    /// Assets pulled out of the source provider, post-sentinel-resolution.
    pub withdrawn: u128,
    /// Assets placed with the target provider.
    pub deposited: u128,
    /// Fee sent to the treasury.
    pub fee: u128,
}

impl StrataVault {
    /// Moves `assets` from provider `from` to provider `to`, paying `fee`
    /// of it to the treasury. `u128::MAX` resolves to the source
    /// provider's entire reported balance. The fee may not exceed 20% of
    /// the moved amount. When `activate_target` is set, `to` becomes the
    /// active provider for new deposits.
    pub fn rebalance(
        &mut self,
        caller: &Address,
        assets: u128,
        from: &str,
        to: &str,
        fee: u128,
        activate_target: bool,
    ) -> Result<RebalanceOutcome, VaultError> {
        self.enter()?;
        let result = self.rebalance_inner(caller, assets, from, to, fee, activate_target);
        self.exit();
        result
    }

    fn rebalance_inner(
        &mut self,
        caller: &Address,
        assets: u128,
        from: &str,
        to: &str,
        fee: u128,
        activate_target: bool,
    ) -> Result<RebalanceOutcome, VaultError> {
        self.require_capability(caller, Capability::Rebalancer)?;
        if !self.registry.contains(from) {
            return Err(VaultError::InvalidProvider(from.to_string()));
        }
        if !self.registry.contains(to) {
            return Err(VaultError::InvalidProvider(to.to_string()));
        }
        let assets = if assets == FULL_BALANCE {
            let source = self
                .registry
                .get(from)
                .ok_or_else(|| VaultError::InvalidProvider(from.to_string()))?;
            source.deposit_balance(&self.address, &self.book)
        } else {
            assets
        };
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let max_fee = mul_div(assets, MAX_REBALANCE_FEE_PCT, 100, Rounding::Down)?;
        if fee > max_fee {
            return Err(VaultError::ExcessRebalanceFee {
                maximum: max_fee,
                requested: fee,
            });
        }
        self.registry
            .invoke(ProviderAction::Withdraw, assets, from, &self.address, &mut self.book)?;
        let deposited = assets - fee;
        if let Err(err) = self.registry.invoke(
            ProviderAction::Deposit,
            deposited,
            to,
            &self.address,
            &mut self.book,
        ) {
            // The target refused the deposit. Put everything back with the
            // source so the failed move leaves total_assets unchanged.
            self.registry
                .invoke(ProviderAction::Deposit, assets, from, &self.address, &mut self.book)?;
            return Err(err.into());
        }
        if fee > 0 {
            let treasury = self.config.treasury;
            self.book.transfer(&self.address, &treasury, fee)?;
        }
        if activate_target {
            self.registry.set_active(to);
            self.events.push(VaultEvent::ActiveProviderChanged {
                by: *caller,
                provider: to.to_string(),
            });
        }
        tracing::info!(
            by = %caller, from, to, withdrawn = assets, deposited, fee,
            "rebalanced"
        );
        self.events.push(VaultEvent::Rebalanced {
            by: *caller,
            from: from.to_string(),
            to: to.to_string(),
            assets_withdrawn: assets,
            assets_deposited: deposited,
        });
        Ok(RebalanceOutcome {
            withdrawn: assets,
            deposited,
            fee,
        })
    }
}
