//! # Paper Provider
//!
//! The reference [`ProviderAdapter`]: an in-memory backend with a pool
//! account and per-depositor bookkeeping, no real yield. The node binary
//! runs on these for devnet, and the test suite uses them everywhere a
//! provider is needed.
//!
//! `credit_yield` lets a test or faucet simulate interest accrual by
//! issuing assets straight into the pool and crediting the depositor's
//! recorded balance, which is exactly what a lending market does from the
//! vault's point of view.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RATE_SCALE;
use crate::crypto::Address;
use crate::ledger::assets::{AssetBook, AssetError};
use crate::provider::{ProviderAction, ProviderAdapter, ProviderError};

/// An in-memory interest-free lending backend.
pub struct PaperProvider {
    id: String,
    /// The account the backend holds pooled funds under.
    pool: Address,
    /// The address deposits are pulled through. Distinct from the pool so
    /// that allowance grants and custody are visibly separate concerns.
    agent: Address,
    /// Advertised deposit rate, 1e27 scale.
    rate: u128,
    /// Balance the backend records per depositor.
    recorded: HashMap<Address, u128>,
    /// When set, every mutating call fails. Shared so the lever still
    /// works after the adapter is boxed into a registry; test hook for
    /// the "provider failure aborts the operation" paths.
    broken: Arc<AtomicBool>,
}

impl PaperProvider {
    /// Creates a paper provider. Pool and agent addresses derive from the
    /// identifier, so equal identifiers mean equal accounts.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pool: Address::derive(&format!("paper/{id}/pool")),
            agent: Address::derive(&format!("paper/{id}/agent")),
            // 2% flat, purely decorative.
            rate: RATE_SCALE / 50,
            recorded: HashMap::new(),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the advertised rate.
    pub fn with_rate(mut self, rate: u128) -> Self {
        self.rate = rate;
        self
    }

    /// Makes every subsequent mutating call fail.
    pub fn set_broken(&mut self, broken: bool) {
        self.broken.store(broken, Ordering::Relaxed);
    }

    /// A handle onto the failure lever that keeps working after the
    /// adapter is handed to a registry.
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.broken)
    }

    /// Simulates yield: issues `amount` into the pool and credits it to
    /// `account`'s recorded balance.
    pub fn credit_yield(
        &mut self,
        account: &Address,
        amount: u128,
        book: &mut AssetBook,
    ) -> Result<(), AssetError> {
        book.issue(&self.pool, amount)?;
        *self.recorded.entry(*account).or_insert(0) += amount;
        Ok(())
    }

    fn fail(&self, action: ProviderAction, reason: impl Into<String>) -> ProviderError {
        ProviderError::call_failed(&self.id, action, reason)
    }
}

impl ProviderAdapter for PaperProvider {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn spending_agent(&self) -> Address {
        self.agent
    }

    fn deposit_rate(&self) -> u128 {
        self.rate
    }

    fn deposit_balance(&self, account: &Address, _book: &AssetBook) -> u128 {
        self.recorded.get(account).copied().unwrap_or(0)
    }

    fn deposit(
        &mut self,
        amount: u128,
        vault: &Address,
        book: &mut AssetBook,
    ) -> Result<(), ProviderError> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(self.fail(ProviderAction::Deposit, "backend unavailable"));
        }
        book.transfer_from(&self.agent, vault, &self.pool, amount)
            .map_err(|e| self.fail(ProviderAction::Deposit, e.to_string()))?;
        *self.recorded.entry(*vault).or_insert(0) += amount;
        Ok(())
    }

    fn withdraw(
        &mut self,
        amount: u128,
        vault: &Address,
        book: &mut AssetBook,
    ) -> Result<(), ProviderError> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(self.fail(ProviderAction::Withdraw, "backend unavailable"));
        }
        let recorded = self.recorded.get(vault).copied().unwrap_or(0);
        if recorded < amount {
            return Err(self.fail(
                ProviderAction::Withdraw,
                format!("recorded balance {recorded} below requested {amount}"),
            ));
        }
        book.transfer(&self.pool, vault, amount)
            .map_err(|e| self.fail(ProviderAction::Withdraw, e.to_string()))?;
        if recorded - amount == 0 {
            self.recorded.remove(vault);
        } else {
            self.recorded.insert(*vault, recorded - amount);
        }
        Ok(())
    }
}
