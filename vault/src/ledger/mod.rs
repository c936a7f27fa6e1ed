//! # Share Ledger
//!
//! Fungible share balances for the vault. Shares represent a proportional
//! claim on the pooled assets; they come into existence only through a mint
//! inside a deposit and leave only through a burn inside a withdrawal.
//!
//! The cardinal invariant: the sum of all balances equals the cached total
//! supply, at all times, after every operation. Both mutation paths update
//! the two together or not at all.

pub mod assets;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Address;

/// Errors from share ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Attempted to burn or transfer more shares than the holder owns.
    #[error("insufficient shares: holder has {available}, requested {requested}")]
    InsufficientShares {
        /// Current balance of the holder.
        available: u128,
        /// Amount that was requested.
        requested: u128,
    },

    /// Total supply would exceed `u128::MAX`. If you're hitting this,
    /// someone is minting more shares than there are atoms in the sun.
    #[error("share supply overflow: supply {supply}, mint {mint}")]
    SupplyOverflow {
        /// Supply before the failed mint.
        supply: u128,
        /// The amount that caused the overflow.
        mint: u128,
    },
}

/// Owner-to-balance mapping plus cached total supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    balances: HashMap<Address, u128>,
    total_supply: u128,
}

impl ShareLedger {
    /// Creates an empty ledger with zero supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `amount` shares to `owner`.
    pub fn mint(&mut self, owner: &Address, amount: u128) -> Result<(), LedgerError> {
        let new_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or(LedgerError::SupplyOverflow {
                    supply: self.total_supply,
                    mint: amount,
                })?;
        // Per-holder balance cannot overflow if the supply did not.
        *self.balances.entry(*owner).or_insert(0) += amount;
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burns `amount` shares from `owner`.
    pub fn burn(&mut self, owner: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(owner);
        if available < amount {
            return Err(LedgerError::InsufficientShares {
                available,
                requested: amount,
            });
        }
        if amount == 0 {
            return Ok(());
        }
        let balance = self.balances.get_mut(owner).expect("nonzero balance checked");
        *balance -= amount;
        if *balance == 0 {
            self.balances.remove(owner);
        }
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` shares between holders. Supply is unchanged.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientShares {
                available,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        *self.balances.get_mut(from).expect("checked above") -= amount;
        if self.balance_of(from) == 0 {
            self.balances.remove(from);
        }
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    /// Balance of a holder; zero for addresses that never held shares.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Total shares in existence.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Number of distinct holders with a nonzero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Exists for invariant checking; equal to
    /// [`total_supply`](Self::total_supply) or the ledger is corrupt.
    pub fn checked_sum(&self) -> u128 {
        self.balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::derive(label)
    }

    #[test]
    fn mint_creates_balance_and_supply() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 1000).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 1000);
        assert_eq!(ledger.total_supply(), 1000);
    }

    #[test]
    fn mint_accumulates() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 500).unwrap();
        ledger.mint(&addr("alice"), 300).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 800);
    }

    #[test]
    fn supply_overflow_rejected() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), u128::MAX).unwrap();
        let result = ledger.mint(&addr("bob"), 1);
        assert!(matches!(result, Err(LedgerError::SupplyOverflow { .. })));
        // Failed mint must not have touched anything.
        assert_eq!(ledger.balance_of(&addr("bob")), 0);
        assert_eq!(ledger.total_supply(), u128::MAX);
    }

    #[test]
    fn burn_reduces_balance_and_supply() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 1000).unwrap();
        ledger.burn(&addr("alice"), 400).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 600);
        assert_eq!(ledger.total_supply(), 600);
    }

    #[test]
    fn burn_beyond_balance_rejected() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 100).unwrap();
        let result = ledger.burn(&addr("alice"), 200);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientShares {
                available: 100,
                requested: 200
            })
        );
    }

    #[test]
    fn burn_from_unknown_holder_rejected() {
        let mut ledger = ShareLedger::new();
        assert!(ledger.burn(&addr("ghost"), 1).is_err());
    }

    #[test]
    fn transfer_moves_without_changing_supply() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 1000).unwrap();
        ledger.transfer(&addr("alice"), &addr("bob"), 250).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 750);
        assert_eq!(ledger.balance_of(&addr("bob")), 250);
        assert_eq!(ledger.total_supply(), 1000);
    }

    #[test]
    fn self_transfer_is_noop() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 100).unwrap();
        ledger.transfer(&addr("alice"), &addr("alice"), 100).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 100);
    }

    #[test]
    fn sum_of_balances_equals_supply_after_churn() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 1_000_000).unwrap();
        ledger.mint(&addr("bob"), 777).unwrap();
        ledger.transfer(&addr("alice"), &addr("carol"), 123_456).unwrap();
        ledger.burn(&addr("bob"), 700).unwrap();
        ledger.burn(&addr("alice"), 1).unwrap();
        assert_eq!(ledger.checked_sum(), ledger.total_supply());
    }

    #[test]
    fn zero_balances_are_pruned() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&addr("alice"), 10).unwrap();
        ledger.burn(&addr("alice"), 10).unwrap();
        assert_eq!(ledger.holder_count(), 0);
    }
}
