//! # Asset Book
//!
//! The fungible-asset ledger the vault, its providers, and the treasury
//! settle through. In a deployed system this is an external token contract;
//! here it is an explicit in-memory book so every movement of pooled assets
//! is observable and testable in one place.
//!
//! Allowances follow token convention: an allowance of `u128::MAX` is
//! treated as unlimited and is not decremented on spend. That is exactly
//! the grant the vault hands each provider's spending agent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Address;

/// Errors from asset book operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    /// Attempted to move more than the account holds.
    #[error("insufficient assets: account has {available}, requested {requested}")]
    InsufficientBalance {
        /// Current balance of the debited account.
        available: u128,
        /// Amount that was requested.
        requested: u128,
    },

    /// The spender's allowance from the owner does not cover the transfer.
    #[error("insufficient asset allowance: granted {granted}, requested {requested}")]
    InsufficientAllowance {
        /// Remaining allowance.
        granted: u128,
        /// Amount that was requested.
        requested: u128,
    },

    /// Total issuance would exceed `u128::MAX`.
    #[error("asset issuance overflow")]
    IssuanceOverflow,
}

/// Balances and allowances for a single fungible asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetBook {
    balances: HashMap<Address, u128>,
    /// `(owner, spender)` to remaining allowance.
    allowances: HashMap<(Address, Address), u128>,
    total_issued: u128,
}

impl AssetBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues new assets to `account`. Host-side operation (faucet, bridge,
    /// test fixture); the vault itself never issues assets.
    pub fn issue(&mut self, account: &Address, amount: u128) -> Result<(), AssetError> {
        self.total_issued = self
            .total_issued
            .checked_add(amount)
            .ok_or(AssetError::IssuanceOverflow)?;
        *self.balances.entry(*account).or_insert(0) += amount;
        Ok(())
    }

    /// Moves assets between accounts.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), AssetError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(AssetError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let balance = self.balances.get_mut(from).expect("nonzero balance checked");
        *balance -= amount;
        if *balance == 0 {
            self.balances.remove(from);
        }
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    /// Sets the allowance `owner` grants `spender`. Absolute set, not
    /// additive. `u128::MAX` means unlimited.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), amount);
        }
    }

    /// Remaining allowance from `owner` to `spender`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Moves assets out of `from` on the authority of `spender`'s allowance.
    /// The allowance check and debit happen before the balance moves, so a
    /// failed transfer leaves the allowance untouched.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), AssetError> {
        let granted = self.allowance(from, spender);
        if granted < amount {
            return Err(AssetError::InsufficientAllowance {
                granted,
                requested: amount,
            });
        }
        // Validate the balance before spending the allowance; errors must
        // leave the book exactly as it was.
        let available = self.balance_of(from);
        if available < amount {
            return Err(AssetError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if granted != u128::MAX {
            self.approve(from, spender, granted - amount);
        }
        self.transfer(from, to, amount)
    }

    /// Balance of an account; zero for unknown accounts.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total assets ever issued, net of nothing (this book has no burn).
    pub fn total_issued(&self) -> u128 {
        self.total_issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::derive(label)
    }

    #[test]
    fn issue_and_transfer() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), 1000).unwrap();
        book.transfer(&addr("alice"), &addr("bob"), 400).unwrap();
        assert_eq!(book.balance_of(&addr("alice")), 600);
        assert_eq!(book.balance_of(&addr("bob")), 400);
        assert_eq!(book.total_issued(), 1000);
    }

    #[test]
    fn transfer_beyond_balance_rejected() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), 100).unwrap();
        assert_eq!(
            book.transfer(&addr("alice"), &addr("bob"), 101),
            Err(AssetError::InsufficientBalance {
                available: 100,
                requested: 101
            })
        );
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), 1000).unwrap();
        book.approve(&addr("alice"), &addr("agent"), 500);
        book.transfer_from(&addr("agent"), &addr("alice"), &addr("pool"), 300)
            .unwrap();
        assert_eq!(book.allowance(&addr("alice"), &addr("agent")), 200);
        assert_eq!(book.balance_of(&addr("pool")), 300);
    }

    #[test]
    fn transfer_from_without_allowance_rejected() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), 1000).unwrap();
        assert!(matches!(
            book.transfer_from(&addr("agent"), &addr("alice"), &addr("pool"), 1),
            Err(AssetError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let mut book = AssetBook::new();
        book.issue(&addr("vault"), 1000).unwrap();
        book.approve(&addr("vault"), &addr("agent"), u128::MAX);
        book.transfer_from(&addr("agent"), &addr("vault"), &addr("pool"), 999)
            .unwrap();
        assert_eq!(book.allowance(&addr("vault"), &addr("agent")), u128::MAX);
    }

    #[test]
    fn failed_transfer_from_leaves_allowance_intact() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), 10).unwrap();
        book.approve(&addr("alice"), &addr("agent"), 100);
        assert!(book
            .transfer_from(&addr("agent"), &addr("alice"), &addr("pool"), 50)
            .is_err());
        assert_eq!(book.allowance(&addr("alice"), &addr("agent")), 100);
        assert_eq!(book.balance_of(&addr("alice")), 10);
    }

    #[test]
    fn approve_zero_clears_entry() {
        let mut book = AssetBook::new();
        book.approve(&addr("alice"), &addr("agent"), 100);
        book.approve(&addr("alice"), &addr("agent"), 0);
        assert_eq!(book.allowance(&addr("alice"), &addr("agent")), 0);
    }

    #[test]
    fn issuance_overflow_rejected() {
        let mut book = AssetBook::new();
        book.issue(&addr("alice"), u128::MAX).unwrap();
        assert_eq!(book.issue(&addr("bob"), 1), Err(AssetError::IssuanceOverflow));
    }
}
