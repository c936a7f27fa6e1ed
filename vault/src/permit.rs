//! # Permits
//!
//! Offline-signed allowance grants. Instead of a prior on-chain approval
//! transaction, an owner signs a message over the permit fields; whoever
//! submits it gets the allowance written, once, before the signature is
//! dead forever (the per-owner nonce moves on).
//!
//! Two flavors:
//!
//! - **Transfer permit** sets the asset-denominated allowance a spender may
//!   move of the owner's shares (converted through the share price at call
//!   time).
//! - **Withdraw permit** sets the finer-grained `(owner, operator,
//!   receiver)` allowance, and additionally binds an `action_args_hash`
//!   scoping the signature to one intended downstream call. A captured
//!   withdraw permit cannot be replayed against a different operation.
//!
//! ## Digest construction
//!
//! The signed message is a BLAKE3 digest of a canonical byte string: a
//! NUL-terminated domain tag, the vault address, then every field in
//! little-endian order. Canonical means byte-for-byte reproducible on both
//! sides; there is no serialization framework to disagree with itself.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{TRANSFER_PERMIT_DOMAIN, WITHDRAW_PERMIT_DOMAIN};
use crate::crypto::{Address, StrataPublicKey, StrataSignature};

/// Errors from permit verification and allowance bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermitError {
    /// The signature does not verify under the owner's key, or the owner
    /// address is not a valid verifying key at all. Intentionally one
    /// variant for both; permit rejection is not an oracle.
    #[error("invalid permit signature")]
    InvalidSignature,

    /// The permit's deadline has passed.
    #[error("permit expired: deadline {deadline}, now {now}")]
    ExpiredDeadline {
        /// Unix seconds the permit was valid until.
        deadline: u64,
        /// Unix seconds at verification time.
        now: u64,
    },

    /// The permit's nonce is not the owner's next expected nonce. This is
    /// what a replayed permit dies of.
    #[error("permit nonce mismatch: expected {expected}, got {got}")]
    StaleNonce {
        /// The owner's next expected nonce.
        expected: u64,
        /// The nonce the permit carried.
        got: u64,
    },

    /// An allowance spend exceeded what was granted.
    #[error("insufficient allowance: granted {granted}, requested {requested}")]
    InsufficientAllowance {
        /// Remaining allowance.
        granted: u128,
        /// Amount that was requested.
        requested: u128,
    },

    /// A direct decrease would push the allowance below zero.
    #[error("allowance underflow: current {current}, decrease {decrease}")]
    AllowanceUnderflow {
        /// Current allowance.
        current: u128,
        /// Requested decrease.
        decrease: u128,
    },

    /// A direct increase would overflow `u128`.
    #[error("allowance overflow")]
    AllowanceOverflow,

    /// A null owner, spender, operator, or receiver.
    #[error("zero address in permit")]
    ZeroAddress,
}

// ---------------------------------------------------------------------------
// Permit messages
// ---------------------------------------------------------------------------

/// The fields of a signed transfer-allowance grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPermit {
    pub owner: Address,
    pub spender: Address,
    /// Asset-denominated allowance to set. Absolute, not additive.
    pub amount: u128,
    /// Must equal the owner's next expected nonce.
    pub nonce: u64,
    /// Unix seconds after which the permit is dead.
    pub deadline: u64,
}

impl TransferPermit {
    /// Canonical signed bytes: domain tag, vault address, then each field
    /// little-endian.
    pub fn signable_bytes(&self, vault: &Address) -> Vec<u8> {
        let mut buf = Vec::with_capacity(160);
        buf.extend_from_slice(TRANSFER_PERMIT_DOMAIN.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(vault.as_bytes());
        buf.extend_from_slice(self.owner.as_bytes());
        buf.extend_from_slice(self.spender.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.deadline.to_le_bytes());
        buf
    }

    /// The digest an owner actually signs.
    pub fn digest(&self, vault: &Address) -> [u8; 32] {
        *blake3::hash(&self.signable_bytes(vault)).as_bytes()
    }
}

/// The fields of a signed withdraw-allowance grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPermit {
    pub owner: Address,
    /// Who may invoke the withdrawal.
    pub operator: Address,
    /// Who must receive the funds.
    pub receiver: Address,
    /// Asset-denominated allowance to set. Absolute, not additive.
    pub amount: u128,
    pub nonce: u64,
    pub deadline: u64,
    /// Hash of the intended downstream call's arguments. Scopes the
    /// signature to one specific operation.
    pub action_args_hash: [u8; 32],
}

impl WithdrawPermit {
    /// Canonical signed bytes, same layout discipline as
    /// [`TransferPermit::signable_bytes`].
    pub fn signable_bytes(&self, vault: &Address) -> Vec<u8> {
        let mut buf = Vec::with_capacity(224);
        buf.extend_from_slice(WITHDRAW_PERMIT_DOMAIN.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(vault.as_bytes());
        buf.extend_from_slice(self.owner.as_bytes());
        buf.extend_from_slice(self.operator.as_bytes());
        buf.extend_from_slice(self.receiver.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.deadline.to_le_bytes());
        buf.extend_from_slice(&self.action_args_hash);
        buf
    }

    /// The digest an owner actually signs.
    pub fn digest(&self, vault: &Address) -> [u8; 32] {
        *blake3::hash(&self.signable_bytes(vault)).as_bytes()
    }
}

// ---------------------------------------------------------------------------
// PermitBook
// ---------------------------------------------------------------------------

/// Nonces and allowances, owned by the vault aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermitBook {
    /// Next expected nonce per owner. Absent means 0.
    nonces: HashMap<Address, u64>,
    /// `(owner, spender)` to asset-denominated transfer allowance.
    transfer_allowances: HashMap<(Address, Address), u128>,
    /// `(owner, operator, receiver)` to asset-denominated withdraw
    /// allowance.
    withdraw_allowances: HashMap<(Address, Address, Address), u128>,
}

impl PermitBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next nonce a permit from `owner` must carry.
    pub fn nonce_of(&self, owner: &Address) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    /// Verifies and applies a transfer permit. On success the allowance is
    /// set (absolute) and the owner's nonce increments exactly once.
    pub fn apply_transfer_permit(
        &mut self,
        vault: &Address,
        permit: &TransferPermit,
        signature: &StrataSignature,
    ) -> Result<(), PermitError> {
        if permit.owner.is_zero() || permit.spender.is_zero() {
            return Err(PermitError::ZeroAddress);
        }
        self.check_deadline(permit.deadline)?;
        self.check_nonce(&permit.owner, permit.nonce)?;
        verify_owner_signature(&permit.owner, &permit.digest(vault), signature)?;

        self.transfer_allowances
            .insert((permit.owner, permit.spender), permit.amount);
        self.bump_nonce(&permit.owner);
        Ok(())
    }

    /// Verifies and applies a withdraw permit. Same single-use discipline
    /// as [`apply_transfer_permit`](Self::apply_transfer_permit).
    pub fn apply_withdraw_permit(
        &mut self,
        vault: &Address,
        permit: &WithdrawPermit,
        signature: &StrataSignature,
    ) -> Result<(), PermitError> {
        if permit.owner.is_zero() || permit.operator.is_zero() || permit.receiver.is_zero() {
            return Err(PermitError::ZeroAddress);
        }
        self.check_deadline(permit.deadline)?;
        self.check_nonce(&permit.owner, permit.nonce)?;
        verify_owner_signature(&permit.owner, &permit.digest(vault), signature)?;

        self.withdraw_allowances.insert(
            (permit.owner, permit.operator, permit.receiver),
            permit.amount,
        );
        self.bump_nonce(&permit.owner);
        Ok(())
    }

    /// Remaining transfer allowance.
    pub fn transfer_allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.transfer_allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Remaining withdraw allowance.
    pub fn withdraw_allowance(
        &self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
    ) -> u128 {
        self.withdraw_allowances
            .get(&(*owner, *operator, *receiver))
            .copied()
            .unwrap_or(0)
    }

    /// Spends transfer allowance. Strictly decreasing; shortfall is an
    /// error and nothing is debited.
    pub fn spend_transfer_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), PermitError> {
        let granted = self.transfer_allowance(owner, spender);
        if granted < amount {
            return Err(PermitError::InsufficientAllowance {
                granted,
                requested: amount,
            });
        }
        self.set_transfer_allowance(owner, spender, granted - amount);
        Ok(())
    }

    /// Spends withdraw allowance for one `(owner, operator, receiver)`
    /// triple.
    pub fn spend_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        amount: u128,
    ) -> Result<(), PermitError> {
        let granted = self.withdraw_allowance(owner, operator, receiver);
        if granted < amount {
            return Err(PermitError::InsufficientAllowance {
                granted,
                requested: amount,
            });
        }
        self.set_withdraw_allowance(owner, operator, receiver, granted - amount);
        Ok(())
    }

    /// Direct owner-side increase of a withdraw allowance. Returns the new
    /// value.
    pub fn increase_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        delta: u128,
    ) -> Result<u128, PermitError> {
        if operator.is_zero() || receiver.is_zero() {
            return Err(PermitError::ZeroAddress);
        }
        let current = self.withdraw_allowance(owner, operator, receiver);
        let updated = current
            .checked_add(delta)
            .ok_or(PermitError::AllowanceOverflow)?;
        self.set_withdraw_allowance(owner, operator, receiver, updated);
        Ok(updated)
    }

    /// Direct owner-side decrease of a withdraw allowance. Returns the new
    /// value; going below zero is an error.
    pub fn decrease_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        delta: u128,
    ) -> Result<u128, PermitError> {
        if operator.is_zero() || receiver.is_zero() {
            return Err(PermitError::ZeroAddress);
        }
        let current = self.withdraw_allowance(owner, operator, receiver);
        let updated = current
            .checked_sub(delta)
            .ok_or(PermitError::AllowanceUnderflow {
                current,
                decrease: delta,
            })?;
        self.set_withdraw_allowance(owner, operator, receiver, updated);
        Ok(updated)
    }

    fn set_transfer_allowance(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            self.transfer_allowances.remove(&(*owner, *spender));
        } else {
            self.transfer_allowances.insert((*owner, *spender), amount);
        }
    }

    fn set_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        amount: u128,
    ) {
        if amount == 0 {
            self.withdraw_allowances
                .remove(&(*owner, *operator, *receiver));
        } else {
            self.withdraw_allowances
                .insert((*owner, *operator, *receiver), amount);
        }
    }

    fn check_deadline(&self, deadline: u64) -> Result<(), PermitError> {
        let now = Utc::now().timestamp().max(0) as u64;
        if now > deadline {
            return Err(PermitError::ExpiredDeadline { deadline, now });
        }
        Ok(())
    }

    fn check_nonce(&self, owner: &Address, nonce: u64) -> Result<(), PermitError> {
        let expected = self.nonce_of(owner);
        if nonce != expected {
            return Err(PermitError::StaleNonce {
                expected,
                got: nonce,
            });
        }
        Ok(())
    }

    fn bump_nonce(&mut self, owner: &Address) {
        *self.nonces.entry(*owner).or_insert(0) += 1;
    }
}

/// Checks that `signature` over `digest` verifies under the key the owner
/// address claims to be. An owner address that is not a valid Ed25519 point
/// fails the same way a bad signature does.
fn verify_owner_signature(
    owner: &Address,
    digest: &[u8; 32],
    signature: &StrataSignature,
) -> Result<(), PermitError> {
    let key = StrataPublicKey::try_from_slice(owner.as_bytes())
        .map_err(|_| PermitError::InvalidSignature)?;
    if !key.verify(digest, signature) {
        return Err(PermitError::InvalidSignature);
    }
    Ok(())
}
