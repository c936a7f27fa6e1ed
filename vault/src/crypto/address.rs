//! # Addresses
//!
//! A STRATA address is 32 opaque bytes. For a human participant it is their
//! Ed25519 verifying key; for protocol-internal accounts (the vault itself,
//! provider pools, spending agents) it is a BLAKE3 digest of a label. The
//! all-zero address is reserved as "no address" and rejected everywhere an
//! address is required.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::keys::StrataPublicKey;

/// A 32-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// The reserved null address. Using it as a receiver, owner, operator,
    /// or treasury is an input error.
    pub const ZERO: Address = Address([0u8; 32]);

    /// Wraps raw bytes as an address.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The address of a keyholder is their verifying key.
    pub fn from_public_key(key: &StrataPublicKey) -> Self {
        Self(*key.as_bytes())
    }

    /// Derives a protocol-internal address from a label.
    ///
    /// Used for accounts that never sign anything: the vault's own share
    /// account, provider pool accounts, spending agents. Deterministic, so
    /// the same label always lands on the same address.
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Returns `true` for the reserved null address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded address.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::OddLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &self.to_hex()[..12])
    }
}
