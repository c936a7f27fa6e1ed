//! # Key Management
//!
//! Ed25519 keypair generation, signing, and verification for STRATA
//! identities. The only thing the vault ever asks a keypair to do is sign a
//! permit digest, and the only thing it asks a public key to do is verify
//! one, so the surface here is deliberately small.
//!
//! ## Why Ed25519?
//!
//! - Deterministic signatures (no k-value footguns like ECDSA).
//! - 128-bit security level in 32+32 bytes. Compact and sufficient.
//! - Fast verification, which matters when a busy vault is checking permit
//!   signatures inline with deposits.
//!
//! Key bytes are never logged. If you add logging to this module, you will
//! be asked to leave.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from key operations. Intentionally vague about *why* something
/// failed; error messages that describe key material are a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// A STRATA identity keypair.
///
/// Does NOT implement `Serialize`/`Deserialize`. Serializing private keys
/// should be a deliberate act, not something that happens because a keypair
/// ended up inside a JSON response. Use `secret_key_bytes()` explicitly.
pub struct StrataKeypair {
    signing_key: SigningKey,
}

/// The public half of a STRATA identity. This is also the holder's address
/// in the vault ledger; see [`crate::crypto::Address`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature over a permit digest. 64 bytes; anything else fails
/// verification with a plain `false`, never a panic.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataSignature {
    bytes: Vec<u8>,
}

impl StrataKeypair {
    /// Generates a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed. A weak
    /// seed means a weak key; feed this from a CSPRNG or KDF only.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstructs a keypair from a hex-encoded secret key. Convenience
    /// for dev tooling; production keys belong in a real key store.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut arr = [0u8; SECRET_KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_seed(&arr))
    }

    /// The public key associated with this keypair.
    pub fn public_key(&self) -> StrataPublicKey {
        StrataPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Raw public key bytes (32 bytes). Safe to share, log, print.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// This keypair's ledger address.
    pub fn address(&self) -> crate::crypto::Address {
        crate::crypto::Address::from_bytes(self.public_key_bytes())
    }

    /// Signs a message. Deterministic per RFC 8032: same key and message,
    /// same signature, every time.
    pub fn sign(&self, message: &[u8]) -> StrataSignature {
        StrataSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verifies a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &StrataSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw 32-byte secret key. Handle with extreme care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for StrataKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even "partially". A partial leak
        // is still a leak.
        write!(f, "StrataKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// StrataPublicKey
// ---------------------------------------------------------------------------

impl StrataPublicKey {
    /// Wraps raw bytes without curve validation. Verification will simply
    /// fail later if the bytes are not a valid point.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Validates and wraps a byte slice. Rejects wrong lengths and bytes
    /// that are not a valid Ed25519 point (low-order points included).
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != 32 {
            return Err(KeyError::InvalidPublicKey);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verifies a signature. A boolean rather than a `Result`: callers want
    /// yes or no, and a detailed failure oracle helps nobody but attackers.
    pub fn verify(&self, message: &[u8], signature: &StrataSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for StrataPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for StrataPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrataPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// StrataSignature
// ---------------------------------------------------------------------------

impl StrataSignature {
    /// Wraps a raw 64-byte signature.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Raw signature bytes (64 for any valid Ed25519 signature).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex-encoded signature. 128 characters when valid.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parses a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 64 {
            return Err(hex::FromHexError::OddLength);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Debug for StrataSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "StrataSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "StrataSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = StrataKeypair::generate();
        let msg = b"withdraw 100 to alice";
        let sig = kp.sign(msg);
        assert!(kp.verify(msg, &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = StrataKeypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = StrataKeypair::generate();
        let kp2 = StrataKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn deterministic_signatures() {
        let kp = StrataKeypair::generate();
        let sig1 = kp.sign(b"determinism is underrated");
        let sig2 = kp.sign(b"determinism is underrated");
        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let seed = [42u8; 32];
        let kp1 = StrataKeypair::from_seed(&seed);
        let kp2 = StrataKeypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn hex_secret_roundtrip() {
        let kp = StrataKeypair::generate();
        let restored = StrataKeypair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn invalid_hex_secret_rejected() {
        assert!(StrataKeypair::from_hex("deadbeef").is_err());
        assert!(StrataKeypair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn try_from_slice_rejects_garbage() {
        assert!(StrataPublicKey::try_from_slice(&[0u8; 16]).is_err());
        // All-zero 32 bytes is a small-order point and must be rejected.
        assert!(StrataPublicKey::try_from_slice(&[0u8; 32]).is_err());
    }

    #[test]
    fn truncated_signature_fails_cleanly() {
        let kp = StrataKeypair::generate();
        let bad = StrataSignature { bytes: vec![1, 2, 3] };
        assert!(!kp.verify(b"anything", &bad));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = StrataKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("StrataKeypair(pub="));
        assert!(!debug_str.contains("signing_key"));
    }

    #[test]
    fn signature_hex_roundtrip() {
        let kp = StrataKeypair::generate();
        let sig = kp.sign(b"test");
        assert_eq!(StrataSignature::from_hex(&sig.to_hex()).unwrap(), sig);
    }
}
