//! # Cryptographic Primitives
//!
//! Ed25519 keys and signatures, plus the [`Address`] type. STRATA identities
//! are verifying keys: the address a depositor holds shares under is the same
//! 32 bytes that verify their permit signatures, so "recovered signer equals
//! owner" degenerates to an ordinary signature check under the owner's key.
//!
//! Don't roll your own. Everything here is a thin, audited-in-one-place
//! wrapper over `ed25519-dalek` and `blake3`.

pub mod address;
pub mod keys;

pub use address::Address;
pub use keys::{KeyError, StrataKeypair, StrataPublicKey, StrataSignature};
