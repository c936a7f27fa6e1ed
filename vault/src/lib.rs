// Copyright (c) 2026 Strata Contributors. MIT License.
// See LICENSE for details.

//! # Strata — Pooled Yield Vault
//!
//! Strata is a pooled-asset yield vault: depositors pool one asset, the
//! pool is placed with pluggable yield providers, and ownership of the
//! pool is tracked as proportional shares. Deposit at today's rate, watch
//! the rate drift up as providers accrue, withdraw your slice. The
//! accounting is the product; the yield is someone else's problem.
//!
//! ## Architecture
//!
//! The crate is split along the actual trust boundaries:
//!
//! - **math** — 256-bit-intermediate mul-div. Rounding is a policy, not an
//!   accident.
//! - **crypto** — Ed25519 keys, BLAKE3 addresses and digests.
//! - **ledger** — The share ledger and the asset settlement book.
//! - **provider** — The adapter seam to external yield backends. Untrusted.
//! - **pause** — A per-action circuit breaker with strict transitions.
//! - **permit** — Signed, nonce-protected allowance grants.
//! - **access** — Capability checks for admin and rebalancer surfaces.
//! - **vault** — The aggregate that ties the above into atomic operations.
//! - **events** — Facts about mutations, for whoever is listening.
//! - **config** — The constants, with the reasoning attached.
//!
//! ## Design Philosophy
//!
//! 1. Rounding always favors the pool. Always.
//! 2. Validate, then mutate, then talk to the outside world.
//! 3. A provider failure aborts the whole operation. No partial states.
//! 4. If it moves value, it has tests. Plural.

pub mod access;
pub mod config;
pub mod crypto;
pub mod events;
pub mod ledger;
pub mod math;
pub mod pause;
pub mod permit;
pub mod provider;
pub mod vault;
