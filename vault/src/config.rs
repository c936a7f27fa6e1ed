//! # Protocol Constants
//!
//! Every magic number in STRATA lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the accounting rules of the vault. The fee caps in
//! particular are load-bearing: they are the only thing standing between
//! "operator rebalances the pool" and "operator drains the pool".

// ---------------------------------------------------------------------------
// Fixed-Point Scales
// ---------------------------------------------------------------------------

/// Fixed-point precision for fee rates. A rate of `PRECISION` means 100%.
///
/// 1e18, the de-facto standard for on-chain fixed-point math. A withdraw
/// fee of 0.1% is therefore `1e15`.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scale for provider yield rates. 1e27 (a "ray").
///
/// Providers report APY-style rates at this precision. The vault never does
/// arithmetic on rates itself; they are pass-through data for operators
/// deciding where to rebalance.
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Fee Bounds
// ---------------------------------------------------------------------------

/// Maximum withdraw fee rate: 5% of `PRECISION`.
///
/// The setter rejects anything above this. 5% is already steep for a yield
/// vault; anything higher is indistinguishable from confiscation.
pub const MAX_WITHDRAW_FEE: u128 = PRECISION / 20;

/// Maximum rebalance fee as a percentage of the moved amount: 20%.
///
/// This bound exists specifically to stop an operator from disguising fund
/// extraction as a rebalancing fee. It is a constant, not a config knob.
pub const MAX_REBALANCE_FEE_PCT: u128 = 20;

// ---------------------------------------------------------------------------
// Amount Semantics
// ---------------------------------------------------------------------------

/// Sentinel amount meaning "the entire available balance".
///
/// Passing this as `assets` to a withdraw resolves to the owner's full
/// withdrawable balance; passing it to a rebalance resolves to the source
/// provider's full reported balance, read within the same atomic operation.
pub const FULL_BALANCE: u128 = u128::MAX;

/// Default minimum deposit in the asset's smallest denomination.
///
/// Also the floor for the seeding deposit. Small enough to be irrelevant
/// for real deposits, large enough that dust can't create degenerate
/// share prices.
pub const DEFAULT_MIN_DEPOSIT: u128 = 1_000_000;

/// Default decimal precision of the pooled asset.
pub const DEFAULT_ASSET_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 verifying key length in bytes. Also the address length, since a
/// STRATA address is a verifying key.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes. If yours isn't, something
/// has gone terribly wrong.
pub const SIGNATURE_LENGTH: usize = 64;

/// BLAKE3 digest length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Domain tag for transfer permits. Baked into every transfer-permit digest
/// so a signature can never be replayed as a different message kind.
pub const TRANSFER_PERMIT_DOMAIN: &str = "STRATA/permit/transfer/v1";

/// Domain tag for withdraw permits.
pub const WITHDRAW_PERMIT_DOMAIN: &str = "STRATA/permit/withdraw/v1";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default REST API port for the operator node.
pub const DEFAULT_API_PORT: u16 = 8660;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8661;
