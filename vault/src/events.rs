//! # Change Notifications
//!
//! Every state mutation the vault performs is recorded as a [`VaultEvent`]
//! carrying the new value(s) and, where meaningful, the acting party. The
//! vault buffers events and the host drains them with
//! `StrataVault::take_events`; what the host does with them (websocket
//! fan-out, audit log, nothing) is not the vault's business.
//!
//! Events are facts about mutations that already happened. Nothing in the
//! core reads them back.

use serde::{Deserialize, Serialize};

use crate::crypto::Address;
use crate::pause::ActionKind;

/// A state-change notification emitted by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultEvent {
    /// The provider registry was replaced.
    ProvidersChanged {
        by: Address,
        providers: Vec<String>,
    },
    /// The active provider pointer moved.
    ActiveProviderChanged {
        by: Address,
        provider: String,
    },
    /// Per-user and total deposit limits were updated.
    DepositLimitsChanged {
        by: Address,
        user_limit: u128,
        vault_limit: u128,
    },
    /// The minimum deposit floor was updated.
    MinDepositChanged {
        by: Address,
        min_deposit: u128,
    },
    /// The withdraw fee rate was updated (1e18-scale).
    WithdrawFeeChanged {
        by: Address,
        fee: u128,
    },
    /// The treasury address was updated.
    TreasuryChanged {
        by: Address,
        treasury: Address,
    },
    /// One action kind was paused or unpaused.
    PauseChanged {
        by: Address,
        action: ActionKind,
        paused: bool,
    },
    /// Both action kinds were force-set at once.
    PauseForced {
        by: Address,
        paused: bool,
    },
    /// The vault was seeded; the minted shares belong to the vault itself.
    Seeded {
        initializer: Address,
        assets: u128,
        shares: u128,
    },
    /// Assets entered the vault and shares were minted.
    Deposited {
        caller: Address,
        receiver: Address,
        assets: u128,
        shares: u128,
    },
    /// Shares were burned and assets left the vault.
    Withdrawn {
        caller: Address,
        owner: Address,
        receiver: Address,
        assets: u128,
        shares: u128,
        fee: u128,
    },
    /// Shares moved between holders.
    SharesTransferred {
        caller: Address,
        owner: Address,
        to: Address,
        shares: u128,
    },
    /// Pooled assets moved between providers.
    Rebalanced {
        by: Address,
        from: String,
        to: String,
        assets_withdrawn: u128,
        assets_deposited: u128,
    },
    /// A signed transfer permit was accepted.
    TransferPermitApplied {
        owner: Address,
        spender: Address,
        amount: u128,
        nonce: u64,
    },
    /// A signed withdraw permit was accepted.
    WithdrawPermitApplied {
        owner: Address,
        operator: Address,
        receiver: Address,
        amount: u128,
        nonce: u64,
    },
    /// A withdraw allowance was directly adjusted by its owner.
    WithdrawAllowanceChanged {
        owner: Address,
        operator: Address,
        receiver: Address,
        amount: u128,
    },
}
