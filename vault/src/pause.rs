//! # Pause Gate
//!
//! A per-action-kind pause state machine. Deposits and withdrawals pause
//! independently; the force toggles flip both at once regardless of their
//! individual states (bootstrap uses force-pause before seeding, incident
//! response uses it when nobody has time to check which side is already
//! down).
//!
//! State transitions are explicit enum moves, not boolean flags, and
//! illegal transitions are errors rather than no-ops: an admin pausing an
//! already-paused action is confused about the vault's state, and that is
//! worth surfacing.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two pausable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Deposits and mints.
    Deposit,
    /// Withdrawals and redemptions.
    Withdraw,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Deposit => write!(f, "deposit"),
            ActionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Errors from pause transitions and enforcement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PauseError {
    /// Enforcement failure: the action is paused. Checked before any other
    /// validation in every deposit/mint/withdraw/redeem.
    #[error("{0} actions are paused")]
    ActionPaused(ActionKind),

    /// `pause` called on an already-paused kind.
    #[error("{0} actions are already paused")]
    ActionAlreadyPaused(ActionKind),

    /// `unpause` called on an already-active kind.
    #[error("{0} actions are not paused")]
    ActionNotPaused(ActionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum GateState {
    Active,
    Paused,
}

/// Independent pause state per action kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseGate {
    deposit: GateState,
    withdraw: GateState,
}

impl PauseGate {
    /// A gate with both kinds active.
    pub fn active() -> Self {
        Self {
            deposit: GateState::Active,
            withdraw: GateState::Active,
        }
    }

    /// A gate with both kinds paused. The vault starts here.
    pub fn paused() -> Self {
        Self {
            deposit: GateState::Paused,
            withdraw: GateState::Paused,
        }
    }

    fn slot(&mut self, kind: ActionKind) -> &mut GateState {
        match kind {
            ActionKind::Deposit => &mut self.deposit,
            ActionKind::Withdraw => &mut self.withdraw,
        }
    }

    /// `Active -> Paused`.
    pub fn pause(&mut self, kind: ActionKind) -> Result<(), PauseError> {
        let slot = self.slot(kind);
        if *slot == GateState::Paused {
            return Err(PauseError::ActionAlreadyPaused(kind));
        }
        *slot = GateState::Paused;
        Ok(())
    }

    /// `Paused -> Active`.
    pub fn unpause(&mut self, kind: ActionKind) -> Result<(), PauseError> {
        let slot = self.slot(kind);
        if *slot == GateState::Active {
            return Err(PauseError::ActionNotPaused(kind));
        }
        *slot = GateState::Active;
        Ok(())
    }

    /// Forces both kinds to `Paused`. Never fails.
    pub fn pause_all(&mut self) {
        self.deposit = GateState::Paused;
        self.withdraw = GateState::Paused;
    }

    /// Forces both kinds to `Active`. Never fails.
    pub fn unpause_all(&mut self) {
        self.deposit = GateState::Active;
        self.withdraw = GateState::Active;
    }

    /// Whether the given kind is currently paused.
    pub fn is_paused(&self, kind: ActionKind) -> bool {
        let state = match kind {
            ActionKind::Deposit => self.deposit,
            ActionKind::Withdraw => self.withdraw,
        };
        state == GateState::Paused
    }

    /// Enforcement entry point: errors with [`PauseError::ActionPaused`]
    /// when the kind is paused.
    pub fn ensure_active(&self, kind: ActionKind) -> Result<(), PauseError> {
        if self.is_paused(kind) {
            Err(PauseError::ActionPaused(kind))
        } else {
            Ok(())
        }
    }
}
