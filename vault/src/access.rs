//! # Access Control Seam
//!
//! The vault does not store roles. Who may administer it or trigger a
//! rebalance is the host's concern, consumed through the [`AccessGuard`]
//! trait. [`StaticAccessGuard`] is the reference implementation: explicit
//! address sets, no delegation, no expiry.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::Address;

/// The capabilities the vault checks before privileged operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// May change providers, limits, fees, treasury, and pause state.
    Admin,
    /// May execute rebalances between providers.
    Rebalancer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Admin => write!(f, "admin"),
            Capability::Rebalancer => write!(f, "rebalancer"),
        }
    }
}

/// Answers "may this caller do that". Implementations must be pure reads;
/// the vault calls this inline with every privileged operation.
pub trait AccessGuard: Send + Sync {
    fn has_capability(&self, caller: &Address, capability: Capability) -> bool;
}

/// Fixed address sets per capability.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGuard {
    admins: HashSet<Address>,
    rebalancers: HashSet<Address>,
}

impl StaticAccessGuard {
    /// An empty guard: nobody can do anything. Add grants before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants both capabilities to a single address. The usual devnet and
    /// test setup.
    pub fn single_operator(operator: Address) -> Self {
        Self::new().with_admin(operator).with_rebalancer(operator)
    }

    /// Adds an admin.
    pub fn with_admin(mut self, addr: Address) -> Self {
        self.admins.insert(addr);
        self
    }

    /// Adds a rebalancer.
    pub fn with_rebalancer(mut self, addr: Address) -> Self {
        self.rebalancers.insert(addr);
        self
    }
}

impl AccessGuard for StaticAccessGuard {
    fn has_capability(&self, caller: &Address, capability: Capability) -> bool {
        match capability {
            Capability::Admin => self.admins.contains(caller),
            Capability::Rebalancer => self.rebalancers.contains(caller),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_guard_denies_everyone() {
        let guard = StaticAccessGuard::new();
        let caller = Address::derive("anyone");
        assert!(!guard.has_capability(&caller, Capability::Admin));
        assert!(!guard.has_capability(&caller, Capability::Rebalancer));
    }

    #[test]
    fn capabilities_are_independent() {
        let admin = Address::derive("admin");
        let bot = Address::derive("rebalance-bot");
        let guard = StaticAccessGuard::new()
            .with_admin(admin)
            .with_rebalancer(bot);

        assert!(guard.has_capability(&admin, Capability::Admin));
        assert!(!guard.has_capability(&admin, Capability::Rebalancer));
        assert!(guard.has_capability(&bot, Capability::Rebalancer));
        assert!(!guard.has_capability(&bot, Capability::Admin));
    }

    #[test]
    fn single_operator_holds_both() {
        let op = Address::derive("operator");
        let guard = StaticAccessGuard::single_operator(op);
        assert!(guard.has_capability(&op, Capability::Admin));
        assert!(guard.has_capability(&op, Capability::Rebalancer));
    }
}
