//! # Providers
//!
//! A provider is a pluggable external backend that yields interest on
//! deposited assets. The vault holds an ordered registry of adapters plus a
//! pointer to the one new deposits are routed to, and delegates all real
//! fund placement to them.
//!
//! Adapters run "under the vault's identity": every mutating call receives
//! the vault's address and a handle to the vault's own asset book, so
//! whatever balances the external protocol records are attributed to the
//! vault, never to the adapter. This is an explicit trait seam, not
//! inheritance, and the adapter never receives a reference back into the
//! vault aggregate, so it structurally cannot re-enter it.
//!
//! Adapters are untrusted. Any failure they surface is fatal to the
//! enclosing operation; there is no partial application and no retry.

pub mod paper;

use std::fmt;

use thiserror::Error;

use crate::crypto::Address;
use crate::ledger::assets::AssetBook;

pub use paper::PaperProvider;

/// The two delegated mutating actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderAction {
    Deposit,
    Withdraw,
}

impl fmt::Display for ProviderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderAction::Deposit => write!(f, "deposit"),
            ProviderAction::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Errors surfaced by provider invocation. Always fatal for the enclosing
/// vault operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The adapter reported a failure executing the action.
    #[error("provider '{provider}' failed {action}: {reason}")]
    CallFailed {
        provider: String,
        action: ProviderAction,
        reason: String,
    },
}

impl ProviderError {
    pub(crate) fn call_failed(
        provider: &str,
        action: ProviderAction,
        reason: impl Into<String>,
    ) -> Self {
        ProviderError::CallFailed {
            provider: provider.to_string(),
            action,
            reason: reason.into(),
        }
    }
}

/// A yield-bearing backend, seen through the narrowest possible interface.
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier; registry membership and the active pointer key
    /// off this string.
    fn identifier(&self) -> &str;

    /// The address the backend pulls funds through. Registered providers
    /// get an unlimited asset allowance from the vault for this agent.
    fn spending_agent(&self) -> Address;

    /// Current deposit yield rate at 1e27 fixed-point ([`crate::config::RATE_SCALE`]).
    /// Informational; the vault does no arithmetic on it.
    fn deposit_rate(&self) -> u128;

    /// The balance the backend currently records for `account`.
    fn deposit_balance(&self, account: &Address, book: &AssetBook) -> u128;

    /// Places `amount` of the vault's assets with the backend. Runs under
    /// the vault's identity: funds are pulled from `vault` through the
    /// spending agent's allowance and recorded for `vault`.
    fn deposit(
        &mut self,
        amount: u128,
        vault: &Address,
        book: &mut AssetBook,
    ) -> Result<(), ProviderError>;

    /// Returns `amount` of the vault's assets from the backend to `vault`.
    fn withdraw(
        &mut self,
        amount: u128,
        vault: &Address,
        book: &mut AssetBook,
    ) -> Result<(), ProviderError>;
}

/// Ordered provider list plus the active-provider pointer.
///
/// The active pointer is an identifier, not an index, so replacing the
/// registry does not silently re-target it; if the active provider is not
/// in the new list the pointer is cleared and the next assignment is a
/// bootstrap assignment again.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ProviderAdapter>>,
    active: Option<String>,
}

impl ProviderRegistry {
    /// A registry with a single provider, immediately active. The vault
    /// constructor path.
    pub fn bootstrap(initial: Box<dyn ProviderAdapter>) -> Self {
        let active = Some(initial.identifier().to_string());
        Self {
            providers: vec![initial],
            active,
        }
    }

    /// Replaces the provider list. The caller has already validated the
    /// list and granted agent allowances. Retains the active pointer when
    /// its provider survives the replacement, clears it otherwise.
    pub fn replace(&mut self, providers: Vec<Box<dyn ProviderAdapter>>) {
        self.providers = providers;
        if let Some(active) = &self.active {
            if !self.contains(active) {
                self.active = None;
            }
        }
    }

    /// Whether a provider with this identifier is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.identifier() == id)
    }

    /// Registered identifiers in registration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.identifier().to_string())
            .collect()
    }

    /// The active provider's identifier, if one is set.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether an active pointer has ever been assigned (and survived).
    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Moves the active pointer. Membership validation is the vault's job
    /// (the very first assignment is deliberately unchecked there).
    pub fn set_active(&mut self, id: &str) {
        self.active = Some(id.to_string());
    }

    /// Read-only adapter lookup.
    pub fn get(&self, id: &str) -> Option<&dyn ProviderAdapter> {
        self.providers
            .iter()
            .find(|p| p.identifier() == id)
            .map(|p| p.as_ref())
    }

    /// Sum of every registered provider's reported balance for `account`.
    /// O(number of providers) external reads.
    pub fn total_balance(&self, account: &Address, book: &AssetBook) -> u128 {
        self.providers
            .iter()
            .map(|p| p.deposit_balance(account, book))
            .sum()
    }

    /// Executes `action` for `amount` on the named provider under the
    /// vault's identity. Adapter failures propagate unchanged; the caller
    /// treats them as fatal.
    pub fn invoke(
        &mut self,
        action: ProviderAction,
        amount: u128,
        id: &str,
        vault: &Address,
        book: &mut AssetBook,
    ) -> Result<(), ProviderError> {
        let adapter = self
            .providers
            .iter_mut()
            .find(|p| p.identifier() == id)
            .ok_or_else(|| {
                ProviderError::call_failed(id, action, "provider not registered")
            })?;
        tracing::debug!(provider = id, %action, amount, "invoking provider action");
        match action {
            ProviderAction::Deposit => adapter.deposit(amount, vault, book),
            ProviderAction::Withdraw => adapter.withdraw(amount, vault, book),
        }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.identifiers())
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(ids: &[&str]) -> ProviderRegistry {
        let mut it = ids.iter();
        let first = PaperProvider::new(it.next().unwrap());
        let mut registry = ProviderRegistry::bootstrap(Box::new(first));
        let rest: Vec<Box<dyn ProviderAdapter>> = ids
            .iter()
            .map(|id| Box::new(PaperProvider::new(id)) as Box<dyn ProviderAdapter>)
            .collect();
        registry.replace(rest);
        registry
    }

    #[test]
    fn bootstrap_sets_active() {
        let registry = ProviderRegistry::bootstrap(Box::new(PaperProvider::new("moola")));
        assert_eq!(registry.active(), Some("moola"));
        assert!(registry.contains("moola"));
    }

    #[test]
    fn replace_retains_surviving_active() {
        let mut registry = registry_of(&["moola", "aave"]);
        assert_eq!(registry.active(), Some("moola"));
        registry.replace(vec![
            Box::new(PaperProvider::new("aave")),
            Box::new(PaperProvider::new("moola")),
        ]);
        assert_eq!(registry.active(), Some("moola"));
    }

    #[test]
    fn replace_clears_dropped_active() {
        let mut registry = registry_of(&["moola", "aave"]);
        registry.replace(vec![Box::new(PaperProvider::new("aave"))]);
        assert_eq!(registry.active(), None);
        assert!(!registry.has_active());
    }

    #[test]
    fn total_balance_sums_every_provider() {
        let mut registry = registry_of(&["a", "b"]);
        let vault = Address::derive("vault");
        let mut book = AssetBook::new();
        book.issue(&vault, 1_000).unwrap();
        // Grant both agents and place funds with each provider.
        for id in ["a", "b"] {
            let agent = registry.get(id).unwrap().spending_agent();
            book.approve(&vault, &agent, u128::MAX);
        }
        registry
            .invoke(ProviderAction::Deposit, 600, "a", &vault, &mut book)
            .unwrap();
        registry
            .invoke(ProviderAction::Deposit, 400, "b", &vault, &mut book)
            .unwrap();
        assert_eq!(registry.total_balance(&vault, &book), 1_000);
    }

    #[test]
    fn invoke_on_unknown_provider_fails() {
        let mut registry = registry_of(&["a"]);
        let vault = Address::derive("vault");
        let mut book = AssetBook::new();
        let result = registry.invoke(ProviderAction::Deposit, 1, "nope", &vault, &mut book);
        assert!(matches!(result, Err(ProviderError::CallFailed { .. })));
    }
}
