//! # The Vault Aggregate
//!
//! [`StrataVault`] owns the entire accounting state: the share ledger, the
//! asset book, the provider registry, the pause gate, the permit book, and
//! the config. Every public operation is atomic and all-or-nothing against
//! this single aggregate; validation failures return before any state is
//! touched, and provider failures propagate before any *further* state is
//! touched.
//!
//! ## Lifecycle
//!
//! A vault is constructed with one provider (immediately active), both
//! action kinds force-paused, and zero share supply. A designated
//! initializer then [`seed`](StrataVault::seed)s the pool; the resulting
//! shares are minted to the vault's own address and can never be redeemed
//! by an external owner, which pins the initial share price against
//! first-depositor manipulation. Only after seeding does an admin unpause.
//!
//! ## Reentrancy
//!
//! Provider adapters are untrusted code. They never receive a reference to
//! the vault, and internal state mutation is ordered before external
//! interaction wherever the flow allows, but the aggregate still carries an
//! explicit in-flight flag held for the duration of every public operation.
//! Belt, meet suspenders.

mod convert;
mod flows;
mod rebalance;

pub use flows::WithdrawOutcome;
pub use rebalance::RebalanceOutcome;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{AccessGuard, Capability};
use crate::config::MAX_WITHDRAW_FEE;
use crate::crypto::{Address, StrataSignature};
use crate::events::VaultEvent;
use crate::ledger::assets::{AssetBook, AssetError};
use crate::ledger::{LedgerError, ShareLedger};
use crate::math::MathError;
use crate::pause::{ActionKind, PauseError, PauseGate};
use crate::permit::{PermitBook, PermitError, TransferPermit, WithdrawPermit};
use crate::provider::{ProviderAction, ProviderAdapter, ProviderError, ProviderRegistry};

/// Everything that can go wrong with a vault operation.
///
/// Input errors come first in every flow, then limit errors, then
/// state-machine errors; provider failures are always fatal and always
/// propagated verbatim.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A null address where a real one is required.
    #[error("zero address for {0}")]
    ZeroAddress(&'static str),

    /// A zero amount where a positive one is required (including amounts
    /// that round to zero shares).
    #[error("zero amount")]
    ZeroAmount,

    /// The vault has not been seeded yet.
    #[error("vault not seeded")]
    NotInitialized,

    /// Seeding attempted twice.
    #[error("vault already seeded")]
    AlreadyInitialized,

    /// Deposit below the configured floor.
    #[error("deposit below minimum: minimum {minimum}, requested {requested}")]
    BelowMinimumDeposit { minimum: u128, requested: u128 },

    /// Deposit above the receiver's remaining capacity.
    #[error("deposit exceeds capacity: capacity {capacity}, requested {requested}")]
    ExceedsMaxDeposit { capacity: u128, requested: u128 },

    /// Mint above the receiver's remaining share capacity.
    #[error("mint exceeds capacity: capacity {capacity}, requested {requested}")]
    ExceedsMaxMint { capacity: u128, requested: u128 },

    /// A provider identifier that is not registered (or is malformed).
    #[error("invalid provider '{0}'")]
    InvalidProvider(String),

    /// A limit pair violating `0 < user < vault`.
    #[error("invalid deposit limits: user {user_limit}, vault {vault_limit}")]
    InvalidLimits { user_limit: u128, vault_limit: u128 },

    /// Withdraw fee rate above the 5% cap.
    #[error("withdraw fee above maximum: maximum {maximum}, requested {requested}")]
    ExcessWithdrawFee { maximum: u128, requested: u128 },

    /// Rebalance fee above 20% of the moved amount.
    #[error("rebalance fee above maximum: maximum {maximum}, requested {requested}")]
    ExcessRebalanceFee { maximum: u128, requested: u128 },

    /// The caller lacks the required capability.
    #[error("caller lacks the {0} capability")]
    Unauthorized(Capability),

    /// A public operation re-entered while another was in flight.
    #[error("reentrant vault call")]
    ReentrantCall,

    #[error(transparent)]
    Pause(#[from] PauseError),

    #[error(transparent)]
    Permit(#[from] PermitError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Operator-tunable vault parameters. Owned by the aggregate, mutated only
/// through the validated setters; never ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Maximum asset-equivalent value a single holder may have deposited.
    pub user_deposit_limit: u128,
    /// Maximum total assets the vault will accept. Strictly above the user
    /// limit.
    pub vault_deposit_limit: u128,
    /// Minimum size of a single deposit (and of the seeding deposit).
    pub min_deposit: u128,
    /// Withdraw fee rate at 1e18 precision. At most 5%.
    pub withdraw_fee: u128,
    /// Where fees go.
    pub treasury: Address,
}

impl VaultConfig {
    fn validate(&self) -> Result<(), VaultError> {
        if self.user_deposit_limit == 0
            || self.vault_deposit_limit == 0
            || self.user_deposit_limit >= self.vault_deposit_limit
        {
            return Err(VaultError::InvalidLimits {
                user_limit: self.user_deposit_limit,
                vault_limit: self.vault_deposit_limit,
            });
        }
        if self.min_deposit == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if self.withdraw_fee > MAX_WITHDRAW_FEE {
            return Err(VaultError::ExcessWithdrawFee {
                maximum: MAX_WITHDRAW_FEE,
                requested: self.withdraw_fee,
            });
        }
        if self.treasury.is_zero() {
            return Err(VaultError::ZeroAddress("treasury"));
        }
        Ok(())
    }
}

/// The pooled-asset yield vault.
pub struct StrataVault {
    address: Address,
    asset_symbol: String,
    asset_decimals: u8,
    config: VaultConfig,
    shares: ShareLedger,
    book: AssetBook,
    registry: ProviderRegistry,
    gate: PauseGate,
    permits: PermitBook,
    guard: Box<dyn AccessGuard>,
    events: Vec<VaultEvent>,
    initialized: bool,
    in_flight: bool,
}

impl StrataVault {
    /// Creates a vault over the named asset with a single provider, which
    /// becomes active immediately. The vault starts fully paused and
    /// unseeded.
    pub fn new(
        asset_symbol: &str,
        asset_decimals: u8,
        initial_provider: Box<dyn ProviderAdapter>,
        config: VaultConfig,
        guard: Box<dyn AccessGuard>,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        if initial_provider.identifier().trim().is_empty() {
            return Err(VaultError::InvalidProvider(String::new()));
        }
        let address = Address::derive(&format!("strata/vault/{asset_symbol}"));
        let mut book = AssetBook::new();
        book.approve(&address, &initial_provider.spending_agent(), u128::MAX);
        let registry = ProviderRegistry::bootstrap(initial_provider);
        tracing::info!(vault = %address, asset = asset_symbol, "vault created");
        Ok(Self {
            address,
            asset_symbol: asset_symbol.to_string(),
            asset_decimals,
            config,
            shares: ShareLedger::new(),
            book,
            registry,
            gate: PauseGate::paused(),
            permits: PermitBook::new(),
            guard,
            events: Vec::new(),
            initialized: false,
            in_flight: false,
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// The vault's own ledger address. Pooled idle assets and the dead
    /// seed shares live here.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Ticker of the pooled asset.
    pub fn asset_symbol(&self) -> &str {
        &self.asset_symbol
    }

    /// Decimal precision of the pooled asset.
    pub fn asset_decimals(&self) -> u8 {
        self.asset_decimals
    }

    /// Current configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Total share supply.
    pub fn total_supply(&self) -> u128 {
        self.shares.total_supply()
    }

    /// Share balance of a holder.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.shares.balance_of(owner)
    }

    /// Number of holders with a nonzero share balance.
    pub fn holder_count(&self) -> usize {
        self.shares.holder_count()
    }

    /// Whether the vault has been seeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the given action kind is paused.
    pub fn is_paused(&self, kind: ActionKind) -> bool {
        self.gate.is_paused(kind)
    }

    /// Registered provider identifiers, in order.
    pub fn providers(&self) -> Vec<String> {
        self.registry.identifiers()
    }

    /// The provider new deposits route to, if one is set.
    pub fn active_provider(&self) -> Option<&str> {
        self.registry.active()
    }

    /// `(identifier, rate)` pairs at 1e27 scale, for operators deciding
    /// where to rebalance.
    pub fn provider_rates(&self) -> Vec<(String, u128)> {
        self.registry
            .identifiers()
            .into_iter()
            .map(|id| {
                let rate = self.registry.get(&id).map(|p| p.deposit_rate()).unwrap_or(0);
                (id, rate)
            })
            .collect()
    }

    /// The balance a single provider reports for the vault.
    pub fn provider_balance(&self, id: &str) -> Result<u128, VaultError> {
        let adapter = self
            .registry
            .get(id)
            .ok_or_else(|| VaultError::InvalidProvider(id.to_string()))?;
        Ok(adapter.deposit_balance(&self.address, &self.book))
    }

    /// The next nonce a permit from `owner` must carry.
    pub fn nonce_of(&self, owner: &Address) -> u64 {
        self.permits.nonce_of(owner)
    }

    /// Remaining asset-denominated transfer allowance.
    pub fn transfer_allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.permits.transfer_allowance(owner, spender)
    }

    /// Remaining withdraw allowance for an `(owner, operator, receiver)`
    /// triple.
    pub fn withdraw_allowance(
        &self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
    ) -> u128 {
        self.permits.withdraw_allowance(owner, operator, receiver)
    }

    /// Read access to the settlement book.
    pub fn asset_book(&self) -> &AssetBook {
        &self.book
    }

    /// Mutable access to the settlement book. Host-side surface: faucets,
    /// bridges, and yield fixtures issue assets here. The vault itself
    /// never calls this.
    pub fn asset_book_mut(&mut self) -> &mut AssetBook {
        &mut self.book
    }

    /// Drains buffered change notifications.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    /// Host-side lever: issues `amount` of fresh assets and places them
    /// with the named provider under the vault's identity, without minting
    /// shares. Raises the share price exactly the way externally accrued
    /// yield does. Devnet and test fixtures only; nothing in the vault
    /// calls this.
    pub fn donate_yield(&mut self, provider: &str, amount: u128) -> Result<(), VaultError> {
        if !self.registry.contains(provider) {
            return Err(VaultError::InvalidProvider(provider.to_string()));
        }
        self.book.issue(&self.address, amount)?;
        self.registry
            .invoke(ProviderAction::Deposit, amount, provider, &self.address, &mut self.book)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Seeds the pool. The initializer's assets go to the active provider
    /// and the minted shares go to the vault's own address, where nothing
    /// can ever redeem them.
    pub fn seed(&mut self, initializer: &Address, assets: u128) -> Result<u128, VaultError> {
        self.enter()?;
        let result = self.seed_inner(initializer, assets);
        self.exit();
        result
    }

    fn seed_inner(&mut self, initializer: &Address, assets: u128) -> Result<u128, VaultError> {
        if self.initialized {
            return Err(VaultError::AlreadyInitialized);
        }
        if initializer.is_zero() {
            return Err(VaultError::ZeroAddress("initializer"));
        }
        if assets < self.config.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                minimum: self.config.min_deposit,
                requested: assets,
            });
        }
        // Zero supply: the identity conversion applies by definition.
        let shares = assets;
        self.pull_and_place(initializer, assets)?;
        let vault_address = self.address;
        self.shares.mint(&vault_address, shares)?;
        self.initialized = true;
        tracing::info!(vault = %self.address, assets, shares, "vault seeded");
        self.events.push(VaultEvent::Seeded {
            initializer: *initializer,
            assets,
            shares,
        });
        Ok(shares)
    }

    // -----------------------------------------------------------------------
    // Admin surface
    // -----------------------------------------------------------------------

    /// Replaces the provider registry. Every new provider's spending agent
    /// gets an unlimited asset allowance so it can pull funds when invoked.
    pub fn set_providers(
        &mut self,
        caller: &Address,
        providers: Vec<Box<dyn ProviderAdapter>>,
    ) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if providers.is_empty() {
            return Err(VaultError::InvalidProvider("<empty list>".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &providers {
            let id = provider.identifier();
            if id.trim().is_empty() || !seen.insert(id.to_string()) {
                return Err(VaultError::InvalidProvider(id.to_string()));
            }
        }
        for provider in &providers {
            self.book
                .approve(&self.address, &provider.spending_agent(), u128::MAX);
        }
        self.registry.replace(providers);
        let identifiers = self.registry.identifiers();
        tracing::info!(by = %caller, providers = ?identifiers, "provider registry replaced");
        self.events.push(VaultEvent::ProvidersChanged {
            by: *caller,
            providers: identifiers,
        });
        Ok(())
    }

    /// Moves the active-provider pointer. Membership is enforced except
    /// for the very first assignment, which is deliberately unchecked so
    /// bootstrap can't deadlock on its own validation.
    pub fn set_active_provider(&mut self, caller: &Address, id: &str) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if self.registry.has_active() && !self.registry.contains(id) {
            return Err(VaultError::InvalidProvider(id.to_string()));
        }
        self.registry.set_active(id);
        tracing::info!(by = %caller, provider = id, "active provider changed");
        self.events.push(VaultEvent::ActiveProviderChanged {
            by: *caller,
            provider: id.to_string(),
        });
        Ok(())
    }

    /// Updates the deposit limit pair. `0 < user < vault` or nothing.
    pub fn set_deposit_limits(
        &mut self,
        caller: &Address,
        user_limit: u128,
        vault_limit: u128,
    ) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if user_limit == 0 || vault_limit == 0 || user_limit >= vault_limit {
            return Err(VaultError::InvalidLimits {
                user_limit,
                vault_limit,
            });
        }
        self.config.user_deposit_limit = user_limit;
        self.config.vault_deposit_limit = vault_limit;
        self.events.push(VaultEvent::DepositLimitsChanged {
            by: *caller,
            user_limit,
            vault_limit,
        });
        Ok(())
    }

    /// Updates the minimum deposit floor.
    pub fn set_min_deposit(&mut self, caller: &Address, min_deposit: u128) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if min_deposit == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.config.min_deposit = min_deposit;
        self.events.push(VaultEvent::MinDepositChanged {
            by: *caller,
            min_deposit,
        });
        Ok(())
    }

    /// Updates the withdraw fee rate. Capped at 5% of 1e18; this cap is
    /// not negotiable.
    pub fn set_withdraw_fee(&mut self, caller: &Address, fee: u128) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if fee > MAX_WITHDRAW_FEE {
            return Err(VaultError::ExcessWithdrawFee {
                maximum: MAX_WITHDRAW_FEE,
                requested: fee,
            });
        }
        self.config.withdraw_fee = fee;
        self.events.push(VaultEvent::WithdrawFeeChanged { by: *caller, fee });
        Ok(())
    }

    /// Updates the treasury address.
    pub fn set_treasury(&mut self, caller: &Address, treasury: Address) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        if treasury.is_zero() {
            return Err(VaultError::ZeroAddress("treasury"));
        }
        self.config.treasury = treasury;
        self.events.push(VaultEvent::TreasuryChanged {
            by: *caller,
            treasury,
        });
        Ok(())
    }

    /// Pauses one action kind.
    pub fn pause(&mut self, caller: &Address, kind: ActionKind) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        self.gate.pause(kind)?;
        tracing::warn!(by = %caller, action = %kind, "action paused");
        self.events.push(VaultEvent::PauseChanged {
            by: *caller,
            action: kind,
            paused: true,
        });
        Ok(())
    }

    /// Unpauses one action kind.
    pub fn unpause(&mut self, caller: &Address, kind: ActionKind) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        self.gate.unpause(kind)?;
        tracing::info!(by = %caller, action = %kind, "action unpaused");
        self.events.push(VaultEvent::PauseChanged {
            by: *caller,
            action: kind,
            paused: false,
        });
        Ok(())
    }

    /// Force-pauses both action kinds regardless of their current states.
    /// The emergency brake; it never fails.
    pub fn pause_all(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        self.gate.pause_all();
        tracing::warn!(by = %caller, "all actions force-paused");
        self.events.push(VaultEvent::PauseForced {
            by: *caller,
            paused: true,
        });
        Ok(())
    }

    /// Force-unpauses both action kinds.
    pub fn unpause_all(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.require_capability(caller, Capability::Admin)?;
        self.gate.unpause_all();
        tracing::info!(by = %caller, "all actions force-unpaused");
        self.events.push(VaultEvent::PauseForced {
            by: *caller,
            paused: false,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Permit surface
    // -----------------------------------------------------------------------

    /// Applies a signed transfer permit.
    pub fn apply_transfer_permit(
        &mut self,
        permit: &TransferPermit,
        signature: &StrataSignature,
    ) -> Result<(), VaultError> {
        self.permits
            .apply_transfer_permit(&self.address, permit, signature)?;
        self.events.push(VaultEvent::TransferPermitApplied {
            owner: permit.owner,
            spender: permit.spender,
            amount: permit.amount,
            nonce: permit.nonce,
        });
        Ok(())
    }

    /// Applies a signed withdraw permit.
    pub fn apply_withdraw_permit(
        &mut self,
        permit: &WithdrawPermit,
        signature: &StrataSignature,
    ) -> Result<(), VaultError> {
        self.permits
            .apply_withdraw_permit(&self.address, permit, signature)?;
        self.events.push(VaultEvent::WithdrawPermitApplied {
            owner: permit.owner,
            operator: permit.operator,
            receiver: permit.receiver,
            amount: permit.amount,
            nonce: permit.nonce,
        });
        Ok(())
    }

    /// Owner-side withdraw-allowance increase. The host authenticates that
    /// `owner` is the caller.
    pub fn increase_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        delta: u128,
    ) -> Result<u128, VaultError> {
        let updated = self
            .permits
            .increase_withdraw_allowance(owner, operator, receiver, delta)?;
        self.events.push(VaultEvent::WithdrawAllowanceChanged {
            owner: *owner,
            operator: *operator,
            receiver: *receiver,
            amount: updated,
        });
        Ok(updated)
    }

    /// Owner-side withdraw-allowance decrease.
    pub fn decrease_withdraw_allowance(
        &mut self,
        owner: &Address,
        operator: &Address,
        receiver: &Address,
        delta: u128,
    ) -> Result<u128, VaultError> {
        let updated = self
            .permits
            .decrease_withdraw_allowance(owner, operator, receiver, delta)?;
        self.events.push(VaultEvent::WithdrawAllowanceChanged {
            owner: *owner,
            operator: *operator,
            receiver: *receiver,
            amount: updated,
        });
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Internals shared by the operation modules
    // -----------------------------------------------------------------------

    fn require_capability(&self, caller: &Address, capability: Capability) -> Result<(), VaultError> {
        if !self.guard.has_capability(caller, capability) {
            return Err(VaultError::Unauthorized(capability));
        }
        Ok(())
    }

    fn require_active(&self) -> Result<String, VaultError> {
        self.registry
            .active()
            .map(str::to_string)
            .ok_or_else(|| VaultError::InvalidProvider("<no active provider>".to_string()))
    }

    fn enter(&mut self) -> Result<(), VaultError> {
        if self.in_flight {
            return Err(VaultError::ReentrantCall);
        }
        self.in_flight = true;
        Ok(())
    }

    fn exit(&mut self) {
        self.in_flight = false;
    }
}

impl std::fmt::Debug for StrataVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrataVault")
            .field("address", &self.address)
            .field("asset", &self.asset_symbol)
            .field("total_supply", &self.shares.total_supply())
            .field("providers", &self.registry.identifiers())
            .field("active", &self.registry.active())
            .field("initialized", &self.initialized)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test fixtures shared by the operation modules
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::access::StaticAccessGuard;
    use crate::provider::PaperProvider;

    /// One whole token of an 18-decimal asset.
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    /// The seed amount used by every fixture vault.
    pub const SEED: u128 = 1_000_000;

    pub fn operator() -> Address {
        Address::derive("operator")
    }

    pub fn treasury() -> Address {
        Address::derive("treasury")
    }

    pub fn default_config() -> VaultConfig {
        VaultConfig {
            user_deposit_limit: 100_000 * UNIT,
            vault_deposit_limit: 1_000_000 * UNIT,
            min_deposit: SEED,
            withdraw_fee: 0,
            treasury: treasury(),
        }
    }

    /// An unseeded single-provider vault, fully paused.
    pub fn fresh_vault() -> StrataVault {
        StrataVault::new(
            "USDX",
            18,
            Box::new(PaperProvider::new("paper-a")),
            default_config(),
            Box::new(StaticAccessGuard::single_operator(operator())),
        )
        .unwrap()
    }

    /// A seeded, unpaused single-provider vault.
    pub fn seeded_vault() -> StrataVault {
        let mut vault = fresh_vault();
        let initializer = Address::derive("initializer");
        vault.asset_book_mut().issue(&initializer, SEED).unwrap();
        vault.seed(&initializer, SEED).unwrap();
        vault.unpause_all(&operator()).unwrap();
        vault.take_events();
        vault
    }

    /// A seeded, unpaused vault with providers "paper-a" (active) and
    /// "paper-b". Providers are registered before seeding so the paper
    /// adapters keep their in-memory records.
    pub fn two_provider_vault() -> StrataVault {
        let mut vault = fresh_vault();
        vault
            .set_providers(
                &operator(),
                vec![
                    Box::new(PaperProvider::new("paper-a")),
                    Box::new(PaperProvider::new("paper-b")),
                ],
            )
            .unwrap();
        let initializer = Address::derive("initializer");
        vault.asset_book_mut().issue(&initializer, SEED).unwrap();
        vault.seed(&initializer, SEED).unwrap();
        vault.unpause_all(&operator()).unwrap();
        vault.take_events();
        vault
    }

    /// Issues spendable assets to an account.
    pub fn fund(vault: &mut StrataVault, account: &Address, amount: u128) {
        vault.asset_book_mut().issue(account, amount).unwrap();
    }

    /// A seeded two-provider vault plus "paper-b"'s failure lever.
    pub fn two_provider_vault_with_switch(
    ) -> (StrataVault, std::sync::Arc<std::sync::atomic::AtomicBool>) {
        let mut vault = fresh_vault();
        let target = PaperProvider::new("paper-b");
        let switch = target.failure_switch();
        vault
            .set_providers(
                &operator(),
                vec![Box::new(PaperProvider::new("paper-a")), Box::new(target)],
            )
            .unwrap();
        let initializer = Address::derive("initializer");
        vault.asset_book_mut().issue(&initializer, SEED).unwrap();
        vault.seed(&initializer, SEED).unwrap();
        vault.unpause_all(&operator()).unwrap();
        vault.take_events();
        (vault, switch)
    }

    /// A seeded single-provider vault plus the provider's failure lever.
    pub fn seeded_vault_with_switch() -> (StrataVault, std::sync::Arc<std::sync::atomic::AtomicBool>) {
        let provider = PaperProvider::new("paper-a");
        let switch = provider.failure_switch();
        let mut vault = StrataVault::new(
            "USDX",
            18,
            Box::new(provider),
            default_config(),
            Box::new(StaticAccessGuard::single_operator(operator())),
        )
        .unwrap();
        let initializer = Address::derive("initializer");
        vault.asset_book_mut().issue(&initializer, SEED).unwrap();
        vault.seed(&initializer, SEED).unwrap();
        vault.unpause_all(&operator()).unwrap();
        vault.take_events();
        (vault, switch)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::provider::PaperProvider;

    #[test]
    fn new_vault_is_paused_and_unseeded() {
        let vault = fresh_vault();
        assert!(!vault.is_initialized());
        assert!(vault.is_paused(ActionKind::Deposit));
        assert!(vault.is_paused(ActionKind::Withdraw));
        assert_eq!(vault.active_provider(), Some("paper-a"));
        assert_eq!(vault.total_supply(), 0);
    }

    #[test]
    fn config_rejects_bad_limit_pairs() {
        for (user, vault_limit) in [(0u128, 10u128), (10, 0), (10, 10), (11, 10)] {
            let config = VaultConfig {
                user_deposit_limit: user,
                vault_deposit_limit: vault_limit,
                ..default_config()
            };
            assert!(matches!(
                config.validate(),
                Err(VaultError::InvalidLimits { .. })
            ));
        }
    }

    #[test]
    fn seed_mints_dead_shares_to_vault() {
        let mut vault = fresh_vault();
        let initializer = Address::derive("initializer");
        fund(&mut vault, &initializer, SEED);
        let shares = vault.seed(&initializer, SEED).unwrap();
        assert_eq!(shares, SEED);
        assert!(vault.is_initialized());
        let vault_address = *vault.address();
        assert_eq!(vault.balance_of(&vault_address), SEED);
        assert_eq!(vault.balance_of(&initializer), 0);
        assert_eq!(vault.total_assets(), SEED);
    }

    #[test]
    fn second_seed_rejected() {
        let mut vault = seeded_vault();
        let initializer = Address::derive("initializer");
        fund(&mut vault, &initializer, SEED);
        assert!(matches!(
            vault.seed(&initializer, SEED),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn seed_below_minimum_rejected() {
        let mut vault = fresh_vault();
        let initializer = Address::derive("initializer");
        fund(&mut vault, &initializer, SEED);
        assert!(matches!(
            vault.seed(&initializer, SEED - 1),
            Err(VaultError::BelowMinimumDeposit { .. })
        ));
        assert!(!vault.is_initialized());
    }

    #[test]
    fn non_admin_setters_rejected() {
        let mut vault = seeded_vault();
        let stranger = Address::derive("stranger");
        assert!(matches!(
            vault.set_withdraw_fee(&stranger, 1),
            Err(VaultError::Unauthorized(Capability::Admin))
        ));
        assert!(matches!(
            vault.pause(&stranger, ActionKind::Deposit),
            Err(VaultError::Unauthorized(Capability::Admin))
        ));
    }

    #[test]
    fn withdraw_fee_cap_enforced() {
        let mut vault = seeded_vault();
        vault.set_withdraw_fee(&operator(), MAX_WITHDRAW_FEE).unwrap();
        assert!(matches!(
            vault.set_withdraw_fee(&operator(), MAX_WITHDRAW_FEE + 1),
            Err(VaultError::ExcessWithdrawFee { .. })
        ));
        assert_eq!(vault.config().withdraw_fee, MAX_WITHDRAW_FEE);
    }

    #[test]
    fn limit_setter_rejects_violating_pairs() {
        let mut vault = seeded_vault();
        assert!(vault.set_deposit_limits(&operator(), 100, 100).is_err());
        assert!(vault.set_deposit_limits(&operator(), 0, 100).is_err());
        assert!(vault.set_deposit_limits(&operator(), 100, 0).is_err());
        vault.set_deposit_limits(&operator(), 100, 101).unwrap();
        assert_eq!(vault.config().user_deposit_limit, 100);
        assert_eq!(vault.config().vault_deposit_limit, 101);
    }

    #[test]
    fn set_active_provider_requires_membership() {
        let mut vault = seeded_vault();
        assert!(matches!(
            vault.set_active_provider(&operator(), "unregistered"),
            Err(VaultError::InvalidProvider(_))
        ));
    }

    #[test]
    fn first_active_assignment_is_unchecked() {
        let mut vault = seeded_vault();
        // Replacing the registry without the active provider clears the
        // pointer; the next assignment is a bootstrap assignment.
        vault
            .set_providers(&operator(), vec![Box::new(PaperProvider::new("paper-b"))])
            .unwrap();
        assert_eq!(vault.active_provider(), None);
        vault
            .set_active_provider(&operator(), "not-even-registered")
            .unwrap();
        assert_eq!(vault.active_provider(), Some("not-even-registered"));
    }

    #[test]
    fn set_providers_rejects_blank_and_duplicate_ids() {
        let mut vault = seeded_vault();
        assert!(vault
            .set_providers(&operator(), vec![Box::new(PaperProvider::new(""))])
            .is_err());
        assert!(vault
            .set_providers(
                &operator(),
                vec![
                    Box::new(PaperProvider::new("dup")),
                    Box::new(PaperProvider::new("dup")),
                ],
            )
            .is_err());
        assert!(vault.set_providers(&operator(), vec![]).is_err());
    }

    #[test]
    fn set_providers_grants_agent_allowances() {
        let mut vault = seeded_vault();
        let provider = PaperProvider::new("paper-c");
        let agent = provider.spending_agent();
        vault
            .set_providers(&operator(), vec![Box::new(provider)])
            .unwrap();
        let vault_address = *vault.address();
        assert_eq!(vault.asset_book().allowance(&vault_address, &agent), u128::MAX);
    }

    #[test]
    fn setters_emit_change_events() {
        let mut vault = seeded_vault();
        vault.set_withdraw_fee(&operator(), 7).unwrap();
        vault.set_treasury(&operator(), Address::derive("new-treasury")).unwrap();
        let events = vault.take_events();
        assert!(events.contains(&VaultEvent::WithdrawFeeChanged {
            by: operator(),
            fee: 7
        }));
        assert!(events.contains(&VaultEvent::TreasuryChanged {
            by: operator(),
            treasury: Address::derive("new-treasury")
        }));
    }

    #[test]
    fn pause_transitions_surface_gate_errors() {
        let mut vault = seeded_vault();
        vault.pause(&operator(), ActionKind::Deposit).unwrap();
        assert!(matches!(
            vault.pause(&operator(), ActionKind::Deposit),
            Err(VaultError::Pause(PauseError::ActionAlreadyPaused(_)))
        ));
        assert!(matches!(
            vault.unpause(&operator(), ActionKind::Withdraw),
            Err(VaultError::Pause(PauseError::ActionNotPaused(_)))
        ));
        // Force toggles succeed from any mixed state.
        vault.pause_all(&operator()).unwrap();
        vault.pause_all(&operator()).unwrap();
        vault.unpause_all(&operator()).unwrap();
    }
}
