//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! Amounts travel as decimal strings in both directions: JSON numbers top
//! out at 64 bits in most consumers and the vault accounts in `u128`. The
//! literal `"all"` is accepted wherever the full-balance sentinel makes
//! sense (withdraw, redeem, rebalance).
//!
//! ## Endpoints
//!
//! | Method | Path                    | Description                          |
//! |--------|-------------------------|--------------------------------------|
//! | GET    | `/health`               | Liveness probe                       |
//! | GET    | `/status`               | Vault status summary                 |
//! | GET    | `/accounts/:address`    | Holder balances and nonce            |
//! | GET    | `/providers`            | Provider set, rates, balances        |
//! | GET    | `/preview/:op/:amount`  | Conversion preview (no state change) |
//! | GET    | `/ws`                   | WebSocket for live vault events      |
//! | POST   | `/deposit`              | Deposit assets for shares            |
//! | POST   | `/mint`                 | Mint exact shares for assets         |
//! | POST   | `/withdraw`             | Withdraw assets, burn shares         |
//! | POST   | `/redeem`               | Redeem exact shares for assets       |
//! | POST   | `/transfer`             | Move shares between holders          |
//! | POST   | `/transfer-from`        | Move shares via a transfer allowance |
//! | POST   | `/permits/transfer`     | Apply a signed transfer permit       |
//! | POST   | `/permits/withdraw`     | Apply a signed withdraw permit       |
//! | POST   | `/allowances/withdraw`  | Owner-side withdraw allowance change |
//! | POST   | `/rebalance`            | Move pooled assets between providers |
//! | POST   | `/admin/pause`          | Pause or unpause actions             |
//! | POST   | `/admin/config`         | Update fee, limits, floor, treasury  |
//! | POST   | `/admin/providers`      | Replace the paper provider set       |
//! | POST   | `/faucet`               | Devnet: issue spendable assets       |
//! | POST   | `/yield`                | Devnet: simulate provider yield      |

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strata_vault::config::FULL_BALANCE;
use strata_vault::crypto::{Address, StrataSignature};
use strata_vault::events::VaultEvent;
use strata_vault::pause::ActionKind;
use strata_vault::permit::{TransferPermit, WithdrawPermit};
use strata_vault::provider::{PaperProvider, ProviderAdapter};
use strata_vault::vault::{StrataVault, VaultError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet").
    pub network: String,
    /// The vault aggregate. Every handler takes the lock for the shortest
    /// possible span and never holds it across an await.
    pub vault: Arc<RwLock<StrataVault>>,
    /// Broadcast channel for live vault event notifications.
    pub event_tx: broadcast::Sender<VaultEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Drains the vault's buffered events to WebSocket subscribers and
    /// refreshes the state-mirroring gauges. Call after every mutation.
    fn publish(&self, vault: &mut StrataVault) {
        for event in vault.take_events() {
            let _ = self.event_tx.send(event);
        }
        self.metrics
            .refresh(vault.total_assets(), vault.total_supply(), vault.holder_count());
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/providers", get(providers_handler))
        .route("/preview/:op/:amount", get(preview_handler))
        .route("/ws", get(ws_handler))
        .route("/deposit", post(deposit_handler))
        .route("/mint", post(mint_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/redeem", post(redeem_handler))
        .route("/transfer", post(transfer_handler))
        .route("/transfer-from", post(transfer_from_handler))
        .route("/permits/transfer", post(transfer_permit_handler))
        .route("/permits/withdraw", post(withdraw_permit_handler))
        .route("/allowances/withdraw", post(withdraw_allowance_handler))
        .route("/rebalance", post(rebalance_handler))
        .route("/admin/pause", post(admin_pause_handler))
        .route("/admin/config", post(admin_config_handler))
        .route("/admin/providers", post(admin_providers_handler))
        .route("/faucet", post(faucet_handler))
        .route("/yield", post(yield_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An API-level error: an HTTP status plus the message the client sees.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::Unauthorized(_) => StatusCode::FORBIDDEN,
            VaultError::Pause(_) => StatusCode::CONFLICT,
            VaultError::InvalidProvider(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::from_hex(raw).map_err(|e| ApiError::bad_request(format!("invalid address: {e}")))
}

/// Parses a decimal amount string. The literal `"all"` maps to the
/// full-balance sentinel.
fn parse_amount(raw: &str) -> Result<u128, ApiError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(FULL_BALANCE);
    }
    raw.parse::<u128>()
        .map_err(|e| ApiError::bad_request(format!("invalid amount '{raw}': {e}")))
}

fn parse_signature(raw: &str) -> Result<StrataSignature, ApiError> {
    StrataSignature::from_hex(raw)
        .map_err(|e| ApiError::bad_request(format!("invalid signature: {e}")))
}

fn parse_hash32(raw: &str) -> Result<[u8; 32], ApiError> {
    let bytes = hex::decode(raw)
        .map_err(|e| ApiError::bad_request(format!("invalid hash: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ApiError::bad_request("invalid hash: expected 32 bytes"))
}

fn parse_action(raw: &str) -> Result<Option<ActionKind>, ApiError> {
    match raw {
        "deposit" => Ok(Some(ActionKind::Deposit)),
        "withdraw" => Ok(Some(ActionKind::Withdraw)),
        "all" => Ok(None),
        other => Err(ApiError::bad_request(format!(
            "invalid action '{other}': expected deposit, withdraw, or all"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    /// Hex-encoded vault address.
    pub vault_address: String,
    /// Ticker of the pooled asset.
    pub asset: String,
    pub asset_decimals: u8,
    /// Total assets under management, base units, decimal string.
    pub total_assets: String,
    /// Total share supply, decimal string.
    pub total_supply: String,
    pub holder_count: u64,
    pub providers: Vec<String>,
    pub active_provider: Option<String>,
    pub deposits_paused: bool,
    pub withdrawals_paused: bool,
    pub initialized: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    /// Spendable assets in the settlement book.
    pub asset_balance: String,
    /// Vault share balance.
    pub share_balance: String,
    /// Current asset value of the share balance, rounded down.
    pub share_value: String,
    /// The nonce the next permit from this account must carry.
    pub permit_nonce: u64,
    /// Remaining deposit capacity.
    pub max_deposit: String,
    /// Currently withdrawable asset value.
    pub max_withdraw: String,
}

/// One entry of `GET /providers`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    /// Advertised deposit rate, 1e27 scale, decimal string.
    pub rate: String,
    /// Assets the provider reports for the vault, decimal string.
    pub balance: String,
    pub active: bool,
}

/// Response payload for `GET /preview/:op/:amount`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub operation: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub caller: String,
    pub assets: String,
    pub receiver: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositResponse {
    pub shares: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintRequest {
    pub caller: String,
    pub shares: String,
    pub receiver: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintResponse {
    pub assets: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub caller: String,
    /// Asset amount for `/withdraw`, share amount for `/redeem`. `"all"`
    /// resolves to the owner's entire position.
    pub amount: String,
    pub receiver: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawResponse {
    pub assets: String,
    pub shares: String,
    pub fee: String,
    pub paid_out: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub owner: String,
    pub to: String,
    pub shares: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferFromRequest {
    pub spender: String,
    pub owner: String,
    pub to: String,
    /// Asset-denominated value to move, charged to the allowance.
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferFromResponse {
    pub shares: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferPermitRequest {
    pub owner: String,
    pub spender: String,
    pub amount: String,
    pub nonce: u64,
    pub deadline: u64,
    /// Hex-encoded Ed25519 signature over the permit digest.
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawPermitRequest {
    pub owner: String,
    pub operator: String,
    pub receiver: String,
    pub amount: String,
    pub nonce: u64,
    pub deadline: u64,
    /// Hex-encoded 32-byte argument binding. Omit for an unbound grant.
    #[serde(default)]
    pub action_args_hash: Option<String>,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawAllowanceRequest {
    pub owner: String,
    pub operator: String,
    pub receiver: String,
    pub delta: String,
    /// When set, the delta is subtracted instead of added.
    #[serde(default)]
    pub decrease: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub allowance: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub caller: String,
    pub assets: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub activate_target: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebalanceResponse {
    pub withdrawn: String,
    pub deposited: String,
    pub fee: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PauseRequest {
    pub caller: String,
    /// "deposit", "withdraw", or "all".
    pub action: String,
    pub paused: bool,
}

/// Partial config update; only the provided fields change. Applied in
/// order: limits, minimum deposit, fee, treasury. The first failure
/// aborts the rest.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub caller: String,
    #[serde(default)]
    pub user_limit: Option<String>,
    #[serde(default)]
    pub vault_limit: Option<String>,
    #[serde(default)]
    pub min_deposit: Option<String>,
    #[serde(default)]
    pub withdraw_fee: Option<String>,
    #[serde(default)]
    pub treasury: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvidersRequest {
    pub caller: String,
    /// Paper provider identifiers to register, in order.
    pub providers: Vec<String>,
    /// Optionally make this provider active afterwards.
    #[serde(default)]
    pub activate: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub account: String,
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct YieldRequest {
    pub provider: String,
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does
/// not inspect vault state; that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns a vault status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let vault = state.vault.read();
    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        vault_address: vault.address().to_hex(),
        asset: vault.asset_symbol().to_string(),
        asset_decimals: vault.asset_decimals(),
        total_assets: vault.total_assets().to_string(),
        total_supply: vault.total_supply().to_string(),
        holder_count: vault.holder_count() as u64,
        providers: vault.providers(),
        active_provider: vault.active_provider().map(str::to_string),
        deposits_paused: vault.is_paused(ActionKind::Deposit),
        withdrawals_paused: vault.is_paused(ActionKind::Withdraw),
        initialized: vault.is_initialized(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /accounts/:address` — holder balances, nonce, and capacity.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = parse_address(&address)?;
    let vault = state.vault.read();
    let share_balance = vault.balance_of(&account);
    let resp = AccountResponse {
        address: account.to_hex(),
        asset_balance: vault.asset_book().balance_of(&account).to_string(),
        share_balance: share_balance.to_string(),
        share_value: vault.convert_to_assets(share_balance)?.to_string(),
        permit_nonce: vault.nonce_of(&account),
        max_deposit: vault.max_deposit(&account)?.to_string(),
        max_withdraw: vault.max_withdraw(&account)?.to_string(),
    };
    Ok(Json(resp))
}

/// `GET /providers` — the provider set with rates and reported balances.
async fn providers_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderInfo>>, ApiError> {
    let vault = state.vault.read();
    let active = vault.active_provider().map(str::to_string);
    let mut out = Vec::new();
    for (id, rate) in vault.provider_rates() {
        let balance = vault.provider_balance(&id)?;
        out.push(ProviderInfo {
            active: active.as_deref() == Some(id.as_str()),
            rate: rate.to_string(),
            balance: balance.to_string(),
            id,
        });
    }
    Ok(Json(out))
}

/// `GET /preview/:op/:amount` — conversion preview without state change.
///
/// `op` is one of `deposit`, `mint`, `withdraw`, `redeem`.
async fn preview_handler(
    Path((op, amount)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let amount = parse_amount(&amount)?;
    let vault = state.vault.read();
    let output = match op.as_str() {
        "deposit" => vault.preview_deposit(amount)?,
        "mint" => vault.preview_mint(amount)?,
        "withdraw" => vault.preview_withdraw(amount)?,
        "redeem" => vault.preview_redeem(amount)?,
        other => {
            return Err(ApiError::bad_request(format!(
                "invalid preview operation '{other}'"
            )))
        }
    };
    Ok(Json(PreviewResponse {
        operation: op,
        input: amount.to_string(),
        output: output.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Flow Handlers
// ---------------------------------------------------------------------------

/// Runs a mutating vault closure under the write lock, recording latency
/// and success/failure counters, and publishing events on success.
fn mutate<T>(
    state: &AppState,
    success_counter: Option<&prometheus::IntCounter>,
    op: impl FnOnce(&mut StrataVault) -> Result<T, VaultError>,
) -> Result<T, ApiError> {
    let start = Instant::now();
    let mut vault = state.vault.write();
    let result = op(&mut vault);
    state
        .metrics
        .operation_latency_seconds
        .observe(start.elapsed().as_secs_f64());
    match result {
        Ok(value) => {
            if let Some(counter) = success_counter {
                counter.inc();
            }
            state.publish(&mut vault);
            Ok(value)
        }
        Err(err) => {
            state.metrics.failed_operations_total.inc();
            Err(err.into())
        }
    }
}

/// `POST /deposit` — pulls assets from the caller, mints shares.
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;
    let assets = parse_amount(&req.assets)?;
    let shares = mutate(&state, Some(&state.metrics.deposits_total), |vault| {
        vault.deposit(&caller, assets, &receiver)
    })?;
    Ok(Json(DepositResponse {
        shares: shares.to_string(),
    }))
}

/// `POST /mint` — mints exact shares, charging rounded-up assets.
async fn mint_handler(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<MintResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;
    let shares = parse_amount(&req.shares)?;
    let assets = mutate(&state, Some(&state.metrics.deposits_total), |vault| {
        vault.mint(&caller, shares, &receiver)
    })?;
    Ok(Json(MintResponse {
        assets: assets.to_string(),
    }))
}

/// `POST /withdraw` — withdraws assets (clamped), burns shares.
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;
    let owner = parse_address(&req.owner)?;
    let assets = parse_amount(&req.amount)?;
    let outcome = mutate(&state, Some(&state.metrics.withdrawals_total), |vault| {
        vault.withdraw(&caller, assets, &receiver, &owner)
    })?;
    Ok(Json(WithdrawResponse {
        assets: outcome.assets.to_string(),
        shares: outcome.shares.to_string(),
        fee: outcome.fee.to_string(),
        paid_out: outcome.paid_out.to_string(),
    }))
}

/// `POST /redeem` — redeems exact shares (clamped) for assets.
async fn redeem_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let receiver = parse_address(&req.receiver)?;
    let owner = parse_address(&req.owner)?;
    let shares = parse_amount(&req.amount)?;
    let outcome = mutate(&state, Some(&state.metrics.withdrawals_total), |vault| {
        vault.redeem(&caller, shares, &receiver, &owner)
    })?;
    Ok(Json(WithdrawResponse {
        assets: outcome.assets.to_string(),
        shares: outcome.shares.to_string(),
        fee: outcome.fee.to_string(),
        paid_out: outcome.paid_out.to_string(),
    }))
}

/// `POST /transfer` — moves shares from the owner to another holder.
async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let owner = parse_address(&req.owner)?;
    let to = parse_address(&req.to)?;
    let shares = parse_amount(&req.shares)?;
    mutate(&state, None, |vault| vault.transfer_shares(&owner, &to, shares))?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /transfer-from` — moves share value via a transfer allowance.
async fn transfer_from_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferFromRequest>,
) -> Result<Json<TransferFromResponse>, ApiError> {
    let spender = parse_address(&req.spender)?;
    let owner = parse_address(&req.owner)?;
    let to = parse_address(&req.to)?;
    let value = parse_amount(&req.value)?;
    let shares = mutate(&state, None, |vault| {
        vault.transfer_shares_from(&spender, &owner, &to, value)
    })?;
    Ok(Json(TransferFromResponse {
        shares: shares.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Permit Handlers
// ---------------------------------------------------------------------------

/// `POST /permits/transfer` — applies a signed transfer permit.
async fn transfer_permit_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferPermitRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let permit = TransferPermit {
        owner: parse_address(&req.owner)?,
        spender: parse_address(&req.spender)?,
        amount: parse_amount(&req.amount)?,
        nonce: req.nonce,
        deadline: req.deadline,
    };
    let signature = parse_signature(&req.signature)?;
    mutate(&state, None, |vault| {
        vault.apply_transfer_permit(&permit, &signature)
    })?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /permits/withdraw` — applies a signed withdraw permit.
async fn withdraw_permit_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawPermitRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let action_args_hash = match &req.action_args_hash {
        Some(raw) => parse_hash32(raw)?,
        None => [0u8; 32],
    };
    let permit = WithdrawPermit {
        owner: parse_address(&req.owner)?,
        operator: parse_address(&req.operator)?,
        receiver: parse_address(&req.receiver)?,
        amount: parse_amount(&req.amount)?,
        nonce: req.nonce,
        deadline: req.deadline,
        action_args_hash,
    };
    let signature = parse_signature(&req.signature)?;
    mutate(&state, None, |vault| {
        vault.apply_withdraw_permit(&permit, &signature)
    })?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /allowances/withdraw` — owner-side allowance adjustment.
///
/// The node trusts the caller's identity here; this surface exists for
/// hosts that authenticate out-of-band. Third parties go through permits.
async fn withdraw_allowance_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawAllowanceRequest>,
) -> Result<Json<AllowanceResponse>, ApiError> {
    let owner = parse_address(&req.owner)?;
    let operator = parse_address(&req.operator)?;
    let receiver = parse_address(&req.receiver)?;
    let delta = parse_amount(&req.delta)?;
    let allowance = mutate(&state, None, |vault| {
        if req.decrease {
            vault.decrease_withdraw_allowance(&owner, &operator, &receiver, delta)
        } else {
            vault.increase_withdraw_allowance(&owner, &operator, &receiver, delta)
        }
    })?;
    Ok(Json(AllowanceResponse {
        allowance: allowance.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Operator Handlers
// ---------------------------------------------------------------------------

/// `POST /rebalance` — moves pooled assets between providers.
async fn rebalance_handler(
    State(state): State<AppState>,
    Json(req): Json<RebalanceRequest>,
) -> Result<Json<RebalanceResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let assets = parse_amount(&req.assets)?;
    let fee = match &req.fee {
        Some(raw) => parse_amount(raw)?,
        None => 0,
    };
    let outcome = mutate(&state, Some(&state.metrics.rebalances_total), |vault| {
        vault.rebalance(&caller, assets, &req.from, &req.to, fee, req.activate_target)
    })?;
    Ok(Json(RebalanceResponse {
        withdrawn: outcome.withdrawn.to_string(),
        deposited: outcome.deposited.to_string(),
        fee: outcome.fee.to_string(),
    }))
}

/// `POST /admin/pause` — pauses or unpauses one or both action kinds.
async fn admin_pause_handler(
    State(state): State<AppState>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let action = parse_action(&req.action)?;
    mutate(&state, None, |vault| match (action, req.paused) {
        (Some(kind), true) => vault.pause(&caller, kind),
        (Some(kind), false) => vault.unpause(&caller, kind),
        (None, true) => vault.pause_all(&caller),
        (None, false) => vault.unpause_all(&caller),
    })?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /admin/config` — applies a partial config update.
async fn admin_config_handler(
    State(state): State<AppState>,
    Json(req): Json<ConfigRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let limits = match (&req.user_limit, &req.vault_limit) {
        (Some(user), Some(vault_limit)) => Some((parse_amount(user)?, parse_amount(vault_limit)?)),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "user_limit and vault_limit must be provided together",
            ))
        }
    };
    let min_deposit = req.min_deposit.as_deref().map(parse_amount).transpose()?;
    let withdraw_fee = req.withdraw_fee.as_deref().map(parse_amount).transpose()?;
    let treasury = req.treasury.as_deref().map(parse_address).transpose()?;
    mutate(&state, None, |vault| {
        if let Some((user, limit)) = limits {
            vault.set_deposit_limits(&caller, user, limit)?;
        }
        if let Some(amount) = min_deposit {
            vault.set_min_deposit(&caller, amount)?;
        }
        if let Some(fee) = withdraw_fee {
            vault.set_withdraw_fee(&caller, fee)?;
        }
        if let Some(treasury) = treasury {
            vault.set_treasury(&caller, treasury)?;
        }
        Ok(())
    })?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /admin/providers` — replaces the paper provider set.
async fn admin_providers_handler(
    State(state): State<AppState>,
    Json(req): Json<ProvidersRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let caller = parse_address(&req.caller)?;
    let adapters: Vec<Box<dyn ProviderAdapter>> = req
        .providers
        .iter()
        .map(|id| Box::new(PaperProvider::new(id)) as Box<dyn ProviderAdapter>)
        .collect();
    mutate(&state, None, |vault| {
        vault.set_providers(&caller, adapters)?;
        if let Some(activate) = &req.activate {
            vault.set_active_provider(&caller, activate)?;
        }
        Ok(())
    })?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Devnet Handlers
// ---------------------------------------------------------------------------

/// `POST /faucet` — issues spendable assets to an account. Devnet only;
/// a production host wires real settlement here instead.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let account = parse_address(&req.account)?;
    let amount = parse_amount(&req.amount)?;
    mutate(&state, None, |vault| {
        vault
            .asset_book_mut()
            .issue(&account, amount)
            .map_err(VaultError::from)
    })?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /yield` — simulates provider yield by donating fresh assets to
/// the named provider. Devnet only.
async fn yield_handler(
    State(state): State<AppState>,
    Json(req): Json<YieldRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let amount = parse_amount(&req.amount)?;
    mutate(&state, None, |vault| vault.donate_yield(&req.provider, amount))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for live vault event streaming.
///
/// Clients receive JSON-encoded [`VaultEvent`] messages for every state
/// mutation. The connection is read-only from the server's perspective;
/// client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            // Client disconnected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {
                        // Client messages are ignored; this is a push-only channel.
                    }
                    _ => break, // Disconnected or error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
