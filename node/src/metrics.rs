//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.
//! Gauges mirroring vault state (total assets, share supply) are refreshed
//! by the API layer after every mutating operation.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct VaultMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of successful deposit and mint operations.
    pub deposits_total: IntCounter,
    /// Total number of successful withdraw and redeem operations.
    pub withdrawals_total: IntCounter,
    /// Total number of successful rebalances.
    pub rebalances_total: IntCounter,
    /// Total number of vault operations that returned an error.
    pub failed_operations_total: IntCounter,
    /// Total assets under management, in base asset units.
    pub total_assets: IntGauge,
    /// Total share supply.
    pub share_supply: IntGauge,
    /// Number of share holders with a nonzero balance.
    pub share_holders: IntGauge,
    /// Histogram of vault operation latency in seconds, as observed by
    /// the API layer.
    pub operation_latency_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("strata".into()), None)
            .expect("failed to create prometheus registry");

        let deposits_total = IntCounter::new(
            "deposits_total",
            "Total number of successful deposit and mint operations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total = IntCounter::new(
            "withdrawals_total",
            "Total number of successful withdraw and redeem operations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let rebalances_total = IntCounter::new(
            "rebalances_total",
            "Total number of successful provider rebalances",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rebalances_total.clone()))
            .expect("metric registration");

        let failed_operations_total = IntCounter::new(
            "failed_operations_total",
            "Total number of vault operations that returned an error",
        )
        .expect("metric creation");
        registry
            .register(Box::new(failed_operations_total.clone()))
            .expect("metric registration");

        let total_assets = IntGauge::new(
            "total_assets",
            "Total assets under management in base asset units",
        )
        .expect("metric creation");
        registry
            .register(Box::new(total_assets.clone()))
            .expect("metric registration");

        let share_supply = IntGauge::new("share_supply", "Total vault share supply")
            .expect("metric creation");
        registry
            .register(Box::new(share_supply.clone()))
            .expect("metric registration");

        let share_holders =
            IntGauge::new("share_holders", "Number of holders with a nonzero share balance")
                .expect("metric creation");
        registry
            .register(Box::new(share_holders.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Vault operation latency in seconds as observed by the API layer",
            )
            .buckets(vec![
                0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            deposits_total,
            withdrawals_total,
            rebalances_total,
            failed_operations_total,
            total_assets,
            share_supply,
            share_holders,
            operation_latency_seconds,
        }
    }

    /// Refreshes the state-mirroring gauges from a vault snapshot. Values
    /// above `i64::MAX` saturate; Prometheus gauges are f64 underneath
    /// anyway, so exactness at that magnitude is already gone.
    pub fn refresh(&self, total_assets: u128, share_supply: u128, holders: usize) {
        self.total_assets
            .set(i64::try_from(total_assets).unwrap_or(i64::MAX));
        self.share_supply
            .set(i64::try_from(share_supply).unwrap_or(i64::MAX));
        self.share_holders
            .set(i64::try_from(holders).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<VaultMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
