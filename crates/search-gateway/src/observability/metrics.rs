//! Prometheus metrics for the gateway

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const METRIC_UPTIME: &str = "search_gateway_uptime_seconds";
const METRIC_INFO: &str = "search_gateway_info";
const METRIC_REQUESTS: &str = "search_gateway_requests_total";
const METRIC_AUTH_FAILURES: &str = "search_gateway_auth_failures_total";
const METRIC_REWRITES: &str = "search_gateway_rewrites_total";
const METRIC_TENANT_CACHE: &str = "search_gateway_tenant_cache_total";
const METRIC_KEY_REFRESHES: &str = "search_gateway_key_refreshes_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Gateway uptime in seconds");
    describe_gauge!(METRIC_INFO, "Gateway information (always 1)");
    describe_counter!(METRIC_REQUESTS, "Requests handled, by outcome");
    describe_counter!(METRIC_AUTH_FAILURES, "Rejected tokens, by reason");
    describe_counter!(METRIC_REWRITES, "Search bodies processed, by outcome");
    describe_counter!(METRIC_TENANT_CACHE, "Tenant directory lookups, by result");
    describe_counter!(METRIC_KEY_REFRESHES, "Background keyset refreshes, by result");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn record_request(outcome: &'static str) {
    counter!(METRIC_REQUESTS, "outcome" => outcome).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!(METRIC_AUTH_FAILURES, "reason" => reason).increment(1);
}

pub fn record_rewrite(outcome: &'static str) {
    counter!(METRIC_REWRITES, "outcome" => outcome).increment(1);
}

pub fn record_tenant_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(METRIC_TENANT_CACHE, "result" => result).increment(1);
}

pub fn record_key_refresh(issuer: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(
        METRIC_KEY_REFRESHES,
        "issuer" => issuer.to_owned(),
        "result" => result,
    )
    .increment(1);
}
