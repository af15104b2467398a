//! # Prometheus Metrics
//!
//! Exposes operational metrics for the registry node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Stars appended to the ledger.
    pub stars_registered_total: IntCounter,
    /// Challenges handed out by `/requestValidation`.
    pub validation_requests_total: IntCounter,
    /// Signatures that admitted an address.
    pub signatures_verified_total: IntCounter,
    /// Signature validations that failed for any reason.
    pub signatures_rejected_total: IntCounter,
    /// Height of the chain tip.
    pub chain_height: IntGauge,
    /// Addresses admitted but not yet appended.
    pub admission_pool_size: IntGauge,
    /// Latency of registry API requests in seconds.
    pub request_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let metric = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric registration");
    metric
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let metric = IntGauge::new(name, help).expect("metric creation");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric registration");
    metric
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("star".into()), None)
            .expect("failed to create prometheus registry");

        let stars_registered_total = counter(
            &registry,
            "stars_registered_total",
            "Total number of stars appended to the ledger",
        );
        let validation_requests_total = counter(
            &registry,
            "validation_requests_total",
            "Total number of validation challenges requested",
        );
        let signatures_verified_total = counter(
            &registry,
            "signatures_verified_total",
            "Total number of signatures that admitted an address",
        );
        let signatures_rejected_total = counter(
            &registry,
            "signatures_rejected_total",
            "Total number of signature validations that failed",
        );
        let chain_height = gauge(&registry, "chain_height", "Height of the chain tip");
        let admission_pool_size = gauge(
            &registry,
            "admission_pool_size",
            "Addresses admitted and waiting to append",
        );

        let request_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "request_latency_seconds",
                "Registry API request latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(request_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            stars_registered_total,
            validation_requests_total,
            signatures_verified_total,
            signatures_rejected_total,
            chain_height,
            admission_pool_size,
            request_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_namespaced_and_exported() {
        let metrics = NodeMetrics::new();
        metrics.stars_registered_total.inc();
        metrics.chain_height.set(4);
        metrics.request_latency_seconds.observe(0.002);

        let text = metrics.encode().unwrap();
        assert!(text.contains("star_stars_registered_total 1"));
        assert!(text.contains("star_chain_height 4"));
        assert!(text.contains("star_request_latency_seconds_count 1"));
        assert!(text.contains("star_admission_pool_size 0"));
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let a = NodeMetrics::new();
        let b = NodeMetrics::new();
        a.validation_requests_total.inc();
        assert_eq!(b.validation_requests_total.get(), 0);
    }
}
