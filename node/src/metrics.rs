//! # Prometheus Metrics
//!
//! Counters for one `xpxd` invocation. All metrics live in a dedicated
//! [`prometheus::Registry`] with the `xpx` prefix and are rendered in the
//! text exposition format on request.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Metric handles for the daemon.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Transactions that ran and were kept.
    pub txs_delivered_total: IntCounter,
    /// Transactions that were rejected.
    pub txs_rejected_total: IntCounter,
    /// Blocks committed, genesis included.
    pub blocks_committed_total: IntCounter,
    /// Latest committed version.
    pub block_height: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("xpx".into()), None)?;

        let txs_delivered_total = counter(
            &registry,
            "txs_delivered_total",
            "Transactions delivered and kept",
        )?;
        let txs_rejected_total = counter(
            &registry,
            "txs_rejected_total",
            "Transactions rejected with a non-zero code",
        )?;
        let blocks_committed_total =
            counter(&registry, "blocks_committed_total", "Blocks committed")?;

        let block_height = IntGauge::new("block_height", "Latest committed version")?;
        registry.register(Box::new(block_height.clone()))?;

        Ok(Self {
            registry,
            txs_delivered_total,
            txs_rejected_total,
            blocks_committed_total,
            block_height,
        })
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}
