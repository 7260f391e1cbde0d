//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `particle_energize_total` - Total energize operations applied
//! - `particle_discharge_total` - Total discharge operations applied
//! - `particle_release_total` - Total release operations applied
//! - `particle_op_failures_total` - Total failed operations
//! - `particle_asset_deposited` - Histogram of energized asset amounts
//! - `particle_fees_collected_total` - Interest-unit fees paid out to integrators

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Metrics live in their own registry so multiple ledgers can coexist in
/// one process.
#[derive(Clone)]
pub struct Metrics {
    /// Total energize operations
    pub energize_total: IntCounter,

    /// Total discharge operations
    pub discharge_total: IntCounter,

    /// Total release operations
    pub release_total: IntCounter,

    /// Total failed operations
    pub op_failures_total: IntCounter,

    /// Energized asset amount histogram
    pub asset_deposited: Histogram,

    /// Total fees collected (interest units)
    pub fees_collected_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let energize_total = IntCounter::with_opts(Opts::new(
            "particle_energize_total",
            "Total energize operations applied",
        ))?;
        registry.register(Box::new(energize_total.clone()))?;

        let discharge_total = IntCounter::with_opts(Opts::new(
            "particle_discharge_total",
            "Total discharge operations applied",
        ))?;
        registry.register(Box::new(discharge_total.clone()))?;

        let release_total = IntCounter::with_opts(Opts::new(
            "particle_release_total",
            "Total release operations applied",
        ))?;
        registry.register(Box::new(release_total.clone()))?;

        let op_failures_total = IntCounter::with_opts(Opts::new(
            "particle_op_failures_total",
            "Total failed operations",
        ))?;
        registry.register(Box::new(op_failures_total.clone()))?;

        let asset_deposited = Histogram::with_opts(
            HistogramOpts::new(
                "particle_asset_deposited",
                "Histogram of energized asset amounts",
            )
            .buckets(vec![1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9]),
        )?;
        registry.register(Box::new(asset_deposited.clone()))?;

        let fees_collected_total = IntCounter::with_opts(Opts::new(
            "particle_fees_collected_total",
            "Interest-unit fees paid out to integrators",
        ))?;
        registry.register(Box::new(fees_collected_total.clone()))?;

        Ok(Self {
            energize_total,
            discharge_total,
            release_total,
            op_failures_total,
            asset_deposited,
            fees_collected_total,
            registry,
        })
    }

    /// Record a successful energize
    pub fn record_energize(&self, asset_amount: u128) {
        self.energize_total.inc();
        self.asset_deposited.observe(asset_amount as f64);
    }

    /// Record a successful discharge
    pub fn record_discharge(&self) {
        self.discharge_total.inc();
    }

    /// Record a successful release
    pub fn record_release(&self) {
        self.release_total.inc();
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        self.op_failures_total.inc();
    }

    /// Record fees paid out to an integrator
    pub fn record_fees(&self, interest_amount: u128) {
        self.fees_collected_total
            .inc_by(interest_amount.min(u64::MAX as u128) as u64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
