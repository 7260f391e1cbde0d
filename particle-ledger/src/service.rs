//! Service facade wiring storage, the accounting core and the actor
//!
//! `Particles::open` is the one entry point a process needs: it opens the
//! database, restores all durable state, and spawns the single-writer actor.
//! Collaborators (rate oracle, asset custody) are injectable so tests and
//! integrations can substitute their own.

use crate::actor::{spawn_particle_actor, ParticleHandle};
use crate::assets::{AssetLedger, InMemoryAssetLedger};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::ParticleLedger;
use crate::metrics::Metrics;
use crate::nucleus::Nucleus;
use crate::oracle::{AccrualOracle, ExchangeRateOracle};
use crate::registry::TypeRegistry;
use crate::storage::{StatePersister, Storage};
use crate::types::HolderId;
use std::sync::Arc;

/// Running particle ledger service
pub struct Particles {
    handle: ParticleHandle,
    metrics: Metrics,
    config: Config,
}

impl Particles {
    /// Open the service with the default collaborators
    ///
    /// Uses the linear accrual oracle from `config.accrual` and a local
    /// in-memory asset book. Production deployments adapt their custody
    /// system through [`open_with`](Self::open_with).
    pub fn open(config: Config) -> Result<Self> {
        let oracle = Arc::new(AccrualOracle::new(&config.accrual));
        let assets = Arc::new(InMemoryAssetLedger::new());
        Self::open_with(config, oracle, assets)
    }

    /// Open the service with injected collaborators, restoring durable state
    pub fn open_with(
        config: Config,
        oracle: Arc<dyn ExchangeRateOracle>,
        assets: Arc<dyn AssetLedger>,
    ) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);

        let nucleus = Nucleus::new(
            oracle,
            assets.clone(),
            HolderId::new(config.custody_id.clone()),
        );
        let mut ledger = ParticleLedger::new(nucleus, assets, &config);

        let particles = storage.load_particles()?;
        let fees = storage.load_fees()?;
        let (pool_balances, pool_total_supply) = storage.load_pool()?;
        let paused = storage.load_paused()?;
        let restored = particles.len();
        ledger.restore(particles, fees, pool_balances, pool_total_supply, paused);

        let mut registry = TypeRegistry::new();
        registry.restore(storage.load_types()?);

        tracing::info!(
            tokens = restored,
            pool_total_supply,
            paused,
            "Particle ledger restored"
        );

        Self::spawn(config, ledger, registry, Some(storage))
    }

    /// Start an ephemeral service without persistence (tests, demos)
    pub fn ephemeral(
        config: Config,
        oracle: Arc<dyn ExchangeRateOracle>,
        assets: Arc<dyn AssetLedger>,
    ) -> Result<Self> {
        config.validate()?;

        let nucleus = Nucleus::new(
            oracle,
            assets.clone(),
            HolderId::new(config.custody_id.clone()),
        );
        let ledger = ParticleLedger::new(nucleus, assets, &config);

        Self::spawn(config, ledger, TypeRegistry::new(), None)
    }

    fn spawn(
        config: Config,
        ledger: ParticleLedger,
        registry: TypeRegistry,
        storage: Option<Arc<dyn StatePersister>>,
    ) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| {
            crate::error::Error::Config(format!("Failed to create metrics: {e}"))
        })?;

        let handle = spawn_particle_actor(
            ledger,
            registry,
            storage,
            metrics.clone(),
            config.mailbox_capacity,
            HolderId::new(config.escrow_id.clone()),
        );

        Ok(Self {
            handle,
            metrics,
            config,
        })
    }

    /// Handle bound to the authorized escrow caller
    pub fn handle(&self) -> &ParticleHandle {
        &self.handle
    }

    /// Service metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Service configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shut the actor down; in-flight messages drain first
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}
