//! Configuration for the particle ledger

use crate::types::FeePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Particle ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// Sole authorized caller of mutating operations (the token surface)
    pub escrow_id: String,

    /// The ledger's own identity in the nucleus pool
    pub ledger_id: String,

    /// Custody account holding pooled assets
    pub custody_id: String,

    /// Protocol-wide minimum deposit floor (asset units);
    /// `energize` requires `amount + existing_mass >= min_deposit`
    pub min_deposit: u64,

    /// Fee-on-energize policy
    pub fee: FeePolicy,

    /// Exchange rate accrual configuration
    pub accrual: AccrualConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Actor mailbox capacity (bounded for backpressure)
    pub mailbox_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/particles"),
            service_name: "particle-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
            escrow_id: "token-surface".to_string(),
            ledger_id: "particle-ledger".to_string(),
            custody_id: "nucleus-custody".to_string(),
            min_deposit: 1_000_000,
            fee: FeePolicy::None,
            accrual: AccrualConfig::default(),
            rocksdb: RocksDbConfig::default(),
            mailbox_capacity: 1000,
        }
    }
}

/// Exchange rate accrual configuration
///
/// The rate starts at `base_rate` (scaled by 10^18) and grows by
/// `rate_per_second` every second, finalized lazily on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Initial rate, scaled by 10^18 (10^18 == 1.0)
    pub base_rate: u64,

    /// Per-second rate growth, scaled by 10^18
    pub rate_per_second: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            base_rate: 1_000_000_000_000_000_000, // 1.0
            rate_per_second: 1_000_000_000,       // ~3.2% APR
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("PARTICLE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("PARTICLE_METRICS_ADDR") {
            config.metrics_listen_addr = addr;
        }

        if let Ok(escrow) = std::env::var("PARTICLE_ESCROW_ID") {
            config.escrow_id = escrow;
        }

        if let Ok(min_deposit) = std::env::var("PARTICLE_MIN_DEPOSIT") {
            config.min_deposit = min_deposit
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid PARTICLE_MIN_DEPOSIT: {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> crate::Result<()> {
        self.fee.validate()?;
        if self.accrual.base_rate == 0 {
            return Err(crate::Error::Config(
                "base_rate must be non-zero".to_string(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
