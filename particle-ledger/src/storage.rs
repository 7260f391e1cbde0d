//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `particles` - per-token accounting state (key: token uuid)
//! - `fees` - collected integrator fees (key: contract id)
//! - `pool` - nucleus balances per identity (key: holder id)
//! - `types` - registered particle types (key: type uuid)
//! - `meta` - pool total supply, pause flag
//!
//! Each ledger operation commits all of its writes in a single `WriteBatch`
//! so the durable state moves between consistent snapshots only.

use crate::{
    error::{Error, Result},
    types::{ContractId, HolderId, ParticleState, ParticleTypeSpec, TokenUuid},
    Config,
};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_PARTICLES: &str = "particles";
const CF_FEES: &str = "fees";
const CF_POOL: &str = "pool";
const CF_TYPES: &str = "types";
const CF_META: &str = "meta";

const META_TOTAL_SUPPLY: &[u8] = b"total_supply";
const META_PAUSED: &[u8] = b"paused";

/// Writes produced by a single ledger operation, committed atomically
#[derive(Debug, Default)]
pub struct StateBatch {
    /// Token states to persist
    pub particles: Vec<(TokenUuid, ParticleState)>,
    /// Fee balances to persist
    pub fees: Vec<(ContractId, u128)>,
    /// Pool balances to persist
    pub pool: Vec<(HolderId, u128)>,
    /// New pool total supply, if changed
    pub total_supply: Option<u128>,
    /// New pause flag, if changed
    pub paused: Option<bool>,
    /// Type specs to persist
    pub types: Vec<ParticleTypeSpec>,
}

impl StateBatch {
    /// True if the batch carries no writes
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
            && self.fees.is_empty()
            && self.pool.is_empty()
            && self.total_supply.is_none()
            && self.paused.is_none()
            && self.types.is_empty()
    }
}

/// Durable sink for one operation's writes
///
/// The actor persists through this seam; tests substitute failing doubles.
pub trait StatePersister: Send + Sync {
    /// Commit one operation's writes atomically
    fn commit(&self, batch: StateBatch) -> Result<()>;
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl StatePersister for Storage {
    fn commit(&self, batch: StateBatch) -> Result<()> {
        Storage::commit(self, batch)
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_PARTICLES, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_FEES, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_POOL, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_TYPES, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_state()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Small, frequently rewritten values; favor read speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {name} not found")))
    }

    /// Commit one operation's writes atomically
    pub fn commit(&self, batch: StateBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut write = WriteBatch::default();

        let cf_particles = self.cf_handle(CF_PARTICLES)?;
        for (token, state) in &batch.particles {
            write.put_cf(&cf_particles, token.as_bytes(), bincode::serialize(state)?);
        }

        let cf_fees = self.cf_handle(CF_FEES)?;
        for (contract, amount) in &batch.fees {
            write.put_cf(&cf_fees, contract.as_str().as_bytes(), bincode::serialize(amount)?);
        }

        let cf_pool = self.cf_handle(CF_POOL)?;
        for (identity, balance) in &batch.pool {
            write.put_cf(&cf_pool, identity.as_str().as_bytes(), bincode::serialize(balance)?);
        }

        let cf_types = self.cf_handle(CF_TYPES)?;
        for spec in &batch.types {
            write.put_cf(&cf_types, spec.type_id.as_bytes(), bincode::serialize(spec)?);
        }

        let cf_meta = self.cf_handle(CF_META)?;
        if let Some(total_supply) = batch.total_supply {
            write.put_cf(&cf_meta, META_TOTAL_SUPPLY, bincode::serialize(&total_supply)?);
        }
        if let Some(paused) = batch.paused {
            write.put_cf(&cf_meta, META_PAUSED, bincode::serialize(&paused)?);
        }

        self.db.write(write)?;

        Ok(())
    }

    /// Load all token states
    pub fn load_particles(&self) -> Result<HashMap<TokenUuid, ParticleState>> {
        let cf = self.cf_handle(CF_PARTICLES)?;
        let mut particles = HashMap::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let token = uuid_from_key(&key)?;
            let state: ParticleState = bincode::deserialize(&value)?;
            particles.insert(token, state);
        }

        Ok(particles)
    }

    /// Load all collected fee balances
    pub fn load_fees(&self) -> Result<HashMap<ContractId, u128>> {
        let cf = self.cf_handle(CF_FEES)?;
        let mut fees = HashMap::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let contract = ContractId::new(string_from_key(&key)?);
            let amount: u128 = bincode::deserialize(&value)?;
            fees.insert(contract, amount);
        }

        Ok(fees)
    }

    /// Load pool balances and total supply
    pub fn load_pool(&self) -> Result<(HashMap<HolderId, u128>, u128)> {
        let cf = self.cf_handle(CF_POOL)?;
        let mut balances = HashMap::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let identity = HolderId::new(string_from_key(&key)?);
            let balance: u128 = bincode::deserialize(&value)?;
            balances.insert(identity, balance);
        }

        let cf_meta = self.cf_handle(CF_META)?;
        let total_supply = match self.db.get_cf(&cf_meta, META_TOTAL_SUPPLY)? {
            Some(value) => bincode::deserialize(&value)?,
            None => 0,
        };

        Ok((balances, total_supply))
    }

    /// Load registered particle types
    pub fn load_types(&self) -> Result<HashMap<Uuid, ParticleTypeSpec>> {
        let cf = self.cf_handle(CF_TYPES)?;
        let mut types = HashMap::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let spec: ParticleTypeSpec = bincode::deserialize(&value)?;
            types.insert(spec.type_id, spec);
        }

        Ok(types)
    }

    /// Load the pause flag
    pub fn load_paused(&self) -> Result<bool> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(&cf, META_PAUSED)? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(false),
        }
    }
}

fn uuid_from_key(key: &[u8]) -> Result<Uuid> {
    let bytes: [u8; 16] = key
        .try_into()
        .map_err(|_| Error::Storage(format!("malformed uuid key of length {}", key.len())))?;
    Ok(Uuid::from_bytes(bytes))
}

fn string_from_key(key: &[u8]) -> Result<String> {
    String::from_utf8(key.to_vec()).map_err(|e| Error::Storage(format!("malformed key: {e}")))
}
