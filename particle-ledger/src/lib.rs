//! Particle Ledger
//!
//! Yield accounting for tokens ("particles") whose deposits are pooled in a
//! shared interest-bearing reserve (the "nucleus"). Each token tracks its
//! deposited principal ("mass") and an interest-bearing backing balance;
//! yield ("charge") is the appreciation of that backing over the principal
//! under a monotonically increasing exchange rate.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor task serializes every mutation
//! - **Shared Pool**: One nucleus balance backs all tokens of a ledger
//! - **Unsigned Fixed Point**: u128 amounts, rate scaled by 10^18
//! - **Atomic Persistence**: Each operation commits one RocksDB batch
//!
//! # Invariants
//!
//! - The exchange rate never decreases
//! - Charge is clamped at zero, never negative
//! - Rounding always favors the pool: deposits credit down, withdrawals
//!   consume up, but a receiver never gets less asset than requested

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod actor;
pub mod assets;
pub mod config;
pub mod error;
pub mod ledger;
pub mod math;
pub mod metrics;
pub mod nucleus;
pub mod oracle;
pub mod registry;
pub mod service;
pub mod storage;
pub mod types;

// Re-exports
pub use actor::ParticleHandle;
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::ParticleLedger;
pub use math::{Rate, RATE_SCALE};
pub use nucleus::Nucleus;
pub use registry::TypeRegistry;
pub use service::Particles;
pub use types::{
    AccessPolicy, ContractId, FeePolicy, HolderId, ParticleState, ParticleTypeSpec, TokenUuid,
};
