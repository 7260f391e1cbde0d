//! Error types for the particle ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Particle ledger errors
///
/// All accounting errors are non-recoverable at the ledger level: the
/// operation aborts entirely and the specific error is reported to the
/// caller. There is no internal retry.
#[derive(Error, Debug)]
pub enum Error {
    /// Deposit below the protocol-wide minimum floor
    #[error("Insufficient deposit: {0}")]
    InsufficientDeposit(String),

    /// Account cannot cover the asset transfer
    #[error("Insufficient assets: {0}")]
    InsufficientAssets(String),

    /// Spender lacks allowance to move the asset
    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(String),

    /// External asset movement rejected
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Discharge requested on a zero-charge token
    #[error("Insufficient charge: {0}")]
    InsufficientCharge(String),

    /// Requested amount exceeds available charge or pool balance
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Release attempted on an empty token
    #[error("Insufficient mass: {0}")]
    InsufficientMass(String),

    /// Exchange rate source failed
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Caller is not the authorized escrow
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Ledger is paused
    #[error("Ledger is paused")]
    Paused,

    /// Arithmetic overflow in unit conversion
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Particle type already registered
    #[error("Particle type exists: {0}")]
    TypeExists(String),

    /// Particle type not registered
    #[error("Particle type not found: {0}")]
    TypeNotFound(String),

    /// Particle type minted out
    #[error("Max supply reached: {0}")]
    MaxSupplyReached(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
