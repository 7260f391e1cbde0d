//! Core types for the particle ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (unsigned fixed-point integers for amounts)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a minted particle (not a type identifier)
///
/// Immutable once minted; never reused after destruction.
pub type TokenUuid = Uuid;

/// Holder identity (user account, escrow, pool custody)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(String);

impl HolderId {
    /// Create new holder ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External token contract identity, used to key collected fees
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(String);

impl ContractId {
    /// Create new contract ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-token accounting state
///
/// `mass` is the cumulative principal (asset units) energized into the
/// token, net of full release. `interest` is the interest-bearing-unit
/// balance backing the token. Both are non-negative by construction; zero
/// is the tombstone, entries are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticleState {
    /// Principal in asset units ("Mass")
    pub mass: u128,

    /// Backing balance in interest-bearing units
    pub interest: u128,
}

impl ParticleState {
    /// True if the particle holds neither principal nor backing balance
    pub fn is_empty(&self) -> bool {
        self.mass == 0 && self.interest == 0
    }
}

/// Fee-on-energize policy
///
/// The pooled-escrow deployment takes no minting fee; the per-contract
/// deployment diverts a basis-points share of the credited interest into
/// the integrator's collected fees. One code path, selected by config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeePolicy {
    /// No fee on energize
    None,
    /// Divert `bps` basis points of the credited interest (max 10_000)
    BasisPoints {
        /// Fee share in basis points
        bps: u32,
    },
}

impl FeePolicy {
    /// Validate policy bounds
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            FeePolicy::None => Ok(()),
            FeePolicy::BasisPoints { bps } if *bps <= 10_000 => Ok(()),
            FeePolicy::BasisPoints { bps } => Err(crate::Error::Config(format!(
                "fee basis points out of range: {bps}"
            ))),
        }
    }
}

/// Who may mint particles of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessPolicy {
    /// Anyone may mint
    Public = 1,
    /// Only the type creator may mint
    CreatorOnly = 2,
}

/// Registered particle type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleTypeSpec {
    /// Type identifier (not a token UUID)
    pub type_id: Uuid,

    /// Account that registered the type
    pub creator: HolderId,

    /// Minimum asset funding a mint of this type must carry
    pub required_funding: u128,

    /// Maximum number of particles of this type
    pub max_supply: u64,

    /// Particles minted so far (burns decrement)
    pub minted: u64,

    /// Mint access policy
    pub access: AccessPolicy,
}

impl ParticleTypeSpec {
    /// True if no further particle of this type may be minted
    pub fn minted_out(&self) -> bool {
        self.minted >= self.max_supply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_state_empty() {
        let state = ParticleState::default();
        assert!(state.is_empty());

        let state = ParticleState {
            mass: 10,
            interest: 0,
        };
        assert!(!state.is_empty());
    }

    #[test]
    fn test_fee_policy_validation() {
        assert!(FeePolicy::None.validate().is_ok());
        assert!(FeePolicy::BasisPoints { bps: 50 }.validate().is_ok());
        assert!(FeePolicy::BasisPoints { bps: 10_000 }.validate().is_ok());
        assert!(FeePolicy::BasisPoints { bps: 10_001 }.validate().is_err());
    }

    #[test]
    fn test_type_spec_minted_out() {
        let mut spec = ParticleTypeSpec {
            type_id: Uuid::new_v4(),
            creator: HolderId::new("creator-1"),
            required_funding: 100,
            max_supply: 2,
            minted: 1,
            access: AccessPolicy::Public,
        };
        assert!(!spec.minted_out());

        spec.minted = 2;
        assert!(spec.minted_out());
    }
}
