//! Particle type registry
//!
//! Maps a token type to its required funding, supply cap, creator and mint
//! access policy. Higher-level mint/burn flows consult the registry; the
//! accounting ledger itself never does.

use crate::error::{Error, Result};
use crate::types::{AccessPolicy, HolderId, ParticleTypeSpec};
use std::collections::HashMap;
use uuid::Uuid;

/// Registry of particle types
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<Uuid, ParticleTypeSpec>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore registry state loaded from storage
    pub fn restore(&mut self, types: HashMap<Uuid, ParticleTypeSpec>) {
        self.types = types;
    }

    /// Register a new particle type
    pub fn register_type(
        &mut self,
        creator: HolderId,
        type_id: Uuid,
        required_funding: u128,
        max_supply: u64,
        access: AccessPolicy,
    ) -> Result<()> {
        if self.types.contains_key(&type_id) {
            return Err(Error::TypeExists(type_id.to_string()));
        }

        let spec = ParticleTypeSpec {
            type_id,
            creator: creator.clone(),
            required_funding,
            max_supply,
            minted: 0,
            access,
        };
        self.types.insert(type_id, spec);

        tracing::info!(%type_id, %creator, required_funding, max_supply, "Particle type registered");

        Ok(())
    }

    /// Look up a registered type
    pub fn get_type(&self, type_id: Uuid) -> Result<&ParticleTypeSpec> {
        self.types
            .get(&type_id)
            .ok_or_else(|| Error::TypeNotFound(type_id.to_string()))
    }

    /// Authorize a mint of the given type, incrementing the supply counter
    ///
    /// Checks access policy, the funding floor of the type, and the supply
    /// cap. The counter only advances when every check passes.
    pub fn authorize_mint(
        &mut self,
        type_id: Uuid,
        minter: &HolderId,
        funding: u128,
    ) -> Result<&ParticleTypeSpec> {
        let spec = self
            .types
            .get_mut(&type_id)
            .ok_or_else(|| Error::TypeNotFound(type_id.to_string()))?;

        if spec.access == AccessPolicy::CreatorOnly && minter != &spec.creator {
            return Err(Error::Unauthorized(format!(
                "{minter} may not mint creator-only type {type_id}"
            )));
        }

        if funding < spec.required_funding {
            return Err(Error::InsufficientDeposit(format!(
                "type {type_id} requires {required}, offered {funding}",
                required = spec.required_funding
            )));
        }

        if spec.minted_out() {
            return Err(Error::MaxSupplyReached(format!(
                "type {type_id} capped at {max}",
                max = spec.max_supply
            )));
        }

        spec.minted += 1;
        Ok(spec)
    }

    /// Record a burn of the given type, decrementing the supply counter
    pub fn record_burn(&mut self, type_id: Uuid) -> Result<()> {
        let spec = self
            .types
            .get_mut(&type_id)
            .ok_or_else(|| Error::TypeNotFound(type_id.to_string()))?;
        spec.minted = spec.minted.saturating_sub(1);
        Ok(())
    }

    /// All registered types (for persistence)
    pub fn types(&self) -> &HashMap<Uuid, ParticleTypeSpec> {
        &self.types
    }
}
