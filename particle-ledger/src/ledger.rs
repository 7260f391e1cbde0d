//! The particle accounting core
//!
//! Tracks, per token, how much principal ("Mass") was deposited and how much
//! interest-bearing balance backs it, under a shared exchange rate that only
//! increases. Yield ("Charge") can be withdrawn independently of principal;
//! destruction redeems principal plus yield in full.
//!
//! The ledger trusts one authorized caller (the escrow role of the token
//! surface) completely; it performs its own capability check at the start of
//! every mutating operation and reports an error instead of trapping.

use crate::assets::AssetLedger;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::math::{self, Rate};
use crate::nucleus::Nucleus;
use crate::types::{ContractId, FeePolicy, HolderId, ParticleState, TokenUuid};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-token accounting ledger over a shared nucleus pool
pub struct ParticleLedger {
    nucleus: Nucleus,
    assets: Arc<dyn AssetLedger>,

    /// The ledger's own identity: its account in the nucleus pool and the
    /// forwarding account for payouts
    identity: HolderId,

    /// Sole authorized caller of mutating operations
    escrow: HolderId,

    /// Protocol-wide minimum deposit floor (asset units)
    min_deposit: u128,

    /// Fee-on-energize policy
    fee: FeePolicy,

    /// Pausability gate over energize/discharge/release
    paused: bool,

    /// Per-token state; zero is the tombstone, entries are never removed
    particles: HashMap<TokenUuid, ParticleState>,

    /// Interest-bearing fees owed per integrator contract
    fees: HashMap<ContractId, u128>,
}

impl ParticleLedger {
    /// Create an empty ledger over a nucleus pool
    pub fn new(nucleus: Nucleus, assets: Arc<dyn AssetLedger>, config: &Config) -> Self {
        Self {
            nucleus,
            assets,
            identity: HolderId::new(config.ledger_id.clone()),
            escrow: HolderId::new(config.escrow_id.clone()),
            min_deposit: u128::from(config.min_deposit),
            fee: config.fee,
            paused: false,
            particles: HashMap::new(),
            fees: HashMap::new(),
        }
    }

    /// Restore state loaded from storage
    pub fn restore(
        &mut self,
        particles: HashMap<TokenUuid, ParticleState>,
        fees: HashMap<ContractId, u128>,
        pool_balances: HashMap<HolderId, u128>,
        pool_total_supply: u128,
        paused: bool,
    ) {
        self.particles = particles;
        self.fees = fees;
        self.paused = paused;
        self.nucleus.restore(pool_balances, pool_total_supply);
    }

    // Reads (never gated by pause)

    /// Principal deposited into a token, in asset units
    pub fn base_particle_mass(&self, token: TokenUuid) -> u128 {
        self.state(token).mass
    }

    /// Accrued yield of a token, in asset units
    ///
    /// Converts the token's interest balance at the current rate and
    /// subtracts the mass. A negative difference (possible transiently
    /// right after energizing, or from rounding) is clamped to zero by
    /// policy; negative charge is meaningless and must never underflow.
    pub fn current_particle_charge(&self, token: TokenUuid) -> Result<u128> {
        let state = self.state(token);
        let value = self.nucleus.to_asset(state.interest)?;
        Ok(math::clamped_sub(value, state.mass))
    }

    /// Full per-token state
    pub fn particle_state(&self, token: TokenUuid) -> ParticleState {
        self.state(token)
    }

    /// Interest-bearing fees collected for an integrator contract
    pub fn collected_fees(&self, contract: &ContractId) -> u128 {
        self.fees.get(contract).copied().unwrap_or(0)
    }

    /// Whether mutating operations are paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The nucleus pool backing this ledger
    pub fn nucleus(&self) -> &Nucleus {
        &self.nucleus
    }

    /// The ledger's pool identity
    pub fn identity(&self) -> &HolderId {
        &self.identity
    }

    // Mutations

    /// Deposit asset into a token, increasing its mass
    ///
    /// Pulls `asset_amount` from `depositor` (who must have approved the
    /// ledger), deposits it into the nucleus under the ledger's identity,
    /// and books the measured interest delta against the token. The delta is
    /// taken as the pre/post nucleus balance difference so any rounding the
    /// nucleus performs is absorbed, never recomputed independently.
    /// Repeated calls accumulate additively. Returns the interest credited
    /// to the token after fees.
    ///
    /// The rate is read once, before any asset moves, and reused for the
    /// whole operation: an unavailable oracle or an overflowing conversion
    /// fails the energize with nothing transferred.
    pub fn energize_particle(
        &mut self,
        caller: &HolderId,
        depositor: &HolderId,
        contract: &ContractId,
        token: TokenUuid,
        asset_amount: u128,
    ) -> Result<u128> {
        self.gate_mutation(caller)?;

        let state = self.state(token);
        let new_mass = state.mass.checked_add(asset_amount).ok_or_else(|| {
            Error::AmountOverflow(format!("mass of token {token}"))
        })?;
        if new_mass < self.min_deposit {
            return Err(Error::InsufficientDeposit(format!(
                "{new_mass} below minimum {min}",
                min = self.min_deposit
            )));
        }

        // Every fallible conversion runs before the first transfer. The
        // expected credit bounds the measured delta, so the bookings below
        // cannot overflow after assets have moved.
        let rate = self.nucleus.current_rate()?;
        let expected = math::to_interest_floor(asset_amount, rate)?;
        let fee_interest = self.energize_fee_interest(asset_amount, rate)?;
        state.interest.checked_add(expected).ok_or_else(|| {
            Error::AmountOverflow(format!("interest of token {token}"))
        })?;
        self.collected_fees(contract)
            .checked_add(fee_interest)
            .ok_or_else(|| Error::AmountOverflow(format!("collected fees of {contract}")))?;

        // Collect the deposit into the ledger's own custody first; the
        // nucleus only accepts a depositor's own assets.
        self.assets
            .transfer_from(&self.identity, depositor, &self.identity, asset_amount)?;

        let pre = self.nucleus.interest_balance(&self.identity);
        self.nucleus
            .deposit_asset_at(&self.identity, asset_amount, rate)?;
        let post = self.nucleus.interest_balance(&self.identity);
        let delta = post.saturating_sub(pre);

        // The fee is clamped to the measured delta: the booked credit never
        // goes negative during fee deduction.
        let fee = fee_interest.min(delta);
        let credited = delta - fee;
        if fee > 0 {
            let entry = self.fees.entry(contract.clone()).or_insert(0);
            *entry = entry.saturating_add(fee);
        }

        let entry = self.particles.entry(token).or_default();
        entry.mass = new_mass;
        entry.interest = entry.interest.saturating_add(credited);

        tracing::info!(
            %token,
            %depositor,
            asset_amount,
            credited,
            mass = new_mass,
            "Particle energized"
        );

        Ok(credited)
    }

    /// Withdraw the full current charge of a token
    pub fn discharge_particle(
        &mut self,
        caller: &HolderId,
        receiver: &HolderId,
        token: TokenUuid,
    ) -> Result<(u128, u128)> {
        self.gate_mutation(caller)?;
        let charge = self.current_particle_charge(token)?;
        self.discharge_inner(receiver, token, charge, charge)
    }

    /// Withdraw up to a caller-specified amount of a token's charge
    pub fn discharge_particle_amount(
        &mut self,
        caller: &HolderId,
        receiver: &HolderId,
        token: TokenUuid,
        asset_amount: u128,
    ) -> Result<(u128, u128)> {
        self.gate_mutation(caller)?;
        let charge = self.current_particle_charge(token)?;
        self.discharge_inner(receiver, token, asset_amount, charge)
    }

    /// Destroy-side redemption: pay out the entire backing balance
    ///
    /// Pays mass plus all accrued charge, converted to asset units, and
    /// zeroes the token's state. The token surface must burn the token in
    /// the same atomic unit of execution; here that unit is the single
    /// writer applying this operation, and a released token has zero mass,
    /// so a second release fails with `InsufficientMass`.
    pub fn release_particle(
        &mut self,
        caller: &HolderId,
        receiver: &HolderId,
        token: TokenUuid,
    ) -> Result<u128> {
        self.gate_mutation(caller)?;

        let state = self.state(token);
        if state.mass == 0 {
            return Err(Error::InsufficientMass(format!(
                "token {token} has no principal to release"
            )));
        }

        let asset_out =
            self.nucleus
                .withdraw_interest(&self.identity, &self.identity, state.interest)?;
        self.assets
            .transfer_from(&self.identity, &self.identity, receiver, asset_out)?;

        self.particles.insert(token, ParticleState::default());

        tracing::info!(%token, %receiver, asset_out, "Particle released");

        Ok(asset_out)
    }

    /// Pay out an integrator's collected fees, resetting them to zero
    ///
    /// Fees are held in interest units and paid in asset units. A zero
    /// balance is a no-op success. Allowed while paused.
    pub fn withdraw_fees(
        &mut self,
        caller: &HolderId,
        contract: &ContractId,
        receiver: &HolderId,
    ) -> Result<u128> {
        self.gate_caller(caller)?;

        let amount = self.collected_fees(contract);
        if amount == 0 {
            return Ok(0);
        }

        let asset_out = self
            .nucleus
            .withdraw_interest(&self.identity, &self.identity, amount)?;
        self.assets
            .transfer_from(&self.identity, &self.identity, receiver, asset_out)?;

        self.fees.insert(contract.clone(), 0);

        tracing::info!(%contract, %receiver, withdrawn = amount, asset_out, "Fees withdrawn");

        Ok(amount)
    }

    /// Pause or resume mutating operations
    pub fn set_paused(&mut self, caller: &HolderId, paused: bool) -> Result<()> {
        self.gate_caller(caller)?;
        self.paused = paused;
        tracing::info!(paused, "Ledger pause state changed");
        Ok(())
    }

    // Internals

    fn state(&self, token: TokenUuid) -> ParticleState {
        self.particles.get(&token).copied().unwrap_or_default()
    }

    fn gate_caller(&self, caller: &HolderId) -> Result<()> {
        if caller != &self.escrow {
            return Err(Error::Unauthorized(format!(
                "{caller} is not the escrow"
            )));
        }
        Ok(())
    }

    fn gate_mutation(&self, caller: &HolderId) -> Result<()> {
        self.gate_caller(caller)?;
        if self.paused {
            return Err(Error::Paused);
        }
        Ok(())
    }

    /// Interest-unit fee a deposit of `asset_amount` owes under the policy
    ///
    /// The fee is computed on the asset amount and converted down to
    /// interest units at the operation's rate.
    fn energize_fee_interest(&self, asset_amount: u128, rate: Rate) -> Result<u128> {
        let bps = match self.fee {
            FeePolicy::None => return Ok(0),
            FeePolicy::BasisPoints { bps } => bps,
        };

        let fee_asset = math::basis_points(asset_amount, bps)?;
        math::to_interest_floor(fee_asset, rate)
    }

    /// Shared discharge path
    ///
    /// `charge` is the pre-siphon charge estimate; the remaining charge in
    /// the return value is `charge - received`, NOT recomputed from ledger
    /// state afterwards. The two can diverge infinitesimally due to
    /// rounding; the snapshot formula is the documented behavior.
    ///
    /// A zero-charge token reports `InsufficientCharge` before any amount
    /// comparison: asking for 5 of nothing is a charge problem, not a
    /// balance problem.
    fn discharge_inner(
        &mut self,
        receiver: &HolderId,
        token: TokenUuid,
        asset_amount: u128,
        charge: u128,
    ) -> Result<(u128, u128)> {
        if charge == 0 {
            return Err(Error::InsufficientCharge(format!(
                "token {token} has no accrued charge"
            )));
        }
        if asset_amount > charge {
            return Err(Error::InsufficientBalance(format!(
                "token {token} charge is {charge}, requested {asset_amount}"
            )));
        }

        let consumed =
            self.nucleus
                .withdraw_asset(&self.identity, &self.identity, asset_amount)?;

        let state = self.state(token);
        let remaining_interest = state.interest.checked_sub(consumed).ok_or_else(|| {
            Error::InsufficientBalance(format!(
                "token {token} backing {backing} below consumed {consumed}",
                backing = state.interest
            ))
        })?;

        self.assets
            .transfer_from(&self.identity, &self.identity, receiver, asset_amount)?;

        self.particles.insert(
            token,
            ParticleState {
                mass: state.mass,
                interest: remaining_interest,
            },
        );

        let received = asset_amount;
        let remaining = charge - received;

        tracing::info!(%token, %receiver, received, remaining, consumed, "Particle discharged");

        Ok((received, remaining))
    }
}
