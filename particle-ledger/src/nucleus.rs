//! Nucleus: the shared Asset ↔ Interest-bearing pool
//!
//! A single pool converts between asset units and interest-bearing units
//! for depositor identities, and physically moves the underlying asset
//! with the external custody system. Balances are keyed by the identity
//! that deposited, never by token, so every withdrawal must be made by
//! the identity being debited.

use crate::assets::AssetLedger;
use crate::error::{Error, Result};
use crate::math::{self, Rate};
use crate::oracle::ExchangeRateOracle;
use crate::types::HolderId;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared interest-bearing pool
pub struct Nucleus {
    oracle: Arc<dyn ExchangeRateOracle>,
    assets: Arc<dyn AssetLedger>,

    /// Account holding the pooled underlying asset
    custody: HolderId,

    /// Interest-bearing balance per depositor identity
    balances: HashMap<HolderId, u128>,

    /// Total interest-bearing units outstanding
    total_supply: u128,
}

impl Nucleus {
    /// Create an empty pool
    pub fn new(
        oracle: Arc<dyn ExchangeRateOracle>,
        assets: Arc<dyn AssetLedger>,
        custody: HolderId,
    ) -> Self {
        Self {
            oracle,
            assets,
            custody,
            balances: HashMap::new(),
            total_supply: 0,
        }
    }

    /// Restore pool balances loaded from storage
    pub fn restore(&mut self, balances: HashMap<HolderId, u128>, total_supply: u128) {
        self.balances = balances;
        self.total_supply = total_supply;
    }

    /// Current exchange rate, refreshed by the oracle
    pub fn current_rate(&self) -> Result<Rate> {
        self.oracle.current_rate()
    }

    /// Deposit asset and credit the caller's interest-bearing balance
    ///
    /// The caller must be the true asset holder: the pool only ever pulls
    /// the caller's own assets, so a stale third-party approval can never
    /// be spent on someone else's behalf. The credit rounds down; the pool
    /// keeps the dust.
    pub fn deposit_asset(&mut self, caller: &HolderId, asset_amount: u128) -> Result<u128> {
        let rate = self.oracle.current_rate()?;
        self.deposit_asset_at(caller, asset_amount, rate)
    }

    /// Deposit at a caller-supplied rate
    ///
    /// For operations that read the rate once up front and must convert at
    /// that same rate. Every fallible step precedes the asset transfer, so
    /// a failed deposit moves nothing.
    pub fn deposit_asset_at(
        &mut self,
        caller: &HolderId,
        asset_amount: u128,
        rate: Rate,
    ) -> Result<u128> {
        let interest = math::to_interest_floor(asset_amount, rate)?;

        let balance = self.balances.get(caller).copied().unwrap_or(0);
        let new_balance = balance
            .checked_add(interest)
            .ok_or_else(|| Error::AmountOverflow(format!("pool balance of {caller}")))?;
        let new_supply = self
            .total_supply
            .checked_add(interest)
            .ok_or_else(|| Error::AmountOverflow("pool total supply".to_string()))?;

        self.assets
            .transfer_from(caller, caller, &self.custody, asset_amount)?;

        self.balances.insert(caller.clone(), new_balance);
        self.total_supply = new_supply;

        tracing::debug!(%caller, asset_amount, interest, rate = %rate, "Nucleus deposit");

        Ok(interest)
    }

    /// Withdraw an exact asset amount, consuming interest units rounded up
    ///
    /// The receiver never gets less than requested; the round-up cost falls
    /// on the identity's pooled balance. Returns the interest consumed.
    pub fn withdraw_asset(
        &mut self,
        caller: &HolderId,
        identity: &HolderId,
        asset_amount: u128,
    ) -> Result<u128> {
        self.authorize(caller, identity)?;

        let rate = self.oracle.current_rate()?;
        let needed = math::to_interest_ceil(asset_amount, rate)?;

        // The custody payout settles before the balance moves; a failed
        // transfer (custody underfunded) leaves the pool untouched.
        let remaining = self.prepare_debit(identity, needed)?;
        self.assets
            .transfer_from(&self.custody, &self.custody, caller, asset_amount)?;
        self.apply_debit(identity, remaining, needed);

        tracing::debug!(%identity, asset_amount, consumed = needed, rate = %rate, "Nucleus asset withdrawal");

        Ok(needed)
    }

    /// Withdraw an exact interest amount, releasing asset rounded down
    ///
    /// Returns the asset amount released to the caller.
    pub fn withdraw_interest(
        &mut self,
        caller: &HolderId,
        identity: &HolderId,
        interest_amount: u128,
    ) -> Result<u128> {
        self.authorize(caller, identity)?;

        let rate = self.oracle.current_rate()?;
        let asset = math::to_asset_floor(interest_amount, rate)?;

        let remaining = self.prepare_debit(identity, interest_amount)?;
        self.assets
            .transfer_from(&self.custody, &self.custody, caller, asset)?;
        self.apply_debit(identity, remaining, interest_amount);

        tracing::debug!(%identity, interest_amount, released = asset, rate = %rate, "Nucleus interest withdrawal");

        Ok(asset)
    }

    /// Convert interest units to asset units at the current rate (round down)
    pub fn to_asset(&self, interest_amount: u128) -> Result<u128> {
        let rate = self.oracle.current_rate()?;
        math::to_asset_floor(interest_amount, rate)
    }

    /// Convert asset units to interest units at the current rate (round up)
    pub fn to_interest(&self, asset_amount: u128) -> Result<u128> {
        let rate = self.oracle.current_rate()?;
        math::to_interest_ceil(asset_amount, rate)
    }

    /// Asset-unit value of an identity's pooled balance
    pub fn asset_balance(&self, identity: &HolderId) -> Result<u128> {
        self.to_asset(self.interest_balance(identity))
    }

    /// Interest-bearing balance of an identity
    pub fn interest_balance(&self, identity: &HolderId) -> u128 {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    /// Total interest-bearing units outstanding
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balances are keyed by caller; only the debited identity may withdraw
    fn authorize(&self, caller: &HolderId, identity: &HolderId) -> Result<()> {
        if caller != identity {
            return Err(Error::Unauthorized(format!(
                "{caller} may not debit pooled balance of {identity}"
            )));
        }
        Ok(())
    }

    /// Validate a debit without applying it, returning the new balance
    fn prepare_debit(&self, identity: &HolderId, interest_amount: u128) -> Result<u128> {
        let balance = self.balances.get(identity).copied().unwrap_or(0);
        balance.checked_sub(interest_amount).ok_or_else(|| {
            Error::InsufficientBalance(format!(
                "{identity} holds {balance} interest units, requested {interest_amount}"
            ))
        })
    }

    fn apply_debit(&mut self, identity: &HolderId, remaining: u128, interest_amount: u128) {
        self.balances.insert(identity.clone(), remaining);
        // Supply shrinks together with the balance; both debits land or
        // neither does.
        self.total_supply = self.total_supply.saturating_sub(interest_amount);
    }
}
