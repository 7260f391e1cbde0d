//! External asset custody collaborator
//!
//! The ledger never holds raw asset balances itself; it moves them through
//! this interface. A production integration adapts the real custody system;
//! the in-memory implementation backs tests and local runs.

use crate::error::{Error, Result};
use crate::types::HolderId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Asset transfer interface
///
/// Failures propagate as the specific taxonomy error; the ledger never
/// retries internally.
pub trait AssetLedger: Send + Sync {
    /// Current balance of an account
    fn balance_of(&self, account: &HolderId) -> u128;

    /// Move `amount` from `from` to `to`, authorized by `spender`
    ///
    /// A spender other than `from` must hold sufficient allowance, which is
    /// consumed by the transfer.
    fn transfer_from(
        &self,
        spender: &HolderId,
        from: &HolderId,
        to: &HolderId,
        amount: u128,
    ) -> Result<()>;
}

#[derive(Default)]
struct AssetBook {
    balances: HashMap<HolderId, u128>,
    // (owner, spender) -> remaining allowance
    allowances: HashMap<(HolderId, HolderId), u128>,
}

/// In-memory asset ledger with ERC-20 style allowances
#[derive(Default)]
pub struct InMemoryAssetLedger {
    book: Mutex<AssetBook>,
}

impl InMemoryAssetLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air (tests and demos only)
    pub fn mint(&self, account: &HolderId, amount: u128) {
        let mut book = self.book.lock();
        let balance = book.balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Grant `spender` an allowance over `owner`'s balance
    pub fn approve(&self, owner: &HolderId, spender: &HolderId, amount: u128) {
        let mut book = self.book.lock();
        book.allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    /// Remaining allowance of (owner, spender)
    pub fn allowance(&self, owner: &HolderId, spender: &HolderId) -> u128 {
        let book = self.book.lock();
        book.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn balance_of(&self, account: &HolderId) -> u128 {
        let book = self.book.lock();
        book.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer_from(
        &self,
        spender: &HolderId,
        from: &HolderId,
        to: &HolderId,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let mut book = self.book.lock();

        // Validate everything before mutating anything; a failed transfer
        // must leave balances and allowances untouched.
        let spent_allowance = if spender != from {
            let key = (from.clone(), spender.clone());
            let allowance = book.allowances.get(&key).copied().unwrap_or(0);
            let remaining = allowance.checked_sub(amount).ok_or_else(|| {
                Error::InsufficientAllowance(format!(
                    "{spender} may spend {allowance} of {from}, requested {amount}"
                ))
            })?;
            Some((key, remaining))
        } else {
            None
        };

        let from_balance = book.balances.get(from).copied().unwrap_or(0);
        let new_from = from_balance.checked_sub(amount).ok_or_else(|| {
            Error::InsufficientAssets(format!("{from} holds {from_balance}, requested {amount}"))
        })?;

        let new_to = if from != to {
            let to_balance = book.balances.get(to).copied().unwrap_or(0);
            let new_to = to_balance
                .checked_add(amount)
                .ok_or_else(|| Error::TransferFailed(format!("{to} balance overflow")))?;
            Some(new_to)
        } else {
            None
        };

        if let Some((key, remaining)) = spent_allowance {
            book.allowances.insert(key, remaining);
        }
        if let Some(new_to) = new_to {
            book.balances.insert(from.clone(), new_from);
            book.balances.insert(to.clone(), new_to);
        }

        tracing::trace!(%spender, %from, %to, amount, "Asset transfer");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(id: &str) -> HolderId {
        HolderId::new(id)
    }

    #[test]
    fn test_self_transfer_needs_no_allowance() {
        let assets = InMemoryAssetLedger::new();
        assets.mint(&holder("alice"), 100);

        assets
            .transfer_from(&holder("alice"), &holder("alice"), &holder("bob"), 40)
            .unwrap();

        assert_eq!(assets.balance_of(&holder("alice")), 60);
        assert_eq!(assets.balance_of(&holder("bob")), 40);
    }

    #[test]
    fn test_third_party_spend_consumes_allowance() {
        let assets = InMemoryAssetLedger::new();
        assets.mint(&holder("alice"), 100);
        assets.approve(&holder("alice"), &holder("escrow"), 50);

        assets
            .transfer_from(&holder("escrow"), &holder("alice"), &holder("pool"), 30)
            .unwrap();

        assert_eq!(assets.allowance(&holder("alice"), &holder("escrow")), 20);
        assert_eq!(assets.balance_of(&holder("pool")), 30);
    }

    #[test]
    fn test_spend_over_allowance_fails() {
        let assets = InMemoryAssetLedger::new();
        assets.mint(&holder("alice"), 100);
        assets.approve(&holder("alice"), &holder("escrow"), 10);

        let result =
            assets.transfer_from(&holder("escrow"), &holder("alice"), &holder("pool"), 30);
        assert!(matches!(result, Err(Error::InsufficientAllowance(_))));

        // Nothing moved
        assert_eq!(assets.balance_of(&holder("alice")), 100);
        assert_eq!(assets.allowance(&holder("alice"), &holder("escrow")), 10);
    }

    #[test]
    fn test_overdraft_fails() {
        let assets = InMemoryAssetLedger::new();
        assets.mint(&holder("alice"), 10);

        let result =
            assets.transfer_from(&holder("alice"), &holder("alice"), &holder("bob"), 11);
        assert!(matches!(result, Err(Error::InsufficientAssets(_))));
    }

    #[test]
    fn test_zero_transfer_is_noop() {
        let assets = InMemoryAssetLedger::new();
        assets
            .transfer_from(&holder("alice"), &holder("alice"), &holder("bob"), 0)
            .unwrap();
        assert_eq!(assets.balance_of(&holder("bob")), 0);
    }
}
