//! Property-based tests for particle accounting invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Charge is exactly zero right after an energize at a stable rate
//! - Charge never decreases as the exchange rate rises
//! - Release pays out at least the deposited mass
//! - Withdrawal rounding never shortchanges the receiver

use particle_ledger::{
    assets::{AssetLedger, InMemoryAssetLedger},
    math::{self, Rate, RATE_SCALE},
    oracle::ManualOracle,
    types::{ContractId, HolderId},
    Config, FeePolicy, Particles,
};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

const MIN_DEPOSIT: u128 = 100;

/// Strategy for deposit amounts above the configured floor
fn amount_strategy() -> impl Strategy<Value = u128> {
    MIN_DEPOSIT..1_000_000u128
}

/// Strategy for exchange rates at or above 1.0, up to 10x
fn rate_strategy() -> impl Strategy<Value = Rate> {
    (RATE_SCALE..10 * RATE_SCALE).prop_map(Rate::from_scaled)
}

struct TestService {
    service: Particles,
    oracle: Arc<ManualOracle>,
    assets: Arc<InMemoryAssetLedger>,
    alice: HolderId,
    contract: ContractId,
}

/// Create an ephemeral service with a funded depositor
///
/// The custody account is over-funded so appreciated withdrawals always
/// clear, standing in for the external yield source's earnings.
fn create_test_service(fee: FeePolicy) -> TestService {
    let mut config = Config::default();
    config.min_deposit = MIN_DEPOSIT as u64;
    config.fee = fee;

    let oracle = Arc::new(ManualOracle::new(Rate::ONE));
    let assets = Arc::new(InMemoryAssetLedger::new());

    let alice = HolderId::new("alice");
    assets.mint(&alice, 1_000_000_000_000);
    assets.approve(
        &alice,
        &HolderId::new(config.ledger_id.clone()),
        1_000_000_000_000,
    );
    assets.mint(&HolderId::new(config.custody_id.clone()), 1_000_000_000_000);

    let service = Particles::ephemeral(config, oracle.clone(), assets.clone()).unwrap();

    TestService {
        service,
        oracle,
        assets,
        alice,
        contract: ContractId::new("nft-surface"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: charge is exactly zero right after energizing at a stable rate
    #[test]
    fn prop_charge_zero_after_energize(amount in amount_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();

            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await
                .unwrap();

            prop_assert_eq!(t.service.handle().mass(token).await.unwrap(), amount);
            prop_assert_eq!(t.service.handle().charge(token).await.unwrap(), 0);

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: charge never decreases as the exchange rate rises
    #[test]
    fn prop_charge_monotone_in_rate(
        amount in amount_strategy(),
        steps in prop::collection::vec(1u128..RATE_SCALE / 10, 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();

            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await
                .unwrap();

            let mut last_charge = t.service.handle().charge(token).await.unwrap();
            let mut scaled = RATE_SCALE;
            for step in steps {
                scaled += step;
                t.oracle.set_rate(Rate::from_scaled(scaled)).unwrap();

                let charge = t.service.handle().charge(token).await.unwrap();
                prop_assert!(charge >= last_charge);
                last_charge = charge;
            }

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: release pays out at least the deposited mass
    #[test]
    fn prop_release_pays_at_least_mass(amount in amount_strategy(), rate in rate_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();
            let receiver = HolderId::new("receiver");

            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await
                .unwrap();
            t.oracle.set_rate(rate).unwrap();

            let paid = t
                .service
                .handle()
                .release(receiver.clone(), token)
                .await
                .unwrap();
            prop_assert!(paid >= amount);
            prop_assert_eq!(t.assets.balance_of(&receiver), paid);

            // A released token has nothing left to release
            let again = t.service.handle().release(receiver, token).await;
            prop_assert!(again.is_err());

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: partial discharge delivers exactly the requested amount
    /// and never exceeds the current charge
    #[test]
    fn prop_discharge_amount_exact(amount in amount_strategy(), rate in rate_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();
            let receiver = HolderId::new("receiver");

            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await
                .unwrap();
            t.oracle.set_rate(rate).unwrap();

            let charge = t.service.handle().charge(token).await.unwrap();
            prop_assume!(charge >= 2);
            let requested = charge / 2;

            let (received, remaining) = t
                .service
                .handle()
                .discharge_amount(receiver.clone(), token, requested)
                .await
                .unwrap();
            prop_assert_eq!(received, requested);
            prop_assert_eq!(remaining, charge - requested);
            prop_assert_eq!(t.assets.balance_of(&receiver), requested);

            // Requests above the remaining charge are rejected outright
            let over = t
                .service
                .handle()
                .discharge_amount(receiver, token, charge + 1)
                .await;
            prop_assert!(over.is_err());

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: repeated energizes accumulate additively
    #[test]
    fn prop_energize_additive(
        first in amount_strategy(),
        second in 1u128..1_000_000,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();

            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, first)
                .await
                .unwrap();
            // Top-ups below the floor are fine once the floor is met
            t.service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, second)
                .await
                .unwrap();

            prop_assert_eq!(
                t.service.handle().mass(token).await.unwrap(),
                first + second
            );

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: deposits leaving total mass below the floor are rejected
    #[test]
    fn prop_min_deposit_floor(amount in 1u128..MIN_DEPOSIT) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::None);
            let token = Uuid::now_v7();

            let result = t
                .service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await;
            prop_assert!(result.is_err());
            prop_assert_eq!(t.service.handle().mass(token).await.unwrap(), 0);

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: withdrawing an exact asset amount never pays less than
    /// requested (the interest consumed, valued back, covers it)
    #[test]
    fn prop_round_trip_covers_withdrawal(
        amount in 1u128..1_000_000_000u128,
        rate in rate_strategy(),
    ) {
        let consumed = math::to_interest_ceil(amount, rate).unwrap();
        let value = math::to_asset_floor(consumed, rate).unwrap();
        prop_assert!(value >= amount);
    }

    /// Property: the fee share plus the credited share equals the full
    /// deposit credit
    #[test]
    fn prop_fee_conserves_deposit(amount in amount_strategy(), bps in 1u32..10_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let t = create_test_service(FeePolicy::BasisPoints { bps });
            let token = Uuid::now_v7();

            let credited = t
                .service
                .handle()
                .energize(t.alice.clone(), t.contract.clone(), token, amount)
                .await
                .unwrap();
            let fees = t
                .service
                .handle()
                .collected_fees(t.contract.clone())
                .await
                .unwrap();

            // At rate 1.0 the deposit credits one interest unit per asset unit
            prop_assert_eq!(credited + fees, amount);
            prop_assert_eq!(fees, math::basis_points(amount, bps).unwrap());

            t.service.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}

mod integration_tests {
    use super::*;
    use particle_ledger::AccessPolicy;

    #[tokio::test]
    async fn test_discharge_then_release_lifecycle() {
        let t = create_test_service(FeePolicy::None);
        let token = Uuid::now_v7();
        let receiver = HolderId::new("receiver");

        t.service
            .handle()
            .energize(t.alice.clone(), t.contract.clone(), token, 100)
            .await
            .unwrap();

        // 5% appreciation
        t.oracle
            .set_rate(Rate::from_scaled(RATE_SCALE / 100 * 105))
            .unwrap();
        assert_eq!(t.service.handle().charge(token).await.unwrap(), 5);

        let (received, remaining) = t
            .service
            .handle()
            .discharge(receiver.clone(), token)
            .await
            .unwrap();
        assert_eq!(received, 5);
        assert_eq!(remaining, 0);

        // Mass is untouched by discharge
        assert_eq!(t.service.handle().mass(token).await.unwrap(), 100);

        let paid = t
            .service
            .handle()
            .release(receiver.clone(), token)
            .await
            .unwrap();
        assert!(paid >= 99);
        assert_eq!(t.assets.balance_of(&receiver), received + paid);

        let state = t.service.handle().state(token).await.unwrap();
        assert_eq!(state.mass, 0);
        assert_eq!(state.interest, 0);
    }

    #[tokio::test]
    async fn test_discharge_without_charge_fails() {
        let t = create_test_service(FeePolicy::None);
        let token = Uuid::now_v7();

        t.service
            .handle()
            .energize(t.alice.clone(), t.contract.clone(), token, 500)
            .await
            .unwrap();

        let result = t
            .service
            .handle()
            .discharge(HolderId::new("receiver"), token)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fee_withdrawal_allowed_while_paused() {
        let t = create_test_service(FeePolicy::BasisPoints { bps: 500 });
        let token = Uuid::now_v7();
        let treasury = HolderId::new("treasury");

        t.service
            .handle()
            .energize(t.alice.clone(), t.contract.clone(), token, 1_000)
            .await
            .unwrap();
        assert_eq!(
            t.service
                .handle()
                .collected_fees(t.contract.clone())
                .await
                .unwrap(),
            50
        );

        t.service.handle().set_paused(true).await.unwrap();

        // Mutations are blocked
        let blocked = t
            .service
            .handle()
            .energize(t.alice.clone(), t.contract.clone(), token, 1_000)
            .await;
        assert!(blocked.is_err());

        // Fee withdrawal is not
        let withdrawn = t
            .service
            .handle()
            .withdraw_fees(t.contract.clone(), treasury.clone())
            .await
            .unwrap();
        assert_eq!(withdrawn, 50);
        assert_eq!(t.assets.balance_of(&treasury), 50);

        // Second withdrawal is a zero no-op
        let again = t
            .service
            .handle()
            .withdraw_fees(t.contract.clone(), treasury.clone())
            .await
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(t.assets.balance_of(&treasury), 50);
    }

    #[tokio::test]
    async fn test_type_registry_mint_flow() {
        let t = create_test_service(FeePolicy::None);
        let type_id = Uuid::new_v4();
        let creator = HolderId::new("creator");

        t.service
            .handle()
            .register_type(creator.clone(), type_id, 200, 2, AccessPolicy::Public)
            .await
            .unwrap();

        // Funding below the type floor is rejected
        let under = t
            .service
            .handle()
            .authorize_mint(type_id, t.alice.clone(), 199)
            .await;
        assert!(under.is_err());

        let spec = t
            .service
            .handle()
            .authorize_mint(type_id, t.alice.clone(), 200)
            .await
            .unwrap();
        assert_eq!(spec.minted, 1);

        t.service
            .handle()
            .authorize_mint(type_id, t.alice.clone(), 200)
            .await
            .unwrap();
        let capped = t
            .service
            .handle()
            .authorize_mint(type_id, t.alice.clone(), 200)
            .await;
        assert!(capped.is_err());

        // A burn frees a slot
        t.service.handle().record_burn(type_id).await.unwrap();
        t.service
            .handle()
            .authorize_mint(type_id, t.alice.clone(), 200)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_state_unchanged() {
        let t = create_test_service(FeePolicy::None);
        let token = Uuid::now_v7();
        let broke = HolderId::new("broke");

        // Approved but holds nothing
        t.assets.approve(
            &broke,
            &HolderId::new(t.service.config().ledger_id.clone()),
            1_000_000,
        );

        let result = t
            .service
            .handle()
            .energize(broke, t.contract.clone(), token, 500)
            .await;
        assert!(result.is_err());
        assert_eq!(t.service.handle().mass(token).await.unwrap(), 0);
    }
}
