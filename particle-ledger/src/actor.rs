//! Single-writer actor for the particle ledger
//!
//! Every state-mutating operation executes as one serialized unit inside
//! the actor task: it either fully applies or fully reverts, and no two
//! operations interleave. The shared nucleus balance is therefore only ever
//! touched by one read-modify-write at a time, which is the concurrency
//! model the accounting core requires.
//!
//! The pattern is message passing over a bounded mailbox with oneshot
//! replies; handles are cheap to clone and safe to share.
//!
//! A failed persistence commit poisons the actor: the failing operation is
//! reported to its caller and the actor stops, so divergent in-memory state
//! is never carried forward into later commits. Subsequent requests fail
//! with a concurrency error; the process restarts from the durable state.

use crate::error::{Error, Result};
use crate::ledger::ParticleLedger;
use crate::metrics::Metrics;
use crate::registry::TypeRegistry;
use crate::storage::{StateBatch, StatePersister};
use crate::types::{AccessPolicy, ContractId, HolderId, ParticleState, ParticleTypeSpec, TokenUuid};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the particle actor
pub enum ParticleMessage {
    /// Deposit asset into a token
    Energize {
        caller: HolderId,
        depositor: HolderId,
        contract: ContractId,
        token: TokenUuid,
        amount: u128,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Withdraw the full charge of a token
    Discharge {
        caller: HolderId,
        receiver: HolderId,
        token: TokenUuid,
        response: oneshot::Sender<Result<(u128, u128)>>,
    },

    /// Withdraw up to an amount of a token's charge
    DischargeAmount {
        caller: HolderId,
        receiver: HolderId,
        token: TokenUuid,
        amount: u128,
        response: oneshot::Sender<Result<(u128, u128)>>,
    },

    /// Redeem a token's full backing balance
    Release {
        caller: HolderId,
        receiver: HolderId,
        token: TokenUuid,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Pay out collected integrator fees
    WithdrawFees {
        caller: HolderId,
        contract: ContractId,
        receiver: HolderId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Read a token's mass
    Mass {
        token: TokenUuid,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Read a token's current charge
    Charge {
        token: TokenUuid,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Read a token's full state
    GetState {
        token: TokenUuid,
        response: oneshot::Sender<Result<ParticleState>>,
    },

    /// Read an integrator's collected fees
    CollectedFees {
        contract: ContractId,
        response: oneshot::Sender<Result<u128>>,
    },

    /// Pause or resume mutating operations
    SetPaused {
        caller: HolderId,
        paused: bool,
        response: oneshot::Sender<Result<()>>,
    },

    /// Register a particle type
    RegisterType {
        creator: HolderId,
        type_id: Uuid,
        required_funding: u128,
        max_supply: u64,
        access: AccessPolicy,
        response: oneshot::Sender<Result<()>>,
    },

    /// Authorize a mint of a registered type
    AuthorizeMint {
        type_id: Uuid,
        minter: HolderId,
        funding: u128,
        response: oneshot::Sender<Result<ParticleTypeSpec>>,
    },

    /// Look up a registered type
    GetType {
        type_id: Uuid,
        response: oneshot::Sender<Result<ParticleTypeSpec>>,
    },

    /// Record a burn against a registered type
    RecordBurn {
        type_id: Uuid,
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes particle messages
pub struct ParticleActor {
    ledger: ParticleLedger,
    registry: TypeRegistry,
    storage: Option<Arc<dyn StatePersister>>,
    metrics: Metrics,
    mailbox: mpsc::Receiver<ParticleMessage>,

    /// Set when a persistence commit fails; the actor stops rather than
    /// carry in-memory state the durable store does not have
    poisoned: bool,
}

impl ParticleActor {
    /// Create new actor
    pub fn new(
        ledger: ParticleLedger,
        registry: TypeRegistry,
        storage: Option<Arc<dyn StatePersister>>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<ParticleMessage>,
    ) -> Self {
        Self {
            ledger,
            registry,
            storage,
            metrics,
            mailbox,
            poisoned: false,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                ParticleMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
            if self.poisoned {
                tracing::error!("Stopping particle actor after persistence failure");
                break;
            }
        }
    }

    fn handle_message(&mut self, msg: ParticleMessage) {
        match msg {
            ParticleMessage::Energize {
                caller,
                depositor,
                contract,
                token,
                amount,
                response,
            } => {
                let result = self
                    .ledger
                    .energize_particle(&caller, &depositor, &contract, token, amount)
                    .and_then(|credited| {
                        let batch = self.ledger_batch(Some(token), Some(&contract));
                        self.persist(batch)?;
                        Ok(credited)
                    });
                match &result {
                    Ok(_) => self.metrics.record_energize(amount),
                    Err(_) => self.metrics.record_failure(),
                }
                let _ = response.send(result);
            }

            ParticleMessage::Discharge {
                caller,
                receiver,
                token,
                response,
            } => {
                let result = self
                    .ledger
                    .discharge_particle(&caller, &receiver, token)
                    .and_then(|out| {
                        let batch = self.ledger_batch(Some(token), None);
                        self.persist(batch)?;
                        Ok(out)
                    });
                match &result {
                    Ok(_) => self.metrics.record_discharge(),
                    Err(_) => self.metrics.record_failure(),
                }
                let _ = response.send(result);
            }

            ParticleMessage::DischargeAmount {
                caller,
                receiver,
                token,
                amount,
                response,
            } => {
                let result = self
                    .ledger
                    .discharge_particle_amount(&caller, &receiver, token, amount)
                    .and_then(|out| {
                        let batch = self.ledger_batch(Some(token), None);
                        self.persist(batch)?;
                        Ok(out)
                    });
                match &result {
                    Ok(_) => self.metrics.record_discharge(),
                    Err(_) => self.metrics.record_failure(),
                }
                let _ = response.send(result);
            }

            ParticleMessage::Release {
                caller,
                receiver,
                token,
                response,
            } => {
                let result = self
                    .ledger
                    .release_particle(&caller, &receiver, token)
                    .and_then(|total| {
                        let batch = self.ledger_batch(Some(token), None);
                        self.persist(batch)?;
                        Ok(total)
                    });
                match &result {
                    Ok(_) => self.metrics.record_release(),
                    Err(_) => self.metrics.record_failure(),
                }
                let _ = response.send(result);
            }

            ParticleMessage::WithdrawFees {
                caller,
                contract,
                receiver,
                response,
            } => {
                let result = self
                    .ledger
                    .withdraw_fees(&caller, &contract, &receiver)
                    .and_then(|withdrawn| {
                        let batch = self.ledger_batch(None, Some(&contract));
                        self.persist(batch)?;
                        Ok(withdrawn)
                    });
                match &result {
                    Ok(withdrawn) => self.metrics.record_fees(*withdrawn),
                    Err(_) => self.metrics.record_failure(),
                }
                let _ = response.send(result);
            }

            ParticleMessage::Mass { token, response } => {
                let _ = response.send(Ok(self.ledger.base_particle_mass(token)));
            }

            ParticleMessage::Charge { token, response } => {
                let _ = response.send(self.ledger.current_particle_charge(token));
            }

            ParticleMessage::GetState { token, response } => {
                let _ = response.send(Ok(self.ledger.particle_state(token)));
            }

            ParticleMessage::CollectedFees { contract, response } => {
                let _ = response.send(Ok(self.ledger.collected_fees(&contract)));
            }

            ParticleMessage::SetPaused {
                caller,
                paused,
                response,
            } => {
                let result = self.ledger.set_paused(&caller, paused).and_then(|()| {
                    self.persist(StateBatch {
                        paused: Some(paused),
                        ..Default::default()
                    })
                });
                let _ = response.send(result);
            }

            ParticleMessage::RegisterType {
                creator,
                type_id,
                required_funding,
                max_supply,
                access,
                response,
            } => {
                let result = self
                    .registry
                    .register_type(creator, type_id, required_funding, max_supply, access)
                    .and_then(|()| {
                        let batch = self.type_batch(type_id);
                        self.persist(batch)
                    });
                let _ = response.send(result);
            }

            ParticleMessage::AuthorizeMint {
                type_id,
                minter,
                funding,
                response,
            } => {
                let result = self
                    .registry
                    .authorize_mint(type_id, &minter, funding)
                    .map(|spec| spec.clone())
                    .and_then(|spec| {
                        let batch = self.type_batch(type_id);
                        self.persist(batch)?;
                        Ok(spec)
                    });
                let _ = response.send(result);
            }

            ParticleMessage::GetType { type_id, response } => {
                let result = self.registry.get_type(type_id).cloned();
                let _ = response.send(result);
            }

            ParticleMessage::RecordBurn { type_id, response } => {
                let result = self
                    .registry
                    .record_burn(type_id)
                    .and_then(|()| {
                        let batch = self.type_batch(type_id);
                        self.persist(batch)
                    });
                let _ = response.send(result);
            }

            ParticleMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Snapshot the keys a ledger operation can have touched
    fn ledger_batch(&self, token: Option<TokenUuid>, contract: Option<&ContractId>) -> StateBatch {
        let identity = self.ledger.identity().clone();
        StateBatch {
            particles: token
                .map(|t| vec![(t, self.ledger.particle_state(t))])
                .unwrap_or_default(),
            fees: contract
                .map(|c| vec![(c.clone(), self.ledger.collected_fees(c))])
                .unwrap_or_default(),
            pool: vec![(identity.clone(), self.ledger.nucleus().interest_balance(&identity))],
            total_supply: Some(self.ledger.nucleus().total_supply()),
            paused: None,
            types: vec![],
        }
    }

    fn type_batch(&self, type_id: Uuid) -> StateBatch {
        StateBatch {
            types: self
                .registry
                .types()
                .get(&type_id)
                .cloned()
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }

    fn persist(&mut self, batch: StateBatch) -> Result<()> {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.commit(batch) {
                tracing::error!("Failed to persist operation: {e}");
                self.poisoned = true;
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Handle for sending messages to the actor
///
/// Carries the caller identity presented to the ledger's capability check;
/// the facade hands out handles bound to the escrow identity.
#[derive(Clone)]
pub struct ParticleHandle {
    sender: mpsc::Sender<ParticleMessage>,
    caller: HolderId,
}

impl ParticleHandle {
    /// Create new handle bound to a caller identity
    pub fn new(sender: mpsc::Sender<ParticleMessage>, caller: HolderId) -> Self {
        Self { sender, caller }
    }

    /// Rebind the handle to a different caller identity
    pub fn with_caller(&self, caller: HolderId) -> Self {
        Self {
            sender: self.sender.clone(),
            caller,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> ParticleMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Deposit asset into a token
    pub async fn energize(
        &self,
        depositor: HolderId,
        contract: ContractId,
        token: TokenUuid,
        amount: u128,
    ) -> Result<u128> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::Energize {
            caller,
            depositor,
            contract,
            token,
            amount,
            response,
        })
        .await
    }

    /// Withdraw the full charge of a token
    pub async fn discharge(
        &self,
        receiver: HolderId,
        token: TokenUuid,
    ) -> Result<(u128, u128)> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::Discharge {
            caller,
            receiver,
            token,
            response,
        })
        .await
    }

    /// Withdraw up to an amount of a token's charge
    pub async fn discharge_amount(
        &self,
        receiver: HolderId,
        token: TokenUuid,
        amount: u128,
    ) -> Result<(u128, u128)> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::DischargeAmount {
            caller,
            receiver,
            token,
            amount,
            response,
        })
        .await
    }

    /// Redeem a token's full backing balance
    pub async fn release(&self, receiver: HolderId, token: TokenUuid) -> Result<u128> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::Release {
            caller,
            receiver,
            token,
            response,
        })
        .await
    }

    /// Pay out collected integrator fees
    pub async fn withdraw_fees(
        &self,
        contract: ContractId,
        receiver: HolderId,
    ) -> Result<u128> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::WithdrawFees {
            caller,
            contract,
            receiver,
            response,
        })
        .await
    }

    /// Read a token's mass
    pub async fn mass(&self, token: TokenUuid) -> Result<u128> {
        self.request(|response| ParticleMessage::Mass { token, response })
            .await
    }

    /// Read a token's current charge
    pub async fn charge(&self, token: TokenUuid) -> Result<u128> {
        self.request(|response| ParticleMessage::Charge { token, response })
            .await
    }

    /// Read a token's full state
    pub async fn state(&self, token: TokenUuid) -> Result<ParticleState> {
        self.request(|response| ParticleMessage::GetState { token, response })
            .await
    }

    /// Read an integrator's collected fees
    pub async fn collected_fees(&self, contract: ContractId) -> Result<u128> {
        self.request(|response| ParticleMessage::CollectedFees { contract, response })
            .await
    }

    /// Pause or resume mutating operations
    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        let caller = self.caller.clone();
        self.request(|response| ParticleMessage::SetPaused {
            caller,
            paused,
            response,
        })
        .await
    }

    /// Register a particle type
    pub async fn register_type(
        &self,
        creator: HolderId,
        type_id: Uuid,
        required_funding: u128,
        max_supply: u64,
        access: AccessPolicy,
    ) -> Result<()> {
        self.request(|response| ParticleMessage::RegisterType {
            creator,
            type_id,
            required_funding,
            max_supply,
            access,
            response,
        })
        .await
    }

    /// Authorize a mint of a registered type
    pub async fn authorize_mint(
        &self,
        type_id: Uuid,
        minter: HolderId,
        funding: u128,
    ) -> Result<ParticleTypeSpec> {
        self.request(|response| ParticleMessage::AuthorizeMint {
            type_id,
            minter,
            funding,
            response,
        })
        .await
    }

    /// Look up a registered type
    pub async fn get_type(&self, type_id: Uuid) -> Result<ParticleTypeSpec> {
        self.request(|response| ParticleMessage::GetType { type_id, response })
            .await
    }

    /// Record a burn against a registered type
    pub async fn record_burn(&self, type_id: Uuid) -> Result<()> {
        self.request(|response| ParticleMessage::RecordBurn { type_id, response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ParticleMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the particle actor
pub fn spawn_particle_actor(
    ledger: ParticleLedger,
    registry: TypeRegistry,
    storage: Option<Arc<dyn StatePersister>>,
    metrics: Metrics,
    mailbox_capacity: usize,
    escrow: HolderId,
) -> ParticleHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = ParticleActor::new(ledger, registry, storage, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    ParticleHandle::new(tx, escrow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::InMemoryAssetLedger;
    use crate::math::Rate;
    use crate::nucleus::Nucleus;
    use crate::oracle::ManualOracle;
    use crate::Config;

    struct FailingPersister;

    impl StatePersister for FailingPersister {
        fn commit(&self, _batch: StateBatch) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    fn spawn_with_persister(persister: Option<Arc<dyn StatePersister>>) -> ParticleHandle {
        let mut config = Config::default();
        config.min_deposit = 100;

        let oracle = Arc::new(ManualOracle::new(Rate::ONE));
        let assets = Arc::new(InMemoryAssetLedger::new());
        let nucleus = Nucleus::new(
            oracle,
            assets.clone(),
            HolderId::new(config.custody_id.clone()),
        );
        let ledger = ParticleLedger::new(nucleus, assets.clone(), &config);

        let alice = HolderId::new("alice");
        assets.mint(&alice, 1_000_000);
        assets.approve(&alice, &HolderId::new(config.ledger_id.clone()), 1_000_000);

        spawn_particle_actor(
            ledger,
            TypeRegistry::new(),
            persister,
            Metrics::new().unwrap(),
            16,
            HolderId::new(config.escrow_id),
        )
    }

    #[tokio::test]
    async fn test_persist_failure_poisons_actor() {
        let handle = spawn_with_persister(Some(Arc::new(FailingPersister)));
        let token = Uuid::now_v7();

        let result = handle
            .energize(
                HolderId::new("alice"),
                ContractId::new("nft-contract"),
                token,
                1_000,
            )
            .await;
        assert!(matches!(result, Err(Error::Storage(_))));

        // The actor stopped rather than serve state the store never saw.
        let result = handle.mass(token).await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_actor_survives_rejected_operation() {
        let handle = spawn_with_persister(Some(Arc::new(FailingPersister)));
        let token = Uuid::now_v7();

        // Below the deposit floor, so no state moves and nothing persists.
        let result = handle
            .energize(
                HolderId::new("alice"),
                ContractId::new("nft-contract"),
                token,
                1,
            )
            .await;
        assert!(matches!(result, Err(Error::InsufficientDeposit(_))));

        assert_eq!(handle.mass(token).await.unwrap(), 0);
    }
}
