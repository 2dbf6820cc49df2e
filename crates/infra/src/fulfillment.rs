//! Request Fulfillment Engine (application-level orchestration).
//!
//! The engine composes the [`InventoryLedger`], the request aggregate, a
//! [`Clock`] and an [`EventBus`] into the operations the web layer calls.
//!
//! ## Approval Flow
//!
//! ```text
//! check_and_approve(request_id)
//!   ↓
//! 1. Load request (must exist and be pending)
//!   ↓
//! 2. Sweep expired inventory (own commit)
//!   ↓
//! 3. Compute availability (fail fast when short)
//!   ↓
//! 4. Plan allocation (FIFO by expiry, split the last batch)
//!   ↓
//! 5. Handle FulfillRequest on the aggregate
//!   ↓
//! 6. Commit batch writes + request write as one unit of work
//!   ↓
//! 7. Publish committed events
//! ```
//!
//! ## Concurrency
//!
//! Approvals for the same blood type are serialized by a per-type mutex held
//! across steps 1–7. Every commit is also version-conditioned, so writers that
//! bypass the mutex (sweeps, rejections, other processes sharing the store)
//! surface as conflicts. A conflicted attempt is retried from step 1 up to
//! `max_conflict_retries` times; after that the engine re-reads availability
//! and reports `InsufficientStock` if the stock is now short, otherwise
//! `PersistenceConflict`.
//!
//! ## Publication
//!
//! Events are published only after the commit that made them durable.
//! Publication is best-effort: a failed publish never undoes or fails the
//! operation, it is only counted (see [`FulfillmentEngine::publish_failures`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use bloodbank_core::{
    AggregateRoot, BatchId, BloodType, DomainError, DonorId, RequestId, UserId,
};
use bloodbank_events::{Event, EventBus, EventEnvelope};
use bloodbank_inventory::{AllocationPlan, InventoryBatch, LedgerEvent, ReceiveBatch};
use bloodbank_requests::{
    BloodRequest, CancelRequest, FulfillRequest, Priority, RejectRequest, RequestCommand,
    RequestEvent, RequestStatus, SubmitRequest,
};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::ledger::{InventoryLedger, LedgerError, StockLevel};
use crate::store::{BatchFilter, BloodBankStore, StoreError, UnitOfWork};

/// Message type carried on the bus.
pub type BloodBankEnvelope = EventEnvelope<JsonValue>;

pub const BATCH_AGGREGATE_TYPE: &str = "inventory.batch";
pub const REQUEST_AGGREGATE_TYPE: &str = "requests.request";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(
        "insufficient {blood_type} stock: {available} units available, {required} required"
    )]
    InsufficientStock {
        blood_type: BloodType,
        available: u64,
        required: u64,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    /// Version conflicts persisted through every retry.
    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("store failure: {0}")]
    Store(StoreError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<StoreError> for FulfillmentError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => FulfillmentError::PersistenceConflict(msg),
            StoreError::NotFound(what) => FulfillmentError::NotFound(what),
            other => FulfillmentError::Store(other),
        }
    }
}

impl From<DomainError> for FulfillmentError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => FulfillmentError::Validation(msg),
            DomainError::InvalidId(msg) => FulfillmentError::Validation(msg),
            DomainError::InvalidState(msg) => FulfillmentError::InvalidState(msg),
            DomainError::NotFound => FulfillmentError::NotFound("record".to_string()),
            DomainError::Conflict(msg) => FulfillmentError::PersistenceConflict(msg),
            DomainError::InvariantViolation(msg) => FulfillmentError::Unexpected(msg),
            // Raised by allocation planning, which the ledger re-tags with the blood type.
            DomainError::InsufficientStock {
                available,
                required,
            } => FulfillmentError::Unexpected(format!(
                "untyped stock shortfall: available {available}, required {required}"
            )),
        }
    }
}

impl From<LedgerError> for FulfillmentError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Domain(err) => err.into(),
            LedgerError::Store(err) => err.into(),
            LedgerError::InsufficientStock {
                blood_type,
                available,
                required,
            } => FulfillmentError::InsufficientStock {
                blood_type,
                available,
                required,
            },
        }
    }
}

/// Input for [`FulfillmentEngine::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub blood_type: BloodType,
    pub quantity: u32,
    #[serde(default)]
    pub priority: Priority,
    pub patient_name: String,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Input for [`FulfillmentEngine::receive_batch`]; intake time comes from the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub blood_type: BloodType,
    pub quantity: u32,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub donor_id: Option<DonorId>,
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub request: BloodRequest,
    pub allocation: AllocationPlan,
    /// Batches the pre-approval sweep marked expired.
    pub expired_swept: usize,
}

pub struct FulfillmentEngine<S, B> {
    ledger: InventoryLedger<S>,
    bus: B,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    type_locks: [Mutex<()>; BloodType::COUNT],
    publish_failures: AtomicU64,
}

impl<S, B> FulfillmentEngine<S, B> {
    pub fn new(store: S, bus: B, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            ledger: InventoryLedger::new(store),
            bus,
            clock,
            config,
            type_locks: std::array::from_fn(|_| Mutex::new(())),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Events that could not be handed to the bus since startup.
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    fn lock_blood_type(&self, blood_type: BloodType) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.type_locks[blood_type.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, B> FulfillmentEngine<S, B>
where
    S: BloodBankStore,
    B: EventBus<BloodBankEnvelope>,
{
    /// Approve a pending request by allocating inventory to it.
    pub fn check_and_approve(
        &self,
        request_id: RequestId,
        processed_by: Option<UserId>,
    ) -> Result<Approval, FulfillmentError> {
        let request = self.load_request(request_id)?;
        let blood_type = request.blood_type();
        let required = u64::from(request.quantity());

        let _guard = self.lock_blood_type(blood_type);

        match self.retrying(|| self.try_approve(request_id, processed_by)) {
            Err(FulfillmentError::PersistenceConflict(msg)) => {
                let available = self
                    .ledger
                    .available_quantity(blood_type, self.clock.now())?;
                if available < required {
                    Err(FulfillmentError::InsufficientStock {
                        blood_type,
                        available,
                        required,
                    })
                } else {
                    Err(FulfillmentError::PersistenceConflict(msg))
                }
            }
            outcome => outcome,
        }
    }

    fn try_approve(
        &self,
        request_id: RequestId,
        processed_by: Option<UserId>,
    ) -> Result<Approval, FulfillmentError> {
        let now = self.clock.now();

        let request = self.load_request(request_id)?;
        if request.status() != RequestStatus::Pending {
            return Err(FulfillmentError::InvalidState(format!(
                "request {request_id} is {}; only pending requests can be approved",
                request.status()
            )));
        }

        let expired_swept = self.sweep_at(now)?;

        let blood_type = request.blood_type();
        let required = u64::from(request.quantity());
        let available = self.ledger.available_quantity(blood_type, now)?;
        if available < required {
            return Err(FulfillmentError::InsufficientStock {
                blood_type,
                available,
                required,
            });
        }

        let allocation = self.ledger.plan(
            blood_type,
            request.quantity(),
            self.config.allocation_target,
            now,
        )?;

        let loaded_version = request.version();
        let mut fulfilled = request;
        let request_events = fulfilled.execute(&RequestCommand::Fulfill(FulfillRequest {
            request_id,
            allocated_batches: allocation.consumed_batch_ids(),
            allocated_quantity: allocation.allocated_quantity(),
            processed_by,
            occurred_at: now,
        }))?;

        let unit =
            UnitOfWork::from_allocation(&allocation).with_request(fulfilled.clone(), loaded_version);
        self.ledger.store().commit(unit)?;

        self.publish_ledger_events(&allocation.events);
        self.publish_request_events(request_id, &request_events);

        Ok(Approval {
            request: fulfilled,
            allocation,
            expired_swept,
        })
    }

    /// Record a new pending request.
    pub fn submit(&self, new: NewRequest) -> Result<BloodRequest, FulfillmentError> {
        let request_id = RequestId::new();
        let mut request = BloodRequest::empty(request_id);
        let events = request.execute(&RequestCommand::Submit(SubmitRequest {
            request_id,
            blood_type: new.blood_type,
            quantity: new.quantity,
            priority: new.priority,
            patient_name: new.patient_name,
            hospital: new.hospital,
            notes: new.notes,
            occurred_at: self.clock.now(),
        }))?;

        self.ledger.store().insert_request(request.clone())?;
        self.publish_request_events(request_id, &events);
        Ok(request)
    }

    pub fn reject(
        &self,
        request_id: RequestId,
        reason: Option<String>,
        processed_by: Option<UserId>,
    ) -> Result<BloodRequest, FulfillmentError> {
        self.retrying(|| {
            self.transition_request(request_id, |occurred_at| {
                RequestCommand::Reject(RejectRequest {
                    request_id,
                    reason: reason.clone(),
                    processed_by,
                    occurred_at,
                })
            })
        })
    }

    pub fn cancel(
        &self,
        request_id: RequestId,
        reason: Option<String>,
    ) -> Result<BloodRequest, FulfillmentError> {
        self.retrying(|| {
            self.transition_request(request_id, |occurred_at| {
                RequestCommand::Cancel(CancelRequest {
                    request_id,
                    reason: reason.clone(),
                    occurred_at,
                })
            })
        })
    }

    fn transition_request(
        &self,
        request_id: RequestId,
        command: impl FnOnce(DateTime<Utc>) -> RequestCommand,
    ) -> Result<BloodRequest, FulfillmentError> {
        let mut request = self.load_request(request_id)?;
        let loaded_version = request.version();

        let events = request.execute(&command(self.clock.now()))?;
        self.ledger
            .store()
            .commit(UnitOfWork::new().with_request(request.clone(), loaded_version))?;

        self.publish_request_events(request_id, &events);
        Ok(request)
    }

    pub fn get_request(&self, request_id: RequestId) -> Result<BloodRequest, FulfillmentError> {
        self.load_request(request_id)
    }

    /// Requests in triage order: most urgent first, then oldest first.
    pub fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BloodRequest>, FulfillmentError> {
        let mut requests = self.ledger.store().list_requests(status)?;
        requests.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.requested_at().cmp(&b.requested_at()))
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        Ok(requests)
    }

    pub fn compute_availability(&self, blood_type: BloodType) -> Result<u64, FulfillmentError> {
        Ok(self
            .ledger
            .available_quantity(blood_type, self.clock.now())?)
    }

    /// Expire every available batch past its expiry date. Returns how many changed.
    pub fn sweep_expired(&self) -> Result<usize, FulfillmentError> {
        self.retrying(|| self.sweep_at(self.clock.now()))
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, FulfillmentError> {
        let plan = self.ledger.sweep_expired(now)?;
        self.publish_ledger_events(&plan.events);
        Ok(plan.len())
    }

    pub fn stock_summary(&self) -> Result<Vec<StockLevel>, FulfillmentError> {
        Ok(self.ledger.stock_summary(self.clock.now())?)
    }

    /// Donation intake.
    pub fn receive_batch(&self, new: NewBatch) -> Result<InventoryBatch, FulfillmentError> {
        let (batch, event) = self.ledger.receive(&ReceiveBatch {
            batch_id: BatchId::new(),
            blood_type: new.blood_type,
            quantity: new.quantity,
            expiry_date: new.expiry_date,
            donor_id: new.donor_id,
            received_at: self.clock.now(),
        })?;

        self.publish_ledger_events(std::slice::from_ref(&event));
        Ok(batch)
    }

    pub fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<InventoryBatch>, FulfillmentError> {
        Ok(self.ledger.batches(filter)?)
    }

    fn load_request(&self, request_id: RequestId) -> Result<BloodRequest, FulfillmentError> {
        self.ledger
            .store()
            .get_request(request_id)?
            .ok_or_else(|| FulfillmentError::NotFound(format!("request {request_id}")))
    }

    /// Run `attempt`, re-running it after each version conflict up to the
    /// configured number of retries.
    fn retrying<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, FulfillmentError>,
    ) -> Result<T, FulfillmentError> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(FulfillmentError::PersistenceConflict(_))
                    if retries < self.config.max_conflict_retries =>
                {
                    retries += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn publish_ledger_events(&self, events: &[LedgerEvent]) {
        for event in events {
            self.publish(*event.batch_id().as_uuid(), BATCH_AGGREGATE_TYPE, event);
        }
    }

    fn publish_request_events(&self, request_id: RequestId, events: &[RequestEvent]) {
        for event in events {
            self.publish(*request_id.as_uuid(), REQUEST_AGGREGATE_TYPE, event);
        }
    }

    /// Wrap and publish one event. An event that cannot be encoded or handed
    /// to the bus is counted in `publish_failures` and dropped.
    fn publish<E>(&self, aggregate_id: Uuid, aggregate_type: &'static str, event: &E)
    where
        E: Event + Serialize,
    {
        let delivered = serde_json::to_value(event).is_ok_and(|payload| {
            let envelope = BloodBankEnvelope::wrap(aggregate_id, aggregate_type, event, |_| payload);
            self.bus.publish(envelope).is_ok()
        });
        if !delivered {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
