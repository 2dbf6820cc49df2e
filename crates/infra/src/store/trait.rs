use chrono::{DateTime, Utc};
use thiserror::Error;

use bloodbank_core::{BatchId, BloodType, ExpectedVersion, RequestId};
use bloodbank_inventory::{AllocationPlan, BatchStatus, BatchUpdate, InventoryBatch, SweepPlan};
use bloodbank_requests::{BloodRequest, RequestStatus};
use std::sync::Arc;

/// Store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, lifecycle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A version-conditioned write found a different version.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The backend could not serve the call (lock poisoning, connection loss).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Batch selection criteria. Empty filter matches every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchFilter {
    pub blood_type: Option<BloodType>,
    pub status: Option<BatchStatus>,
    /// Only batches whose expiry date is not before this instant.
    pub not_expired_at: Option<DateTime<Utc>>,
}

impl BatchFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Available, unexpired batches of one blood type: the allocation pool.
    pub fn usable(blood_type: BloodType, now: DateTime<Utc>) -> Self {
        Self {
            blood_type: Some(blood_type),
            status: Some(BatchStatus::Available),
            not_expired_at: Some(now),
        }
    }

    pub fn with_blood_type(mut self, blood_type: BloodType) -> Self {
        self.blood_type = Some(blood_type);
        self
    }

    pub fn with_status(mut self, status: BatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, batch: &InventoryBatch) -> bool {
        self.blood_type.is_none_or(|bt| batch.blood_type() == bt)
            && self.status.is_none_or(|st| batch.status() == st)
            && self
                .not_expired_at
                .is_none_or(|now| !batch.is_expired_at(now))
    }
}

/// A request state to write, guarded by the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestWrite {
    pub request: BloodRequest,
    pub expected_version: ExpectedVersion,
}

/// Version-conditioned writes applied atomically by [`BloodBankStore::commit`].
///
/// Either every write is applied or none is: a single stale version, a missing
/// record, or a duplicate insert rejects the whole unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    pub batch_inserts: Vec<InventoryBatch>,
    pub batch_updates: Vec<BatchUpdate>,
    pub request_writes: Vec<RequestWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes of a planned allocation (updated sources + split children).
    pub fn from_allocation(plan: &AllocationPlan) -> Self {
        Self {
            batch_inserts: plan.created.clone(),
            batch_updates: plan.updated.clone(),
            request_writes: Vec::new(),
        }
    }

    pub fn from_sweep(plan: &SweepPlan) -> Self {
        Self {
            batch_updates: plan.updated.clone(),
            ..Self::default()
        }
    }

    /// Overwrite `request`, guarded by the version it was loaded at.
    pub fn with_request(mut self, request: BloodRequest, loaded_version: u64) -> Self {
        let expected_version = ExpectedVersion::exact(loaded_version);
        self.request_writes.push(RequestWrite {
            request,
            expected_version,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.batch_inserts.is_empty()
            && self.batch_updates.is_empty()
            && self.request_writes.is_empty()
    }
}

/// Persistence collaborator for batches and requests.
///
/// ## Read Semantics
///
/// - `find_batches` returns matches in FIFO-by-expiry order
///   (`expiry_date`, `received_at`, `id` ascending).
/// - `list_requests` returns matches oldest first.
/// - Aggregations (`sum_quantity`, `count_batches`) see the same committed state
///   as the finders.
///
/// ## Write Semantics
///
/// - `insert_*` fails with `Duplicate` when the id already exists.
/// - `commit` checks every `expected_version` before applying anything.
///
/// Implementations must be safe to share across threads.
pub trait BloodBankStore: Send + Sync {
    fn insert_batch(&self, batch: InventoryBatch) -> Result<(), StoreError>;

    fn get_batch(&self, id: BatchId) -> Result<Option<InventoryBatch>, StoreError>;

    fn find_batches(&self, filter: &BatchFilter) -> Result<Vec<InventoryBatch>, StoreError>;

    /// Sum of quantities for one blood type and status, optionally excluding
    /// batches expired at `not_expired_at`.
    fn sum_quantity(
        &self,
        blood_type: BloodType,
        status: BatchStatus,
        not_expired_at: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError>;

    fn count_batches(&self, blood_type: BloodType, status: BatchStatus) -> Result<u64, StoreError>;

    fn insert_request(&self, request: BloodRequest) -> Result<(), StoreError>;

    fn get_request(&self, id: RequestId) -> Result<Option<BloodRequest>, StoreError>;

    fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<BloodRequest>, StoreError>;

    /// Apply a unit of work atomically.
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}

impl<S> BloodBankStore for Arc<S>
where
    S: BloodBankStore + ?Sized,
{
    fn insert_batch(&self, batch: InventoryBatch) -> Result<(), StoreError> {
        (**self).insert_batch(batch)
    }

    fn get_batch(&self, id: BatchId) -> Result<Option<InventoryBatch>, StoreError> {
        (**self).get_batch(id)
    }

    fn find_batches(&self, filter: &BatchFilter) -> Result<Vec<InventoryBatch>, StoreError> {
        (**self).find_batches(filter)
    }

    fn sum_quantity(
        &self,
        blood_type: BloodType,
        status: BatchStatus,
        not_expired_at: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        (**self).sum_quantity(blood_type, status, not_expired_at)
    }

    fn count_batches(&self, blood_type: BloodType, status: BatchStatus) -> Result<u64, StoreError> {
        (**self).count_batches(blood_type, status)
    }

    fn insert_request(&self, request: BloodRequest) -> Result<(), StoreError> {
        (**self).insert_request(request)
    }

    fn get_request(&self, id: RequestId) -> Result<Option<BloodRequest>, StoreError> {
        (**self).get_request(id)
    }

    fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<BloodRequest>, StoreError> {
        (**self).list_requests(status)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(unit)
    }
}
