//! Inventory Ledger: availability reads, expiry sweep, allocation.
//!
//! The ledger wraps a [`BloodBankStore`] with the inventory rules from
//! `bloodbank-inventory`. Planning is delegated to the pure planners; the
//! ledger loads the snapshot they need and commits what they return.
//!
//! Every operation here is a single attempt. Retrying on version conflicts and
//! serializing allocations per blood type is the engine's job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use bloodbank_core::{BatchId, BloodType, DomainError};
use bloodbank_inventory::{
    AllocationPlan, AllocationTarget, BatchStatus, InventoryBatch, LedgerEvent, ReceiveBatch,
    SweepPlan, plan_allocation, plan_sweep,
};

use crate::store::{BatchFilter, BloodBankStore, StoreError, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("insufficient {blood_type} stock: available {available}, required {required}")]
    InsufficientStock {
        blood_type: BloodType,
        available: u64,
        required: u64,
    },
}

/// Stock of one blood type at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub blood_type: BloodType,
    /// Units in available, unexpired batches.
    pub available_units: u64,
    pub available_batches: u64,
    pub reserved_batches: u64,
    pub used_batches: u64,
    pub expired_batches: u64,
}

#[derive(Debug)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> InventoryLedger<S>
where
    S: BloodBankStore,
{
    /// Units of `blood_type` that could be allocated at `now`.
    ///
    /// Batches past their expiry date are excluded even while still marked
    /// available.
    pub fn available_quantity(
        &self,
        blood_type: BloodType,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        Ok(self
            .store
            .sum_quantity(blood_type, BatchStatus::Available, Some(now))?)
    }

    /// Mark every available batch past its expiry date as expired.
    ///
    /// Returns the committed plan; an empty plan means nothing was due.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepPlan, LedgerError> {
        let candidates = self
            .store
            .find_batches(&BatchFilter::all().with_status(BatchStatus::Available))?;
        let plan = plan_sweep(&candidates, now)?;
        if !plan.is_empty() {
            self.store.commit(UnitOfWork::from_sweep(&plan))?;
        }
        Ok(plan)
    }

    /// Plan an allocation against the current snapshot without writing.
    pub fn plan(
        &self,
        blood_type: BloodType,
        quantity: u32,
        target: AllocationTarget,
        now: DateTime<Utc>,
    ) -> Result<AllocationPlan, LedgerError> {
        let pool = self.store.find_batches(&BatchFilter::usable(blood_type, now))?;
        plan_allocation(&pool, blood_type, quantity, target, now, BatchId::new).map_err(
            |err| match err {
                DomainError::InsufficientStock {
                    available,
                    required,
                } => LedgerError::InsufficientStock {
                    blood_type,
                    available,
                    required,
                },
                other => LedgerError::Domain(other),
            },
        )
    }

    /// Plan and commit an allocation on its own unit of work.
    pub fn allocate(
        &self,
        blood_type: BloodType,
        quantity: u32,
        target: AllocationTarget,
        now: DateTime<Utc>,
    ) -> Result<AllocationPlan, LedgerError> {
        let plan = self.plan(blood_type, quantity, target, now)?;
        self.store.commit(UnitOfWork::from_allocation(&plan))?;
        Ok(plan)
    }

    /// Per-type stock levels, always listing all eight blood types.
    pub fn stock_summary(&self, now: DateTime<Utc>) -> Result<Vec<StockLevel>, LedgerError> {
        BloodType::ALL
            .into_iter()
            .map(|blood_type| -> Result<StockLevel, LedgerError> {
                let count = |status: BatchStatus| self.store.count_batches(blood_type, status);
                Ok(StockLevel {
                    blood_type,
                    available_units: self.available_quantity(blood_type, now)?,
                    available_batches: count(BatchStatus::Available)?,
                    reserved_batches: count(BatchStatus::Reserved)?,
                    used_batches: count(BatchStatus::Used)?,
                    expired_batches: count(BatchStatus::Expired)?,
                })
            })
            .collect()
    }

    pub fn batches(&self, filter: &BatchFilter) -> Result<Vec<InventoryBatch>, LedgerError> {
        Ok(self.store.find_batches(filter)?)
    }

    /// Donation intake: validate and insert a new available batch.
    pub fn receive(&self, cmd: &ReceiveBatch) -> Result<(InventoryBatch, LedgerEvent), LedgerError> {
        let (batch, event) = InventoryBatch::receive(cmd)?;
        self.store.insert_batch(batch.clone())?;
        Ok((batch, event))
    }
}
