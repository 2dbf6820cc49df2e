use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use bloodbank_core::{AggregateRoot, BatchId, BloodType, RequestId};
use bloodbank_inventory::{BatchStatus, InventoryBatch};
use bloodbank_requests::{BloodRequest, RequestStatus};

use super::r#trait::{BatchFilter, BloodBankStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    batches: HashMap<BatchId, InventoryBatch>,
    requests: HashMap<RequestId, BloodRequest>,
}

/// In-memory store guarded by a single lock.
///
/// One lock over both tables makes `commit` trivially atomic: validation and
/// application happen under the same write guard. Intended for tests/dev and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryBloodBankStore {
    tables: RwLock<Tables>,
}

impl InMemoryBloodBankStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn validate(tables: &Tables, unit: &UnitOfWork) -> Result<(), StoreError> {
        for update in &unit.batch_updates {
            let id = update.batch.id_typed();
            let current = tables
                .batches
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))?;
            if !update.expected_version.matches(current.version()) {
                return Err(StoreError::Conflict(format!(
                    "batch {id}: expected version {}, found {}",
                    update.expected_version.value(),
                    current.version()
                )));
            }
        }

        for (idx, batch) in unit.batch_inserts.iter().enumerate() {
            let id = batch.id_typed();
            let repeated = unit.batch_inserts[..idx]
                .iter()
                .any(|b| b.id_typed() == id);
            if repeated || tables.batches.contains_key(&id) {
                return Err(StoreError::Duplicate(format!("batch {id}")));
            }
        }

        for write in &unit.request_writes {
            let id = write.request.id_typed();
            let current = tables
                .requests
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("request {id}")))?;
            if !write.expected_version.matches(current.version()) {
                return Err(StoreError::Conflict(format!(
                    "request {id}: expected version {}, found {}",
                    write.expected_version.value(),
                    current.version()
                )));
            }
        }

        Ok(())
    }
}

impl BloodBankStore for InMemoryBloodBankStore {
    fn insert_batch(&self, batch: InventoryBatch) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let id = batch.id_typed();
        if tables.batches.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("batch {id}")));
        }
        tables.batches.insert(id, batch);
        Ok(())
    }

    fn get_batch(&self, id: BatchId) -> Result<Option<InventoryBatch>, StoreError> {
        Ok(self.read()?.batches.get(&id).cloned())
    }

    fn find_batches(&self, filter: &BatchFilter) -> Result<Vec<InventoryBatch>, StoreError> {
        let tables = self.read()?;
        let mut found: Vec<InventoryBatch> = tables
            .batches
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        found.sort_by_key(InventoryBatch::fifo_key);
        Ok(found)
    }

    fn sum_quantity(
        &self,
        blood_type: BloodType,
        status: BatchStatus,
        not_expired_at: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        let filter = BatchFilter {
            blood_type: Some(blood_type),
            status: Some(status),
            not_expired_at,
        };
        let tables = self.read()?;
        Ok(tables
            .batches
            .values()
            .filter(|b| filter.matches(b))
            .map(|b| u64::from(b.quantity()))
            .sum())
    }

    fn count_batches(&self, blood_type: BloodType, status: BatchStatus) -> Result<u64, StoreError> {
        let filter = BatchFilter::all()
            .with_blood_type(blood_type)
            .with_status(status);
        let tables = self.read()?;
        Ok(tables.batches.values().filter(|b| filter.matches(b)).count() as u64)
    }

    fn insert_request(&self, request: BloodRequest) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let id = request.id_typed();
        if tables.requests.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("request {id}")));
        }
        tables.requests.insert(id, request);
        Ok(())
    }

    fn get_request(&self, id: RequestId) -> Result<Option<BloodRequest>, StoreError> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<BloodRequest>, StoreError> {
        let tables = self.read()?;
        let mut found: Vec<BloodRequest> = tables
            .requests
            .values()
            .filter(|r| status.is_none_or(|st| r.status() == st))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.requested_at(), r.id_typed()));
        Ok(found)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        if unit.is_empty() {
            return Ok(());
        }

        let mut tables = self.write()?;
        Self::validate(&tables, &unit)?;

        for update in unit.batch_updates {
            tables.batches.insert(update.batch.id_typed(), update.batch);
        }
        for batch in unit.batch_inserts {
            tables.batches.insert(batch.id_typed(), batch);
        }
        for write in unit.request_writes {
            tables.requests.insert(write.request.id_typed(), write.request);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodbank_core::ExpectedVersion;
    use bloodbank_inventory::{
        AllocationTarget, BatchUpdate, ReceiveBatch, plan_allocation, plan_sweep,
    };
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn batch(blood_type: BloodType, quantity: u32, expires_in_days: i64) -> InventoryBatch {
        let (b, _) = InventoryBatch::receive(&ReceiveBatch {
            batch_id: BatchId::new(),
            blood_type,
            quantity,
            expiry_date: now() + Duration::days(expires_in_days),
            donor_id: None,
            received_at: now() - Duration::days(30),
        })
        .unwrap();
        b
    }

    #[test]
    fn find_batches_returns_fifo_order() {
        let store = InMemoryBloodBankStore::new();
        let late = batch(BloodType::APositive, 1, 9);
        let early = batch(BloodType::APositive, 1, 2);
        let other = batch(BloodType::BPositive, 1, 1);
        store.insert_batch(late.clone()).unwrap();
        store.insert_batch(early.clone()).unwrap();
        store.insert_batch(other).unwrap();

        let found = store
            .find_batches(&BatchFilter::all().with_blood_type(BloodType::APositive))
            .unwrap();
        assert_eq!(found, vec![early, late]);
    }

    #[test]
    fn sum_quantity_excludes_expired_when_asked() {
        let store = InMemoryBloodBankStore::new();
        store.insert_batch(batch(BloodType::ONegative, 4, 3)).unwrap();
        store.insert_batch(batch(BloodType::ONegative, 6, -1)).unwrap();

        let all = store
            .sum_quantity(BloodType::ONegative, BatchStatus::Available, None)
            .unwrap();
        let usable = store
            .sum_quantity(BloodType::ONegative, BatchStatus::Available, Some(now()))
            .unwrap();
        assert_eq!(all, 10);
        assert_eq!(usable, 4);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemoryBloodBankStore::new();
        let b = batch(BloodType::APositive, 1, 5);
        store.insert_batch(b.clone()).unwrap();
        assert!(matches!(
            store.insert_batch(b),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn commit_applies_allocation_atomically() {
        let store = InMemoryBloodBankStore::new();
        store.insert_batch(batch(BloodType::APositive, 3, 2)).unwrap();
        store.insert_batch(batch(BloodType::APositive, 4, 5)).unwrap();

        let snapshot = store.find_batches(&BatchFilter::all()).unwrap();
        let plan = plan_allocation(
            &snapshot,
            BloodType::APositive,
            5,
            AllocationTarget::Used,
            now(),
            BatchId::new,
        )
        .unwrap();
        store.commit(UnitOfWork::from_allocation(&plan)).unwrap();

        assert_eq!(
            store
                .sum_quantity(BloodType::APositive, BatchStatus::Available, Some(now()))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .sum_quantity(BloodType::APositive, BatchStatus::Used, None)
                .unwrap(),
            5
        );
        assert_eq!(store.count_batches(BloodType::APositive, BatchStatus::Used).unwrap(), 2);
    }

    #[test]
    fn stale_version_rejects_the_whole_unit() {
        let store = InMemoryBloodBankStore::new();
        let first = batch(BloodType::APositive, 2, 2);
        let second = batch(BloodType::APositive, 2, 3);
        store.insert_batch(first.clone()).unwrap();
        store.insert_batch(second.clone()).unwrap();

        // A sweep planned far in the future touches both batches...
        let sweep = plan_sweep(&[first.clone(), second.clone()], now() + Duration::days(10)).unwrap();
        let mut unit = UnitOfWork::from_sweep(&sweep);
        // ...but one write carries a stale expectation.
        unit.batch_updates[1].expected_version = ExpectedVersion::exact(7);

        assert!(matches!(store.commit(unit), Err(StoreError::Conflict(_))));
        assert_eq!(store.get_batch(first.id_typed()).unwrap(), Some(first));
        assert_eq!(store.get_batch(second.id_typed()).unwrap(), Some(second));
    }

    #[test]
    fn update_of_unknown_batch_is_not_found() {
        let store = InMemoryBloodBankStore::new();
        let ghost = batch(BloodType::BNegative, 1, 1);
        let unit = UnitOfWork {
            batch_updates: vec![BatchUpdate {
                batch: ghost,
                expected_version: ExpectedVersion::exact(1),
            }],
            ..UnitOfWork::default()
        };
        assert!(matches!(store.commit(unit), Err(StoreError::NotFound(_))));
    }
}
