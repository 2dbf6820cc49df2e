//! FIFO-by-expiry allocation and expiry sweep planning.
//!
//! Planning is pure: it takes a snapshot of batches, decides which ones change,
//! and returns the new batch states together with the version each write must
//! be conditioned on. Nothing is persisted here; the caller commits a plan as a
//! single unit of work or discards it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloodbank_core::{AggregateRoot, BatchId, BloodType, DomainError, ExpectedVersion};

use crate::batch::{AllocationTarget, BatchStatus, InventoryBatch, LedgerEvent};

/// A batch state to write, guarded by the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdate {
    pub batch: InventoryBatch,
    pub expected_version: ExpectedVersion,
}

/// What an allocation did to one source batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchDelta {
    /// The whole batch moved to `status`.
    Consumed {
        batch_id: BatchId,
        quantity: u32,
        status: BatchStatus,
    },
    /// `consumed` units moved to a new batch; `remaining` stay available.
    Split {
        source_id: BatchId,
        consumed_id: BatchId,
        consumed: u32,
        remaining: u32,
        status: BatchStatus,
    },
}

impl BatchDelta {
    pub fn consumed_quantity(&self) -> u32 {
        match self {
            BatchDelta::Consumed { quantity, .. } => *quantity,
            BatchDelta::Split { consumed, .. } => *consumed,
        }
    }

    /// Batch that now holds the consumed units.
    pub fn consumed_batch_id(&self) -> BatchId {
        match self {
            BatchDelta::Consumed { batch_id, .. } => *batch_id,
            BatchDelta::Split { consumed_id, .. } => *consumed_id,
        }
    }
}

/// Planned allocation for one blood type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub blood_type: BloodType,
    pub target: AllocationTarget,
    pub deltas: Vec<BatchDelta>,
    /// Existing batches to overwrite (consumed or reduced by a split).
    pub updated: Vec<BatchUpdate>,
    /// Batches carved off by a split.
    pub created: Vec<InventoryBatch>,
    pub events: Vec<LedgerEvent>,
}

impl AllocationPlan {
    pub fn allocated_quantity(&self) -> u64 {
        self.deltas
            .iter()
            .map(|d| u64::from(d.consumed_quantity()))
            .sum()
    }

    /// Ids of the batches now holding the allocated units.
    pub fn consumed_batch_ids(&self) -> Vec<BatchId> {
        self.deltas.iter().map(BatchDelta::consumed_batch_id).collect()
    }
}

/// Planned expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepPlan {
    pub updated: Vec<BatchUpdate>,
    pub events: Vec<LedgerEvent>,
}

impl SweepPlan {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updated.len()
    }
}

/// Sum of usable units of `blood_type` at `now`.
pub fn available_quantity<'a, I>(batches: I, blood_type: BloodType, now: DateTime<Utc>) -> u64
where
    I: IntoIterator<Item = &'a InventoryBatch>,
{
    batches
        .into_iter()
        .filter(|b| b.blood_type() == blood_type && b.is_usable_at(now))
        .map(|b| u64::from(b.quantity()))
        .sum()
}

/// Usable batches of `blood_type`, earliest expiry first.
pub fn fifo_candidates<'a, I>(
    batches: I,
    blood_type: BloodType,
    now: DateTime<Utc>,
) -> Vec<&'a InventoryBatch>
where
    I: IntoIterator<Item = &'a InventoryBatch>,
{
    let mut candidates: Vec<&InventoryBatch> = batches
        .into_iter()
        .filter(|b| b.blood_type() == blood_type && b.is_usable_at(now))
        .collect();
    candidates.sort_by_key(|b| b.fifo_key());
    candidates
}

/// Decide which batches satisfy `quantity` units of `blood_type`.
///
/// Whole batches are consumed while they fit in the remaining need; the first
/// batch larger than the remaining need is split. Fails with
/// `InsufficientStock` (and plans nothing) when usable stock is short.
pub fn plan_allocation(
    batches: &[InventoryBatch],
    blood_type: BloodType,
    quantity: u32,
    target: AllocationTarget,
    now: DateTime<Utc>,
    mut next_id: impl FnMut() -> BatchId,
) -> Result<AllocationPlan, DomainError> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }

    let available = available_quantity(batches, blood_type, now);
    if available < u64::from(quantity) {
        return Err(DomainError::insufficient_stock(available, u64::from(quantity)));
    }

    let mut plan = AllocationPlan {
        blood_type,
        target,
        deltas: Vec::new(),
        updated: Vec::new(),
        created: Vec::new(),
        events: Vec::new(),
    };

    let mut remaining = quantity;
    for source in fifo_candidates(batches, blood_type, now) {
        if remaining == 0 {
            break;
        }

        let expected_version = ExpectedVersion::exact(source.version());
        let mut batch = source.clone();

        if batch.quantity() <= remaining {
            remaining -= batch.quantity();
            let event = batch.consume(target, now)?;
            plan.deltas.push(BatchDelta::Consumed {
                batch_id: batch.id_typed(),
                quantity: batch.quantity(),
                status: batch.status(),
            });
            plan.events.push(event);
            plan.updated.push(BatchUpdate {
                batch,
                expected_version,
            });
        } else {
            let (consumed, event) = batch.split_off(remaining, target, next_id(), now)?;
            remaining = 0;
            plan.deltas.push(BatchDelta::Split {
                source_id: batch.id_typed(),
                consumed_id: consumed.id_typed(),
                consumed: consumed.quantity(),
                remaining: batch.quantity(),
                status: consumed.status(),
            });
            plan.events.push(event);
            plan.created.push(consumed);
            plan.updated.push(BatchUpdate {
                batch,
                expected_version,
            });
        }
    }

    if remaining != 0 {
        return Err(DomainError::invariant(format!(
            "allocation left {remaining} units unplanned"
        )));
    }

    Ok(plan)
}

/// Expire every available batch whose expiry date is before `now`.
pub fn plan_sweep(batches: &[InventoryBatch], now: DateTime<Utc>) -> Result<SweepPlan, DomainError> {
    let mut plan = SweepPlan::default();

    for source in batches
        .iter()
        .filter(|b| b.status() == BatchStatus::Available && b.is_expired_at(now))
    {
        let expected_version = ExpectedVersion::exact(source.version());
        let mut batch = source.clone();
        plan.events.push(batch.expire(now)?);
        plan.updated.push(BatchUpdate {
            batch,
            expected_version,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ReceiveBatch;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn batch(blood_type: BloodType, quantity: u32, expires_in_days: i64, received_offset_min: i64) -> InventoryBatch {
        let (b, _) = InventoryBatch::receive(&ReceiveBatch {
            batch_id: BatchId::new(),
            blood_type,
            quantity,
            expiry_date: t0() + Duration::days(expires_in_days),
            donor_id: None,
            received_at: t0() - Duration::days(10) + Duration::minutes(received_offset_min),
        })
        .unwrap();
        b
    }

    /// Apply a plan to a snapshot the way a store would.
    fn apply(batches: &[InventoryBatch], plan: &AllocationPlan) -> Vec<InventoryBatch> {
        let mut by_id: HashMap<BatchId, InventoryBatch> =
            batches.iter().map(|b| (b.id_typed(), b.clone())).collect();
        for u in &plan.updated {
            by_id.insert(u.batch.id_typed(), u.batch.clone());
        }
        for c in &plan.created {
            by_id.insert(c.id_typed(), c.clone());
        }
        by_id.into_values().collect()
    }

    fn total(batches: &[InventoryBatch], blood_type: BloodType) -> u64 {
        batches
            .iter()
            .filter(|b| b.blood_type() == blood_type)
            .map(|b| u64::from(b.quantity()))
            .sum()
    }

    #[test]
    fn consumes_earliest_expiry_then_splits_the_next_batch() {
        let b1 = batch(BloodType::APositive, 3, 5, 0);
        let b2 = batch(BloodType::APositive, 4, 10, 0);
        let split_id = BatchId::new();
        let batches = vec![b2.clone(), b1.clone()];

        let plan = plan_allocation(
            &batches,
            BloodType::APositive,
            5,
            AllocationTarget::Used,
            t0(),
            || split_id,
        )
        .unwrap();

        assert_eq!(
            plan.deltas,
            vec![
                BatchDelta::Consumed {
                    batch_id: b1.id_typed(),
                    quantity: 3,
                    status: BatchStatus::Used,
                },
                BatchDelta::Split {
                    source_id: b2.id_typed(),
                    consumed_id: split_id,
                    consumed: 2,
                    remaining: 2,
                    status: BatchStatus::Used,
                },
            ]
        );
        assert_eq!(plan.allocated_quantity(), 5);
        assert_eq!(plan.consumed_batch_ids(), vec![b1.id_typed(), split_id]);

        let after = apply(&batches, &plan);
        assert_eq!(available_quantity(&after, BloodType::APositive, t0()), 2);
        assert_eq!(total(&after, BloodType::APositive), 7);
    }

    #[test]
    fn updates_are_guarded_by_the_read_version() {
        let b1 = batch(BloodType::BNegative, 2, 3, 0);
        let plan = plan_allocation(
            std::slice::from_ref(&b1),
            BloodType::BNegative,
            2,
            AllocationTarget::Reserved,
            t0(),
            BatchId::new,
        )
        .unwrap();

        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].expected_version, ExpectedVersion::exact(1));
        assert_eq!(plan.updated[0].batch.version(), 2);
        assert_eq!(plan.updated[0].batch.status(), BatchStatus::Reserved);
        assert!(plan.created.is_empty());
    }

    #[test]
    fn insufficient_stock_plans_nothing() {
        let batches = vec![batch(BloodType::ONegative, 3, 5, 0)];
        let err = plan_allocation(
            &batches,
            BloodType::ONegative,
            10,
            AllocationTarget::Used,
            t0(),
            BatchId::new,
        )
        .unwrap_err();

        assert_eq!(err, DomainError::insufficient_stock(3, 10));
    }

    #[test]
    fn ignores_other_types_expired_and_consumed_batches() {
        let mut used = batch(BloodType::OPositive, 5, 5, 0);
        used.consume(AllocationTarget::Used, t0()).unwrap();
        let stale = batch(BloodType::OPositive, 5, -1, 0);
        let other = batch(BloodType::OPositive, 1, 4, 0);
        let wrong_type = batch(BloodType::AbNegative, 9, 4, 0);

        let batches = vec![used, stale, other.clone(), wrong_type];
        assert_eq!(available_quantity(&batches, BloodType::OPositive, t0()), 1);

        let plan = plan_allocation(
            &batches,
            BloodType::OPositive,
            1,
            AllocationTarget::Used,
            t0(),
            BatchId::new,
        )
        .unwrap();
        assert_eq!(plan.consumed_batch_ids(), vec![other.id_typed()]);
    }

    #[test]
    fn equal_expiry_breaks_ties_by_intake_order() {
        let later = batch(BloodType::BPositive, 2, 7, 30);
        let earlier = batch(BloodType::BPositive, 2, 7, 0);
        let batches = vec![later.clone(), earlier.clone()];

        let plan = plan_allocation(
            &batches,
            BloodType::BPositive,
            2,
            AllocationTarget::Used,
            t0(),
            BatchId::new,
        )
        .unwrap();
        assert_eq!(plan.consumed_batch_ids(), vec![earlier.id_typed()]);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = plan_allocation(
            &[],
            BloodType::APositive,
            0,
            AllocationTarget::Used,
            t0(),
            BatchId::new,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn sweep_expires_only_past_available_batches_and_is_idempotent() {
        let fresh = batch(BloodType::ANegative, 2, 3, 0);
        let stale = batch(BloodType::ANegative, 4, -2, 0);
        let mut consumed_stale = batch(BloodType::ANegative, 1, -2, 0);
        consumed_stale.consume(AllocationTarget::Used, t0()).unwrap();
        let batches = vec![fresh, stale.clone(), consumed_stale];

        let plan = plan_sweep(&batches, t0()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.updated[0].batch.id_typed(), stale.id_typed());
        assert_eq!(plan.updated[0].batch.status(), BatchStatus::Expired);

        let mut after: HashMap<BatchId, InventoryBatch> =
            batches.iter().map(|b| (b.id_typed(), b.clone())).collect();
        for u in plan.updated {
            after.insert(u.batch.id_typed(), u.batch);
        }
        let after: Vec<InventoryBatch> = after.into_values().collect();
        assert!(plan_sweep(&after, t0()).unwrap().is_empty());
    }

    fn arb_batches() -> impl Strategy<Value = Vec<(u32, i64, i64)>> {
        prop::collection::vec((1u32..20, -3i64..30, 0i64..600), 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: allocation never creates or destroys units, and exactly the
        /// requested quantity leaves the available pool.
        #[test]
        fn allocation_conserves_quantity(specs in arb_batches(), want in 1u32..60) {
            let batches: Vec<InventoryBatch> = specs
                .iter()
                .map(|(q, exp, recv)| batch(BloodType::APositive, *q, *exp, *recv))
                .collect();
            let before_total = total(&batches, BloodType::APositive);
            let before_available = available_quantity(&batches, BloodType::APositive, t0());

            match plan_allocation(&batches, BloodType::APositive, want, AllocationTarget::Used, t0(), BatchId::new) {
                Ok(plan) => {
                    let after = apply(&batches, &plan);
                    prop_assert_eq!(total(&after, BloodType::APositive), before_total);
                    prop_assert_eq!(plan.allocated_quantity(), u64::from(want));
                    prop_assert_eq!(
                        available_quantity(&after, BloodType::APositive, t0()),
                        before_available - u64::from(want)
                    );
                    prop_assert!(plan.created.len() <= 1);
                }
                Err(DomainError::InsufficientStock { available, required }) => {
                    prop_assert_eq!(available, before_available);
                    prop_assert_eq!(required, u64::from(want));
                    prop_assert!(before_available < u64::from(want));
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        /// Property: no touched batch expires after an untouched usable batch.
        #[test]
        fn allocation_is_fifo_by_expiry(specs in arb_batches(), want in 1u32..20) {
            let batches: Vec<InventoryBatch> = specs
                .iter()
                .map(|(q, exp, recv)| batch(BloodType::APositive, *q, *exp, *recv))
                .collect();

            if let Ok(plan) = plan_allocation(&batches, BloodType::APositive, want, AllocationTarget::Used, t0(), BatchId::new) {
                let touched: Vec<BatchId> = plan.updated.iter().map(|u| u.batch.id_typed()).collect();
                let latest_touched = plan
                    .updated
                    .iter()
                    .map(|u| u.batch.fifo_key())
                    .max()
                    .unwrap();

                for b in fifo_candidates(&batches, BloodType::APositive, t0()) {
                    if !touched.contains(&b.id_typed()) {
                        prop_assert!(b.fifo_key() > latest_touched);
                    }
                }
            }
        }

        /// Property: taking Q < q from a single batch yields one consumed batch
        /// of Q and leaves q - Q available.
        #[test]
        fn single_batch_split_is_exact(q in 2u32..100, take_ratio in 0.01f64..0.99) {
            let take = ((f64::from(q) * take_ratio) as u32).clamp(1, q - 1);
            let source = batch(BloodType::OPositive, q, 10, 0);

            let plan = plan_allocation(
                std::slice::from_ref(&source),
                BloodType::OPositive,
                take,
                AllocationTarget::Used,
                t0(),
                BatchId::new,
            ).unwrap();

            prop_assert_eq!(plan.created.len(), 1);
            prop_assert_eq!(plan.created[0].quantity(), take);
            prop_assert_eq!(plan.created[0].status(), BatchStatus::Used);
            prop_assert_eq!(plan.updated.len(), 1);
            prop_assert_eq!(plan.updated[0].batch.quantity(), q - take);
            prop_assert_eq!(plan.updated[0].batch.status(), BatchStatus::Available);
        }
    }
}
