use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloodbank_core::{AggregateRoot, BatchId, BloodType, DomainError, DonorId};
use bloodbank_events::Event;

/// Inventory batch lifecycle.
///
/// `Available` is the only state allocation or the expiry sweep can leave;
/// every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Available,
    Reserved,
    Used,
    Expired,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 4] = [
        BatchStatus::Available,
        BatchStatus::Reserved,
        BatchStatus::Used,
        BatchStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Available => "available",
            BatchStatus::Reserved => "reserved",
            BatchStatus::Used => "used",
            BatchStatus::Expired => "expired",
        }
    }

    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Available, BatchStatus::Reserved)
                | (BatchStatus::Available, BatchStatus::Used)
                | (BatchStatus::Available, BatchStatus::Expired)
        )
    }
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown batch status '{s}'")))
    }
}

/// Status an allocation moves consumed quantity into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationTarget {
    /// Units are issued to the recipient.
    #[default]
    Used,
    /// Units are held for the recipient but not yet issued.
    Reserved,
}

impl From<AllocationTarget> for BatchStatus {
    fn from(value: AllocationTarget) -> Self {
        match value {
            AllocationTarget::Used => BatchStatus::Used,
            AllocationTarget::Reserved => BatchStatus::Reserved,
        }
    }
}

impl core::str::FromStr for AllocationTarget {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "used" => Ok(AllocationTarget::Used),
            "reserved" => Ok(AllocationTarget::Reserved),
            other => Err(DomainError::validation(format!(
                "allocation target must be 'used' or 'reserved', got '{other}'"
            ))),
        }
    }
}

/// A quantity of units of one blood type with one expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBatch {
    id: BatchId,
    blood_type: BloodType,
    quantity: u32,
    expiry_date: DateTime<Utc>,
    status: BatchStatus,
    donor_id: Option<DonorId>,
    received_at: DateTime<Utc>,
    split_from: Option<BatchId>,
    version: u64,
}

/// Command: ReceiveBatch (donation intake).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub batch_id: BatchId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub expiry_date: DateTime<Utc>,
    pub donor_id: Option<DonorId>,
    pub received_at: DateTime<Utc>,
}

impl InventoryBatch {
    /// Validate an intake and build the new available batch.
    pub fn receive(cmd: &ReceiveBatch) -> Result<(Self, LedgerEvent), DomainError> {
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.expiry_date <= cmd.received_at {
            return Err(DomainError::validation(
                "expiry_date must be after the intake time",
            ));
        }

        let batch = Self {
            id: cmd.batch_id,
            blood_type: cmd.blood_type,
            quantity: cmd.quantity,
            expiry_date: cmd.expiry_date,
            status: BatchStatus::Available,
            donor_id: cmd.donor_id,
            received_at: cmd.received_at,
            split_from: None,
            version: 1,
        };

        let event = LedgerEvent::BatchReceived(BatchReceived {
            batch_id: batch.id,
            blood_type: batch.blood_type,
            quantity: batch.quantity,
            expiry_date: batch.expiry_date,
            donor_id: batch.donor_id,
            occurred_at: cmd.received_at,
        });

        Ok((batch, event))
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn donor_id(&self) -> Option<DonorId> {
        self.donor_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn split_from(&self) -> Option<BatchId> {
        self.split_from
    }

    /// Past its expiry date at `now` (regardless of status).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }

    /// Counts toward availability: available and not past expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BatchStatus::Available && !self.is_expired_at(now)
    }

    /// FIFO-by-expiry ordering key; ties broken by intake order, then id.
    pub fn fifo_key(&self) -> (DateTime<Utc>, DateTime<Utc>, BatchId) {
        (self.expiry_date, self.received_at, self.id)
    }

    fn transition(&mut self, next: BatchStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(format!(
                "batch {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.version += 1;
        Ok(())
    }

    /// Sweep transition: available and past expiry → expired.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<LedgerEvent, DomainError> {
        if !self.is_expired_at(now) {
            return Err(DomainError::invariant(format!(
                "batch {} has not reached its expiry date",
                self.id
            )));
        }
        self.transition(BatchStatus::Expired)?;

        Ok(LedgerEvent::BatchExpired(BatchExpired {
            batch_id: self.id,
            blood_type: self.blood_type,
            quantity: self.quantity,
            occurred_at: now,
        }))
    }

    /// Move the whole batch into the allocation target status.
    pub(crate) fn consume(
        &mut self,
        target: AllocationTarget,
        occurred_at: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        self.transition(target.into())?;

        Ok(LedgerEvent::BatchConsumed(BatchConsumed {
            batch_id: self.id,
            blood_type: self.blood_type,
            quantity: self.quantity,
            status: self.status,
            occurred_at,
        }))
    }

    /// Carve `quantity` units off this batch into a new consumed batch.
    ///
    /// The remainder stays available on `self`; the sum of both quantities
    /// equals the original quantity.
    pub(crate) fn split_off(
        &mut self,
        quantity: u32,
        target: AllocationTarget,
        new_id: BatchId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(InventoryBatch, LedgerEvent), DomainError> {
        if self.status != BatchStatus::Available {
            return Err(DomainError::invalid_state(format!(
                "batch {} is {} and cannot be split",
                self.id, self.status
            )));
        }
        if quantity == 0 || quantity >= self.quantity {
            return Err(DomainError::invariant(format!(
                "split quantity {quantity} must be between 1 and {}",
                self.quantity.saturating_sub(1)
            )));
        }

        let consumed = InventoryBatch {
            id: new_id,
            blood_type: self.blood_type,
            quantity,
            expiry_date: self.expiry_date,
            status: target.into(),
            donor_id: self.donor_id,
            received_at: self.received_at,
            split_from: Some(self.id),
            version: 1,
        };

        self.quantity -= quantity;
        self.version += 1;

        let event = LedgerEvent::BatchSplit(BatchSplit {
            source_id: self.id,
            consumed_id: consumed.id,
            blood_type: self.blood_type,
            consumed: quantity,
            remaining: self.quantity,
            status: consumed.status,
            occurred_at,
        });

        Ok((consumed, event))
    }
}

impl AggregateRoot for InventoryBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Event: BatchReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceived {
    pub batch_id: BatchId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub expiry_date: DateTime<Utc>,
    pub donor_id: Option<DonorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchConsumed (whole batch allocated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConsumed {
    pub batch_id: BatchId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub status: BatchStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchSplit (partial allocation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSplit {
    pub source_id: BatchId,
    pub consumed_id: BatchId,
    pub blood_type: BloodType,
    pub consumed: u32,
    pub remaining: u32,
    pub status: BatchStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExpired {
    pub batch_id: BatchId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BatchReceived(BatchReceived),
    BatchConsumed(BatchConsumed),
    BatchSplit(BatchSplit),
    BatchExpired(BatchExpired),
}

impl LedgerEvent {
    /// Batch the event is about (the source batch for splits).
    pub fn batch_id(&self) -> BatchId {
        match self {
            LedgerEvent::BatchReceived(e) => e.batch_id,
            LedgerEvent::BatchConsumed(e) => e.batch_id,
            LedgerEvent::BatchSplit(e) => e.source_id,
            LedgerEvent::BatchExpired(e) => e.batch_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BatchReceived(_) => "inventory.batch.received",
            LedgerEvent::BatchConsumed(_) => "inventory.batch.consumed",
            LedgerEvent::BatchSplit(_) => "inventory.batch.split",
            LedgerEvent::BatchExpired(_) => "inventory.batch.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::BatchReceived(e) => e.occurred_at,
            LedgerEvent::BatchConsumed(e) => e.occurred_at,
            LedgerEvent::BatchSplit(e) => e.occurred_at,
            LedgerEvent::BatchExpired(e) => e.occurred_at,
        }
    }
}
