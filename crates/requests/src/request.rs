use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloodbank_core::{
    Aggregate, AggregateRoot, BatchId, BloodType, DomainError, RequestId, UserId,
};
use bloodbank_events::Event;

/// Clinical urgency of a request. Ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl core::str::FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(DomainError::validation(format!(
                "priority must be one of: low, medium, high, critical (got '{other}')"
            ))),
        }
    }
}

/// Request status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table: only `pending` may move, and only once.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Fulfilled)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Pending, RequestStatus::Cancelled)
        )
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "fulfilled" => Ok(RequestStatus::Fulfilled),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" | "canceled" => Ok(RequestStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown request status '{other}'"
            ))),
        }
    }
}

/// Aggregate root: BloodRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloodRequest {
    id: RequestId,
    blood_type: BloodType,
    quantity: u32,
    priority: Priority,
    status: RequestStatus,
    patient_name: String,
    hospital: Option<String>,
    notes: Option<String>,
    requested_at: Option<DateTime<Utc>>,
    processed_by: Option<UserId>,
    processed_at: Option<DateTime<Utc>>,
    resolution_note: Option<String>,
    allocated_batches: Vec<BatchId>,
    version: u64,
    created: bool,
}

impl BloodRequest {
    /// Create an empty, not-yet-submitted aggregate instance.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            blood_type: BloodType::OPositive,
            quantity: 0,
            priority: Priority::default(),
            status: RequestStatus::Pending,
            patient_name: String::new(),
            hospital: None,
            notes: None,
            requested_at: None,
            processed_by: None,
            processed_at: None,
            resolution_note: None,
            allocated_batches: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn hospital(&self) -> Option<&str> {
        self.hospital.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn processed_by(&self) -> Option<UserId> {
        self.processed_by
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn resolution_note(&self) -> Option<&str> {
        self.resolution_note.as_deref()
    }

    pub fn allocated_batches(&self) -> &[BatchId] {
        &self.allocated_batches
    }

    pub fn is_pending(&self) -> bool {
        self.created && self.status == RequestStatus::Pending
    }
}

impl AggregateRoot for BloodRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub priority: Priority,
    pub patient_name: String,
    pub hospital: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FulfillRequest.
///
/// Issued by the fulfillment engine once an allocation has been planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillRequest {
    pub request_id: RequestId,
    pub allocated_batches: Vec<BatchId>,
    pub allocated_quantity: u64,
    pub processed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub processed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    Submit(SubmitRequest),
    Fulfill(FulfillRequest),
    Reject(RejectRequest),
    Cancel(CancelRequest),
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub request_id: RequestId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub priority: Priority,
    pub patient_name: String,
    pub hospital: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestFulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFulfilled {
    pub request_id: RequestId,
    pub blood_type: BloodType,
    pub quantity: u32,
    pub allocated_batches: Vec<BatchId>,
    pub processed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub processed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCancelled {
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestSubmitted(RequestSubmitted),
    RequestFulfilled(RequestFulfilled),
    RequestRejected(RequestRejected),
    RequestCancelled(RequestCancelled),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestSubmitted(_) => "requests.request.submitted",
            RequestEvent::RequestFulfilled(_) => "requests.request.fulfilled",
            RequestEvent::RequestRejected(_) => "requests.request.rejected",
            RequestEvent::RequestCancelled(_) => "requests.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestFulfilled(e) => e.occurred_at,
            RequestEvent::RequestRejected(e) => e.occurred_at,
            RequestEvent::RequestCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BloodRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestSubmitted(e) => {
                self.id = e.request_id;
                self.blood_type = e.blood_type;
                self.quantity = e.quantity;
                self.priority = e.priority;
                self.status = RequestStatus::Pending;
                self.patient_name = e.patient_name.clone();
                self.hospital = e.hospital.clone();
                self.notes = e.notes.clone();
                self.requested_at = Some(e.occurred_at);
                self.created = true;
            }
            RequestEvent::RequestFulfilled(e) => {
                self.status = RequestStatus::Fulfilled;
                self.allocated_batches = e.allocated_batches.clone();
                self.processed_by = e.processed_by;
                self.processed_at = Some(e.occurred_at);
            }
            RequestEvent::RequestRejected(e) => {
                self.status = RequestStatus::Rejected;
                self.resolution_note = e.reason.clone();
                self.processed_by = e.processed_by;
                self.processed_at = Some(e.occurred_at);
            }
            RequestEvent::RequestCancelled(e) => {
                self.status = RequestStatus::Cancelled;
                self.resolution_note = e.reason.clone();
                self.processed_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::Submit(cmd) => self.handle_submit(cmd),
            RequestCommand::Fulfill(cmd) => self.handle_fulfill(cmd),
            RequestCommand::Reject(cmd) => self.handle_reject(cmd),
            RequestCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl BloodRequest {
    /// Handle + apply in one step, returning the emitted events.
    pub fn execute(&mut self, command: &RequestCommand) -> Result<Vec<RequestEvent>, DomainError> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    fn ensure_request_id(&self, request_id: RequestId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, next: RequestStatus) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(format!(
                "request {} is {}; only pending requests can become {}",
                self.id, self.status, next
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("request already exists"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.patient_name.trim().is_empty() {
            return Err(DomainError::validation("patient_name cannot be empty"));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            request_id: cmd.request_id,
            blood_type: cmd.blood_type,
            quantity: cmd.quantity,
            priority: cmd.priority,
            patient_name: cmd.patient_name.trim().to_string(),
            hospital: cmd.hospital.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fulfill(&self, cmd: &FulfillRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_transition(RequestStatus::Fulfilled)?;
        self.ensure_request_id(cmd.request_id)?;

        if cmd.allocated_quantity != u64::from(self.quantity) {
            return Err(DomainError::invariant(format!(
                "allocated {} units for a request of {}",
                cmd.allocated_quantity, self.quantity
            )));
        }
        if cmd.allocated_batches.is_empty() {
            return Err(DomainError::invariant(
                "fulfillment must reference at least one batch",
            ));
        }

        Ok(vec![RequestEvent::RequestFulfilled(RequestFulfilled {
            request_id: cmd.request_id,
            blood_type: self.blood_type,
            quantity: self.quantity,
            allocated_batches: cmd.allocated_batches.clone(),
            processed_by: cmd.processed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_transition(RequestStatus::Rejected)?;
        self.ensure_request_id(cmd.request_id)?;

        Ok(vec![RequestEvent::RequestRejected(RequestRejected {
            request_id: cmd.request_id,
            reason: cmd.reason.clone(),
            processed_by: cmd.processed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_transition(RequestStatus::Cancelled)?;
        self.ensure_request_id(cmd.request_id)?;

        Ok(vec![RequestEvent::RequestCancelled(RequestCancelled {
            request_id: cmd.request_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
