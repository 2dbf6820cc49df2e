use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use bloodbank_core::{DonorId, UserId};
use bloodbank_infra::Approval;
use bloodbank_inventory::InventoryBatch;
use bloodbank_requests::BloodRequest;

// -------------------------
// Request DTOs
// -------------------------

/// Blood types and priorities arrive as text so that any accepted spelling
/// ("AB+", "ab_pos") parses, with a 400 naming the field otherwise.
#[derive(Debug, Deserialize)]
pub struct ReceiveBatchRequest {
    pub blood_type: String,
    pub quantity: u32,
    pub expiry_date: DateTime<Utc>,
    pub donor_id: Option<DonorId>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequestRequest {
    pub blood_type: String,
    pub quantity: u32,
    pub priority: Option<String>,
    pub patient_name: String,
    pub hospital: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequestRequest {
    pub processed_by: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequestRequest {
    pub reason: Option<String>,
    pub processed_by: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequestRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    pub blood_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub status: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn batch_to_json(batch: &InventoryBatch) -> serde_json::Value {
    json!({
        "id": batch.id_typed().to_string(),
        "blood_type": batch.blood_type(),
        "quantity": batch.quantity(),
        "expiry_date": batch.expiry_date(),
        "status": batch.status(),
        "donor_id": batch.donor_id(),
        "received_at": batch.received_at(),
        "split_from": batch.split_from(),
    })
}

pub fn request_to_json(request: &BloodRequest) -> serde_json::Value {
    json!({
        "id": request.id_typed().to_string(),
        "blood_type": request.blood_type(),
        "quantity": request.quantity(),
        "priority": request.priority(),
        "status": request.status(),
        "patient_name": request.patient_name(),
        "hospital": request.hospital(),
        "notes": request.notes(),
        "requested_at": request.requested_at(),
        "processed_by": request.processed_by(),
        "processed_at": request.processed_at(),
        "resolution_note": request.resolution_note(),
        "allocated_batches": request.allocated_batches(),
    })
}

pub fn approval_to_json(approval: &Approval) -> serde_json::Value {
    json!({
        "request": request_to_json(&approval.request),
        "allocated_quantity": approval.allocation.allocated_quantity(),
        "allocations": approval.allocation.deltas,
        "expired_swept": approval.expired_swept,
    })
}
