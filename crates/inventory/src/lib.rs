//! Inventory domain module.
//!
//! Business rules for blood inventory batches, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): batch lifecycle,
//! FIFO-by-expiry allocation planning and the expiry sweep.

pub mod allocation;
pub mod batch;

pub use allocation::{
    AllocationPlan, BatchDelta, BatchUpdate, SweepPlan, available_quantity, fifo_candidates,
    plan_allocation, plan_sweep,
};
pub use batch::{
    AllocationTarget, BatchConsumed, BatchExpired, BatchReceived, BatchSplit, BatchStatus,
    InventoryBatch, LedgerEvent, ReceiveBatch,
};
