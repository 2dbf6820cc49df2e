//! Blood request domain module.
//!
//! A request moves through a small lifecycle (`pending` → `fulfilled` |
//! `rejected` | `cancelled`), modelled as a command/event aggregate.

pub mod request;

pub use request::{
    BloodRequest, CancelRequest, FulfillRequest, Priority, RejectRequest, RequestCancelled,
    RequestCommand, RequestEvent, RequestFulfilled, RequestRejected, RequestStatus,
    RequestSubmitted, SubmitRequest,
};
