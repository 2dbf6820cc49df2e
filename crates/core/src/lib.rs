//! `bloodbank-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the inventory and
//! request modules (no infrastructure concerns).

pub mod aggregate;
pub mod blood_type;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use blood_type::BloodType;
pub use error::DomainError;
pub use id::{BatchId, DonorId, RequestId, UserId};
