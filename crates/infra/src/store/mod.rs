//! Persistence boundary for batches and requests.
//!
//! The engine only talks to [`BloodBankStore`]; every multi-record change goes
//! through a version-conditioned [`UnitOfWork`].

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryBloodBankStore;
pub use r#trait::{BatchFilter, BloodBankStore, RequestWrite, StoreError, UnitOfWork};
