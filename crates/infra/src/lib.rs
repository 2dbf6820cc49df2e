//! Infrastructure layer: persistence boundary, clock, and the application
//! services (Inventory Ledger, Request Fulfillment Engine) built on it.

pub mod clock;
pub mod config;
pub mod fulfillment;
pub mod ledger;
pub mod store;


pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use fulfillment::{
    Approval, BloodBankEnvelope, FulfillmentEngine, FulfillmentError, NewBatch, NewRequest,
};
pub use ledger::{InventoryLedger, LedgerError, StockLevel};
pub use store::{BatchFilter, BloodBankStore, InMemoryBloodBankStore, StoreError, UnitOfWork};
