//! Job store boundary for the EVD pipeline.
//!
//! Defines the [`JobStore`] contract consumed by the scheduler and an
//! in-memory reference implementation used by tests and embedders
//! without an external document store.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryJobStore;
pub use store::JobStore;
