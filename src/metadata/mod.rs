//! Metadata repository: persisted records and the store facade.

pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryMetadataStore;
pub use models::*;
pub use store::{MetadataStore, StoreError, StoreResult};
