//! Station naming and policy validation.
//!
//! A station has two name forms: the external form users see and the
//! internal form the stream engine is addressed with. [`name`] owns the
//! reversible mapping between them; [`validation`] owns the character-set
//! rules and the retention/storage/replica policy bounds.

pub mod name;
pub mod validation;

pub use name::StationName;
pub use validation::{
    normalize_idempotency_window, validate_entity_name, validate_replicas, RetentionType,
    StorageType,
};
