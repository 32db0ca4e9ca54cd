//! # Roundhouse
//! Station control plane for a pub/sub message broker.
//!
//! Roundhouse layers **stations** (logical topics with retention,
//! replication, idempotency, optional schema validation, and dead-letter
//! semantics) on top of a pub/sub substrate with per-subject queue groups
//! and persistent append-only streams. This crate is the control plane for
//! that abstraction: it receives lifecycle requests over a subject-addressed
//! request/reply protocol, validates and serializes them against persistent
//! metadata, reconciles them with the stream engine, and pushes schema
//! changes to live producers.
//!
//! # Goals
//! - Easy to understand code
//! - Leverage best in class libraries such as [Tokio](https://tokio.rs/) and
//!   [Serde](https://serde.rs/)
//! - Keep the storage and transport seams swappable behind traits
//!
//! ## Architecture
//!
//! Three facades isolate the outside world, each with a full in-memory
//! implementation used by the test suite:
//!
//! - [`metadata::MetadataStore`]: the persisted collections (stations,
//!   producers, consumers, schemas, connections, tags, audit logs)
//! - [`engine::StreamEngine`]: the append-only stream substrate
//! - [`wire::PubSub`]: the subject-addressed pub/sub wire
//!
//! [`control::ControlPlane`] threads the three together and owns every
//! lifecycle operation; [`dispatch::Dispatcher`] binds the fixed control
//! subjects to it under queue groups.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roundhouse::control::ControlPlane;
//! use roundhouse::dispatch::Dispatcher;
//! use roundhouse::engine::MemoryStreamEngine;
//! use roundhouse::metadata::MemoryMetadataStore;
//! use roundhouse::wire::MemoryPubSub;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     roundhouse::telemetry::init_logging(roundhouse::telemetry::LogFormat::from_env())?;
//!
//!     let wire = Arc::new(MemoryPubSub::new());
//!     let store = Arc::new(MemoryMetadataStore::new());
//!     let engine = Arc::new(MemoryStreamEngine::new(wire.clone()));
//!
//!     let control = Arc::new(ControlPlane::new(store, engine, wire.clone()));
//!     control.launch_dls_for_old_stations().await?;
//!
//!     let _dispatcher = Dispatcher::bind(control, wire).await?;
//!     // ... run until shutdown
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod analytics;
pub mod constants;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod nuid;
pub mod station;
pub mod telemetry;
pub mod types;
pub mod wire;

pub mod prelude {
    //! Main exports for embedders.

    pub use crate::control::ControlPlane;
    pub use crate::dispatch::{ControlSubject, Dispatcher};
    pub use crate::engine::{MemoryStreamEngine, StreamEngine};
    pub use crate::error::{Error, Result};
    pub use crate::metadata::{MemoryMetadataStore, MetadataStore};
    pub use crate::station::StationName;
    pub use crate::types::{Actor, ActorKind, Id};
    pub use crate::wire::{MemoryPubSub, PubSub};

    pub use bytes;
}
