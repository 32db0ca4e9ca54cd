//! The station control plane.
//!
//! [`ControlPlane`] is the explicitly constructed server value threaded into
//! every handler: it owns handles to the metadata store, the stream engine,
//! the pub/sub wire, the analytics sink, and the process-wide unique-id
//! source. It has no other global state; concurrency correctness rests on
//! the store's conditional updates and the engine's idempotent operations,
//! never on a per-station lock.
//!
//! Handlers are grouped by concern:
//! - [`stations`]: create/destroy, resource teardown, DLS bootstrap/config
//! - [`schemas`]: attach/detach and live propagation to producers
//! - [`producers`] / [`consumers`]: client lifecycle
//! - [`dls`]: dead-letter inspection, ack, resend, message journeys

pub mod consumers;
pub mod dls;
pub mod producers;
pub mod schemas;
pub mod stations;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use crate::analytics::{AnalyticsSink, NoopAnalytics};
use crate::engine::{EngineResult, StreamEngine};
use crate::metadata::models::AuditLog;
use crate::metadata::MetadataStore;
use crate::nuid::Nuid;
use crate::types::{Actor, Id};
use crate::wire::PubSub;

/// Caller-provided stream creation or removal step, used on the non-native
/// paths where a foreign stream-engine client owns the main stream.
pub type StreamHook = Pin<Box<dyn Future<Output = EngineResult<()>> + Send>>;

/// The control-plane server value.
pub struct ControlPlane {
    store: Arc<dyn MetadataStore>,
    engine: Arc<dyn StreamEngine>,
    wire: Arc<dyn PubSub>,
    analytics: Arc<dyn AnalyticsSink>,
    nuid: Nuid,
}

impl ControlPlane {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        engine: Arc<dyn StreamEngine>,
        wire: Arc<dyn PubSub>,
    ) -> Self {
        ControlPlane {
            store,
            engine,
            wire,
            analytics: Arc::new(NoopAnalytics),
            nuid: Nuid::new(),
        }
    }

    /// Replace the analytics sink.
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub(crate) fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    pub(crate) fn engine(&self) -> &dyn StreamEngine {
        self.engine.as_ref()
    }

    pub(crate) fn wire(&self) -> Arc<dyn PubSub> {
        self.wire.clone()
    }

    pub(crate) fn analytics(&self) -> &dyn AnalyticsSink {
        self.analytics.as_ref()
    }

    pub(crate) fn nuid(&self) -> &Nuid {
        &self.nuid
    }

    /// Append one audit record. Audit persistence never fails the business
    /// operation: errors are logged and swallowed.
    pub(crate) async fn audit(&self, station_name: &str, message: &str, actor: &Actor) {
        let log = AuditLog {
            id: Id::new(),
            station_name: station_name.to_string(),
            message: message.to_string(),
            created_by_user: actor.username.clone(),
            creation_date: Utc::now(),
            user_type: actor.kind,
        };
        if let Err(e) = self.store.create_audit_logs(vec![log]).await {
            error!(station = station_name, error = %e, "failed writing audit log");
        }
    }
}
