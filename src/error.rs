//! Control-plane error types.
//!
//! # Error Hierarchy
//!
//! The crate uses a two-layer error hierarchy:
//!
//! ## Facade Layer
//!
//! - [`EngineError`](crate::engine::EngineError): stream-engine failures,
//!   with a typed `StreamNotFound` the bootstrap path keys off
//! - [`StoreError`](crate::metadata::StoreError): metadata-store failures
//! - [`WireError`](crate::wire::WireError): pub/sub substrate failures
//!
//! ## Control Layer (this module)
//!
//! [`Error`] is the single currency of every lifecycle operation. Facade
//! errors convert into it via `From` impls; the dispatcher and the HTTP
//! layer classify it with [`Error::is_showable`] and [`Error::http_status`].
//!
//! # Policy
//!
//! Showable errors (bad names, conflicts, missing entities) are returned to
//! callers verbatim. Engine, store, and wire failures are logged with
//! context and surface to HTTP callers as a generic internal error; wire
//! callers receive the underlying error string, preserving the historical
//! SDK-visible behavior.

use thiserror::Error as ThisError;

use crate::constants::SHOWABLE_ERROR_STATUS_CODE;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors observable at the wire and HTTP boundaries of the control plane.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// Canonicalization rejected a station, producer, or consumer name.
    #[error("{0}")]
    InvalidName(String),

    /// A live station with this external name already exists.
    #[error("Station {0} already exists")]
    NameExists(String),

    /// A required record is missing from the metadata store.
    #[error("{entity} {name} does not exist")]
    NotFound { entity: &'static str, name: String },

    /// Retention, storage, replicas, or another policy field is out of range.
    #[error("{0}")]
    Validation(String),

    /// A referenced schema does not exist.
    #[error("Schema {0} does not exist")]
    SchemaMissing(String),

    /// The engine reports stream-not-found on a path that requires it.
    #[error("stream {0} does not exist")]
    StreamMissing(String),

    /// Any other stream-engine failure.
    #[error("{0}")]
    Engine(String),

    /// Any metadata-store failure.
    #[error("{0}")]
    Store(String),

    /// The request envelope could not be decoded.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Required message headers are absent; the producing SDK is too old.
    #[error(
        "Error while getting notified about a poison message: Missing mandatory message headers, please upgrade the SDK version you are using"
    )]
    HeadersMissing,

    /// No actor on an actor-requiring management call.
    #[error("Unauthorized")]
    Unauthorized,
}

impl Error {
    /// Convenience constructor for missing-record errors.
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// True when the message is safe and useful to show to the caller
    /// verbatim (input mistakes, conflicts, missing entities).
    pub fn is_showable(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::NameExists(_)
                | Error::NotFound { .. }
                | Error::Validation(_)
                | Error::SchemaMissing(_)
                | Error::BadRequest(_)
                | Error::HeadersMissing
        )
    }

    /// HTTP status the management API maps this error to.
    pub fn http_status(&self) -> u16 {
        if self.is_showable() {
            SHOWABLE_ERROR_STATUS_CODE
        } else if matches!(self, Error::Unauthorized) {
            401
        } else {
            500
        }
    }
}

impl From<crate::engine::EngineError> for Error {
    fn from(e: crate::engine::EngineError) -> Self {
        match e {
            crate::engine::EngineError::StreamNotFound(name) => Error::StreamMissing(name),
            other => Error::Engine(other.to_string()),
        }
    }
}

impl From<crate::metadata::StoreError> for Error {
    fn from(e: crate::metadata::StoreError) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<crate::wire::WireError> for Error {
    fn from(e: crate::wire::WireError) -> Self {
        Error::Engine(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_exists_message() {
        let err = Error::NameExists("orders".to_string());
        assert_eq!(err.to_string(), "Station orders already exists");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Station", "orders");
        assert_eq!(err.to_string(), "Station orders does not exist");
    }

    #[test]
    fn test_not_found_with_zero_value_record() {
        // Destroying an absent station reports the zero-valued record's
        // (empty) name. Historical behavior, kept observable.
        let err = Error::not_found("Station", "");
        assert_eq!(err.to_string(), "Station  does not exist");
    }

    #[test]
    fn test_showable_classification() {
        assert!(Error::InvalidName("bad".into()).is_showable());
        assert!(Error::NameExists("orders".into()).is_showable());
        assert!(Error::not_found("Schema", "s").is_showable());
        assert!(Error::Validation("out of range".into()).is_showable());
        assert!(Error::SchemaMissing("s".into()).is_showable());
        assert!(Error::HeadersMissing.is_showable());

        assert!(!Error::StreamMissing("x".into()).is_showable());
        assert!(!Error::Engine("boom".into()).is_showable());
        assert!(!Error::Store("boom".into()).is_showable());
        assert!(!Error::Unauthorized.is_showable());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            Error::NameExists("orders".into()).http_status(),
            SHOWABLE_ERROR_STATUS_CODE
        );
        assert_eq!(Error::Unauthorized.http_status(), 401);
        assert_eq!(Error::Engine("boom".into()).http_status(), 500);
        assert_eq!(Error::Store("boom".into()).http_status(), 500);
    }

    #[test]
    fn test_headers_missing_mentions_sdk_upgrade() {
        assert!(Error::HeadersMissing.to_string().contains("upgrade the SDK"));
    }

    #[test]
    fn test_engine_stream_not_found_converts_to_stream_missing() {
        let e = crate::engine::EngineError::StreamNotFound("$memphis-orders-dls".into());
        let err: Error = e.into();
        assert_eq!(err, Error::StreamMissing("$memphis-orders-dls".into()));
    }
}
