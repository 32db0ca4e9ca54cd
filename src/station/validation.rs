//! Name and policy validation.
//!
//! All user-supplied identifiers (station, producer, and consumer names,
//! consumer groups) share one character class: lowercase ASCII alphanumerics
//! plus `.`, `_`, and `-`, at most 128 characters. Validation runs after
//! lowercasing, so mixed-case input is folded rather than rejected.
//!
//! Policy validation covers the station knobs: retention kind, storage kind,
//! replication factor, and the idempotency window (which is clamped, not
//! rejected).

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_IDEMPOTENCY_WINDOW_MS, MAX_ENTITY_NAME_LENGTH, MAX_REPLICAS,
    MIN_IDEMPOTENCY_WINDOW_MS,
};
use crate::error::{Error, Result};

/// How a station bounds its main stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionType {
    /// Discard messages older than the retention value (seconds).
    #[default]
    MessageAgeSec,
    /// Keep at most the retention value messages.
    Messages,
    /// Keep at most the retention value bytes.
    Bytes,
}

impl std::str::FromStr for RetentionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "message_age_sec" => Ok(RetentionType::MessageAgeSec),
            "messages" => Ok(RetentionType::Messages),
            "bytes" => Ok(RetentionType::Bytes),
            _ => Err(Error::Validation(
                "retention type can be one of the following message_age_sec/messages/bytes"
                    .to_string(),
            )),
        }
    }
}

/// Where a station's streams are stored.
///
/// The presentation layer renames `file` to `disk` on the way out only;
/// `disk` is never accepted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    File,
    Memory,
}

impl StorageType {
    /// The name the management API presents for this storage kind.
    pub fn response_name(&self) -> &'static str {
        match self {
            StorageType::File => "disk",
            StorageType::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(StorageType::File),
            "memory" => Ok(StorageType::Memory),
            _ => Err(Error::Validation(
                "storage type can be one of the following file/memory".to_string(),
            )),
        }
    }
}

/// Validate a station/producer/consumer name against the shared rules.
///
/// `entity` names the field for error messages ("Station", "Producer", ...).
pub fn validate_entity_name(value: &str, entity: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidName(format!("{entity} name cannot be empty")));
    }

    if value.len() > MAX_ENTITY_NAME_LENGTH {
        return Err(Error::InvalidName(format!(
            "{entity} name '{value}' is too long ({} chars, max {MAX_ENTITY_NAME_LENGTH} chars)",
            value.len()
        )));
    }

    for (i, c) in value.chars().enumerate() {
        let valid = c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-');
        if !valid {
            return Err(Error::InvalidName(format!(
                "Invalid character '{}' in {entity} name at position {i}. \
                 Only lowercase letters, digits, '.', '_', and '-' are allowed.",
                c.escape_default()
            )));
        }
    }

    Ok(())
}

/// Reject replication factors the cluster cannot honor.
pub fn validate_replicas(replicas: i32) -> Result<()> {
    if replicas > MAX_REPLICAS {
        return Err(Error::Validation(format!(
            "max replicas in a cluster is {MAX_REPLICAS}"
        )));
    }
    Ok(())
}

/// Clamp a requested idempotency window into the supported range.
///
/// Non-positive requests take the default; positive requests below the
/// engine minimum are clamped up.
pub fn normalize_idempotency_window(window_ms: i64) -> i64 {
    if window_ms <= 0 {
        DEFAULT_IDEMPOTENCY_WINDOW_MS
    } else if window_ms < MIN_IDEMPOTENCY_WINDOW_MS {
        MIN_IDEMPOTENCY_WINDOW_MS
    } else {
        window_ms
    }
}
