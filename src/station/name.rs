//! Station name canonicalization.
//!
//! User-visible station names are lowercase and may contain dots. The stream
//! engine treats dots as subject-hierarchy delimiters, so the internal form
//! substitutes them with `#`. The substitution is reversible: a stream name
//! can always be mapped back to the external name it was created for.

use crate::error::{Error, Result};
use crate::station::validation::validate_entity_name;

/// Delimiter users write in station names.
const EXTERNAL_DELIMITER: char = '.';

/// Engine-safe replacement for [`EXTERNAL_DELIMITER`].
const INTERNAL_DELIMITER: char = '#';

/// A canonicalized station name, carrying both the external (user-visible)
/// and internal (engine-facing) forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationName {
    internal: String,
    external: String,
}

impl StationName {
    /// Canonicalize a user-supplied station name.
    ///
    /// The input is lowercased, validated against the station character
    /// class, and mirrored into the internal form. Uppercase input is
    /// accepted and folded, matching SDK behavior.
    pub fn from_external(name: &str) -> Result<Self> {
        let external = name.to_lowercase();
        validate_entity_name(&external, "Station")?;

        let internal = replace_delimiters(&external);

        Ok(StationName { internal, external })
    }

    /// Reconstruct a station name from an engine stream name.
    ///
    /// The inverse of [`StationName::from_external`]: internal delimiters
    /// are reverted. Stream names observed from the engine are trusted, so
    /// no validation is applied.
    pub fn from_stream_name(stream_name: &str) -> Self {
        StationName {
            internal: stream_name.to_string(),
            external: revert_delimiters(stream_name),
        }
    }

    /// The user-visible form.
    pub fn external(&self) -> &str {
        &self.external
    }

    /// The engine-facing form.
    pub fn internal(&self) -> &str {
        &self.internal
    }
}

impl std::fmt::Display for StationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.external)
    }
}

/// Substitute user delimiters with engine-safe ones.
pub fn replace_delimiters(name: &str) -> String {
    name.replace(EXTERNAL_DELIMITER, &INTERNAL_DELIMITER.to_string())
}

/// Revert engine-safe delimiters back to user delimiters.
pub fn revert_delimiters(name: &str) -> String {
    name.replace(INTERNAL_DELIMITER, &EXTERNAL_DELIMITER.to_string())
}

impl TryFrom<&str> for StationName {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        StationName::from_external(name)
    }
}
