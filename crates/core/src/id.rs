//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a part in the catalog.
///
/// Part ids are stable, human-readable strings. They are either supplied by the caller
/// or derived from the part name and its creation instant (see [`PartId::derive`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartId(String);

impl PartId {
    /// Parse a caller-supplied identifier. Blank identifiers are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::invalid_id("PartId: cannot be blank"));
        }
        Ok(Self(raw))
    }

    /// Derive an identifier from a part name and its creation instant.
    ///
    /// The name is lower-cased, each whitespace character becomes `-`, and the instant is
    /// appended in Unix milliseconds: `"Steel Frame"` → `steel-frame-1700000000000`.
    pub fn derive(name: &str, created_at: DateTime<Utc>) -> Self {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();
        Self(format!("{slug}-{}", created_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PartId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartId> for String {
    fn from(value: PartId) -> Self {
        value.0
    }
}
