use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::key::BusinessKey;
use crate::types::row::TableRow;

/// System-generated stable identifier for a dimension record.
///
/// Decoupled from the business key so that a key can carry multiple
/// historized versions, each addressable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurrogateKey(Uuid);

impl SurrogateKey {
    /// Generates a fresh surrogate key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One version of a dimension entity.
///
/// For Type-2 tables a business key owns a chain of records whose validity
/// intervals `[effective_from, effective_to)` never overlap, with at most one
/// record flagged current. `effective_to = None` means the version is open
/// ended.
#[derive(Debug, Clone)]
pub struct DimensionRecord {
    /// Business key of the entity.
    pub business_key: BusinessKey,
    /// Stable surrogate key of this version, generated once.
    pub surrogate_key: SurrogateKey,
    /// Attribute values in table column order.
    pub attributes: TableRow,
    /// Start of the validity interval, inclusive.
    pub effective_from: DateTime<Utc>,
    /// End of the validity interval, exclusive. `None` means open ended.
    pub effective_to: Option<DateTime<Utc>>,
    /// Whether this is the current version for its business key.
    pub is_current: bool,
}

impl DimensionRecord {
    /// Returns true when the validity interval contains `at`.
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_from <= at && self.effective_to.is_none_or(|to| at < to)
    }
}
