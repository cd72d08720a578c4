//! Domain identifier types with validation
//!
//! Records are keyed by a positive integer id. The newtype keeps the
//! `id > 0` invariant at construction time and is the pagination key used
//! by every store adapter.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use conduit::domain::ids::RecordId;
/// use std::str::FromStr;
///
/// let id = RecordId::from_str("42").unwrap();
/// assert_eq!(id.get(), 42);
/// assert!(RecordId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Creates a new RecordId
    ///
    /// # Returns
    ///
    /// Returns `Ok(RecordId)` if the id is greater than zero, `Err` otherwise
    pub fn new(id: u64) -> Result<Self, String> {
        if id == 0 {
            return Err("Record ID must be greater than 0".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the raw id
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Returns the id following this one
    pub fn next(&self) -> RecordId {
        RecordId(self.0.saturating_add(1))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .trim()
            .parse()
            .map_err(|e| format!("Invalid record ID '{s}': {e}"))?;
        Self::new(id)
    }
}

impl TryFrom<u64> for RecordId {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for RecordId {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(format!("Record ID must be greater than 0, got {value}"));
        }
        Ok(Self(value as u64))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        RecordId::new(raw).map_err(serde::de::Error::custom)
    }
}
