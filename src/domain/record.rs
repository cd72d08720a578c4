//! Record domain model
//!
//! A [`Record`] is the unit of data flowing through the pipeline. The source
//! creates it from the backing store, the processing stage derives a new one
//! from it, and once it enters a batch it is never changed again.

use super::ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Fixed set of record categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    A,
    B,
    C,
    D,
}

impl Category {
    /// All categories, in declaration order
    pub const ALL: [Category; 4] = [Category::A, Category::B, Category::C, Category::D];

    /// Returns the category as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::A => "A",
            Category::B => "B",
            Category::C => "C",
            Category::D => "D",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Category::A),
            "B" => Ok(Category::B),
            "C" => Ok(Category::C),
            "D" => Ok(Category::D),
            other => Err(format!(
                "Invalid category '{other}'. Must be one of: A, B, C, D"
            )),
        }
    }
}

/// A document moved through the pipeline
///
/// # Examples
///
/// ```
/// use conduit::domain::record::{Category, RecordBuilder};
/// use chrono::Utc;
///
/// let record = RecordBuilder::new()
///     .id(1)
///     .timestamp(Utc::now())
///     .value(12.5)
///     .category(Category::B)
///     .build()
///     .unwrap();
/// assert!(!record.processed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier (> 0)
    pub id: RecordId,

    /// When the record was created
    pub timestamp: DateTime<Utc>,

    /// Measured value (>= 0)
    pub value: f64,

    /// Category from the fixed set
    pub category: Category,

    /// Open key/value metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Whether the processing stage has handled this record
    #[serde(default)]
    pub processed: bool,

    /// When the processing stage handled this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a new builder for constructing a Record
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Checks the value invariant, which serde does not enforce
    pub fn validate(&self) -> Result<(), String> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(format!(
                "Record {} has invalid value {}; must be a finite number >= 0",
                self.id, self.value
            ));
        }
        Ok(())
    }

    /// Returns a processed copy of this record with extra metadata merged in
    pub fn into_processed(
        mut self,
        processed_at: DateTime<Utc>,
        derived: Map<String, Value>,
    ) -> Record {
        self.metadata.extend(derived);
        self.processed = true;
        self.processed_at = Some(processed_at);
        self
    }
}

/// Builder for constructing Record instances
#[derive(Debug, Default)]
pub struct RecordBuilder {
    id: Option<u64>,
    timestamp: Option<DateTime<Utc>>,
    value: Option<f64>,
    category: Option<Category>,
    metadata: Map<String, Value>,
}

impl RecordBuilder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record id
    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the creation timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the value
    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the category
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Adds a metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the Record
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or an invariant fails
    pub fn build(self) -> Result<Record, String> {
        let id = RecordId::new(self.id.ok_or("id is required")?)?;
        let record = Record {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            value: self.value.ok_or("value is required")?,
            category: self.category.ok_or("category is required")?,
            metadata: self.metadata,
            processed: false,
            processed_at: None,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Filter applied when opening a cursor or counting records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    /// Only records of this category
    #[serde(default)]
    pub category: Option<Category>,

    /// Only records with `value >= min_value`
    #[serde(default)]
    pub min_value: Option<f64>,

    /// Only records not yet processed
    #[serde(default)]
    pub unprocessed_only: bool,
}

impl RecordFilter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the filter to one category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Restricts the filter to a minimum value
    pub fn with_min_value(mut self, min_value: f64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    /// Restricts the filter to unprocessed records
    pub fn unprocessed(mut self) -> Self {
        self.unprocessed_only = true;
        self
    }

    /// Returns true when the record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(category) = self.category {
            if record.category != category {
                return false;
            }
        }
        if let Some(min_value) = self.min_value {
            if record.value < min_value {
                return false;
            }
        }
        !(self.unprocessed_only && record.processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(id: u64, value: f64, category: Category) -> Record {
        RecordBuilder::new()
            .id(id)
            .value(value)
            .category(category)
            .build()
            .unwrap()
    }

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new()
            .id(3)
            .value(4.5)
            .category(Category::C)
            .metadata("source", json!("seed"))
            .build()
            .unwrap();

        assert_eq!(record.id.get(), 3);
        assert_eq!(record.category, Category::C);
        assert_eq!(record.metadata["source"], json!("seed"));
        assert!(!record.processed);
        assert!(record.processed_at.is_none());
    }

    #[test]
    fn test_record_builder_rejects_invalid() {
        assert!(RecordBuilder::new()
            .id(0)
            .value(1.0)
            .category(Category::A)
            .build()
            .is_err());
        assert!(RecordBuilder::new()
            .id(1)
            .value(-1.0)
            .category(Category::A)
            .build()
            .is_err());
        assert!(RecordBuilder::new().id(1).value(1.0).build().is_err());
    }

    #[test]
    fn test_record_serialization_camel_case() {
        let record = sample(1, 2.0, Category::A).into_processed(Utc::now(), Map::new());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["id"], json!(1));
        assert_eq!(value["category"], json!("A"));
        assert_eq!(value["processed"], json!(true));
        assert!(value.get("processedAt").is_some());

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_into_processed_merges_metadata() {
        let at = Utc::now();
        let record = sample(9, 10.0, Category::D)
            .into_processed(at, json!({"valueBand": "low"}).as_object().cloned().unwrap());

        assert!(record.processed);
        assert_eq!(record.processed_at, Some(at));
        assert_eq!(record.metadata["valueBand"], json!("low"));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(Category::from_str("b").unwrap(), Category::B);
        assert!(Category::from_str("Z").is_err());
    }

    #[test]
    fn test_filter_matches() {
        let record = sample(1, 50.0, Category::B);

        assert!(RecordFilter::all().matches(&record));
        assert!(RecordFilter::all()
            .with_category(Category::B)
            .matches(&record));
        assert!(!RecordFilter::all()
            .with_category(Category::A)
            .matches(&record));
        assert!(!RecordFilter::all().with_min_value(60.0).matches(&record));

        let processed = record.into_processed(Utc::now(), Map::new());
        assert!(!RecordFilter::all().unprocessed().matches(&processed));
    }
}
