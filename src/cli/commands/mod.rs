//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod count;
pub mod init;
pub mod run;
pub mod seed;
pub mod validate;

use crate::domain::{Category, RecordFilter};

/// Build a record filter from the shared filter flags
pub(crate) fn build_filter(
    category: Option<Category>,
    min_value: Option<f64>,
    unprocessed_only: bool,
) -> RecordFilter {
    let mut filter = RecordFilter::all();
    if let Some(category) = category {
        filter = filter.with_category(category);
    }
    if let Some(min_value) = min_value {
        filter = filter.with_min_value(min_value);
    }
    if unprocessed_only {
        filter = filter.unprocessed();
    }
    filter
}
