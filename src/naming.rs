//! Centralized naming conventions for chartbook identifiers.
//!
//! # Categories
//!
//! - **Record ids**: opaque ids of snippets and datasets (32 hex characters)
//! - **Dataset names**: the unique, human-chosen names used in `{"data": {"name": ...}}`
//! - **Default names**: generated names for datasets extracted from a snippet
//!   (`dataset_1`, `dataset_2`, ...) and for new snippets

use const_format::concatcp;
use uuid::Uuid;

use crate::{ChartbookError, Result};

// ============================================================================
// Base Building Blocks
// ============================================================================

/// Prefix of generated dataset names
const DATASET_PREFIX: &str = "dataset";

/// Separator between a generated name's prefix and its counter
const COUNTER_SEPARATOR: &str = "_";

/// Full prefix of generated dataset names: `dataset_`
const DATASET_COUNTER_PREFIX: &str = concatcp!(DATASET_PREFIX, COUNTER_SEPARATOR);

/// Name given to snippets created without one
pub const UNTITLED_SNIPPET: &str = "Untitled snippet";

/// Longest accepted dataset name
pub const MAX_DATASET_NAME_LEN: usize = 128;

// ============================================================================
// Constructor Functions
// ============================================================================

/// Generate a new opaque record id (UUID v4, 32 hex characters, no dashes).
///
/// # Example
/// ```
/// use chartbook::naming;
/// let id = naming::new_id();
/// assert_eq!(id.len(), 32);
/// ```
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate the first free `dataset_<n>` name.
///
/// # Example
/// ```
/// use chartbook::naming;
/// let taken = vec!["dataset_1".to_string(), "sales".to_string()];
/// assert_eq!(naming::default_dataset_name(&taken), "dataset_2");
/// ```
pub fn default_dataset_name<S: AsRef<str>>(existing: &[S]) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}{}", DATASET_COUNTER_PREFIX, n);
        if !existing.iter().any(|name| name.as_ref() == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Name for a copy of a snippet: `<name> (copy)`
pub fn copy_name(name: &str) -> String {
    format!("{} (copy)", name)
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a dataset name.
///
/// Names are referenced verbatim from chart specifications, so they must be
/// non-empty, at most [`MAX_DATASET_NAME_LEN`] characters, and free of
/// quotes, NUL and line breaks.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ChartbookError::InvalidName(
            "Dataset name cannot be empty".into(),
        ));
    }

    let forbidden = ['"', '\0', '\n', '\r'];
    for ch in forbidden {
        if name.contains(ch) {
            return Err(ChartbookError::InvalidName(format!(
                "Dataset name '{}' contains invalid character '{}'",
                name,
                ch.escape_default()
            )));
        }
    }

    if name.chars().count() > MAX_DATASET_NAME_LEN {
        return Err(ChartbookError::InvalidName(format!(
            "Dataset name '{}' exceeds maximum length of {} characters",
            name, MAX_DATASET_NAME_LEN
        )));
    }

    Ok(())
}
