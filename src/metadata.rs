//! Dataset metadata and the grouping helpers diagnostics use to find their inputs
//!
//! Each input file handed to a diagnostic comes with a metadata mapping
//! (dataset, experiment, ensemble, variable group, ...). This module wraps that
//! mapping and provides grouping, selection and sorting over lists of them.

use crate::errors::{DiagError, Result};
use crate::tags::render_scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Metadata of a single input dataset, keyed by attribute name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetMetadata {
    entries: BTreeMap<String, JsonValue>,
}

impl DatasetMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from a JSON object
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns a copy with `key` set to `value`
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Scalar value of `key` rendered as text
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.entries.get(key)? {
            JsonValue::Array(_) | JsonValue::Object(_) => None,
            scalar => Some(render_scalar(scalar)),
        }
    }

    /// Like [`get_str`](Self::get_str) but a missing key is an error
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::MissingMetadataKey`] if the key is absent or not a scalar.
    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)
            .ok_or_else(|| DiagError::MissingMetadataKey {
                key: key.to_string(),
                context: self.to_string(),
            })
    }

    /// True if `key` is present and renders to `value`
    #[must_use]
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.get_str(key).as_deref() == Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.entries.iter()
    }
}

impl fmt::Display for DatasetMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("'{k}': {v}"))
            .collect();
        write!(f, "{{{}}}", fields.join(", "))
    }
}

impl FromIterator<(String, JsonValue)> for DatasetMetadata {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Groups metadata by the value of `key`.
///
/// Entries without `key` end up under `None`. When `sort_key` is given every
/// group is sorted by that key.
#[must_use]
pub fn group_metadata(
    metadata: &[DatasetMetadata],
    key: &str,
    sort_key: Option<&str>,
) -> BTreeMap<Option<String>, Vec<DatasetMetadata>> {
    let mut groups: BTreeMap<Option<String>, Vec<DatasetMetadata>> = BTreeMap::new();
    for entry in metadata {
        groups
            .entry(entry.get_str(key))
            .or_default()
            .push(entry.clone());
    }

    if let Some(sort_key) = sort_key {
        for group in groups.values_mut() {
            *group = sorted_metadata(group, sort_key);
        }
    }

    groups
}

/// Returns the entries matching every `(key, value)` filter.
#[must_use]
pub fn select_metadata(metadata: &[DatasetMetadata], filters: &[(&str, &str)]) -> Vec<DatasetMetadata> {
    metadata
        .iter()
        .filter(|entry| filters.iter().all(|(k, v)| entry.matches(k, v)))
        .cloned()
        .collect()
}

/// Sorts entries by `key`; entries lacking the key sort first.
#[must_use]
pub fn sorted_metadata(metadata: &[DatasetMetadata], key: &str) -> Vec<DatasetMetadata> {
    let mut sorted = metadata.to_vec();
    sorted.sort_by_key(|entry| entry.get_str(key));
    sorted
}
