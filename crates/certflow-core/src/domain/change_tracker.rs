//! Field-level diffing for the audit trail

use crate::types::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Old and new value of a single changed field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    /// Value before the submission, `None` if the field was absent
    pub old_value: Option<Value>,

    /// Submitted value
    pub new_value: Value,
}

/// Changeset keyed by field name
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Computes old/new changesets between two field maps
pub struct FieldChangeTracker;

impl FieldChangeTracker {
    /// Diff `old` against `new`.
    ///
    /// Reports every key of `new` whose value differs from, or is missing
    /// in, `old`. Keys that exist only in `old` are not reported.
    pub fn diff(old: &FieldMap, new: &FieldMap) -> ChangeSet {
        new.iter()
            .filter(|(key, value)| old.get(key.as_str()) != Some(*value))
            .map(|(key, value)| {
                (
                    key.clone(),
                    FieldChange {
                        old_value: old.get(key).cloned(),
                        new_value: value.clone(),
                    },
                )
            })
            .collect()
    }
}
