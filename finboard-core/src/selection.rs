//! Multi-select state for bulk transaction actions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of a bulk delete as reported by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    #[serde(default, alias = "deleted_ids")]
    pub deleted: Vec<String>,
    #[serde(default, alias = "failed_ids")]
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    /// Returns true if the id is selected after the toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Drop exactly the ids the backend deleted. Failed ids stay selected so
    /// the user can retry them. Returns how many were removed.
    pub fn apply_bulk_delete(&mut self, outcome: &BulkDeleteOutcome) -> usize {
        outcome
            .deleted
            .iter()
            .filter(|id| self.ids.remove(id.as_str()))
            .count()
    }
}
