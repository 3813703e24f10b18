//! Human-readable stage labels.

use std::collections::HashMap;

use kanban_models::{ListAttribute, Stage};

/// Maps stages of one attribute to display labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayNames {
    names: HashMap<String, String>,
    unassigned_label: String,
}

impl DisplayNames {
    /// Builds the mapping for `attribute`.
    pub fn new(attribute: &ListAttribute, unassigned_label: impl Into<String>) -> Self {
        Self {
            names: attribute.value_display_names.clone(),
            unassigned_label: unassigned_label.into(),
        }
    }

    /// Returns the label for `stage`.
    pub fn label(&self, stage: &Stage) -> String {
        match stage {
            Stage::Unassigned => self.unassigned_label.clone(),
            Stage::Value(v) => self
                .names
                .get(v)
                .filter(|name| !name.is_empty())
                .cloned()
                .unwrap_or_else(|| v.clone()),
        }
    }
}
