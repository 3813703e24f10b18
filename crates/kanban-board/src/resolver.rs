//! Classification resolver: picks the active attribute and its stages.

use std::collections::HashSet;

use kanban_models::{ListAttribute, Stage};
use tracing::debug;

/// The active attribute and the stages it partitions the board into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Active classification attribute.
    pub attribute: ListAttribute,
    /// Declared values in order, then the unassigned stage.
    pub stages: Vec<Stage>,
}

/// Resolves the active attribute.
///
/// Uses `preferred` when it names an available attribute, otherwise the
/// first one. Returns `None` when no attribute exists at all.
pub fn resolve(attributes: &[ListAttribute], preferred: Option<&str>) -> Option<Resolution> {
    let attribute = preferred
        .and_then(|key| attributes.iter().find(|a| a.key == key))
        .or_else(|| {
            if let Some(key) = preferred {
                debug!(preferred = %key, "preferred attribute not available, using first");
            }
            attributes.first()
        })?;

    Some(Resolution {
        attribute: attribute.clone(),
        stages: stages_for(attribute),
    })
}

/// Returns the ordered stages of `attribute`: declared values without
/// blanks or repeats, followed by the unassigned stage exactly once.
pub fn stages_for(attribute: &ListAttribute) -> Vec<Stage> {
    let mut seen = HashSet::new();
    let mut stages: Vec<Stage> = attribute
        .values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .filter(|v| seen.insert(v.as_str()))
        .map(|v| Stage::Value(v.clone()))
        .collect();
    stages.push(Stage::Unassigned);
    stages
}
