//! Board session: everything derived from one active attribute.
//!
//! A session is never patched across attribute changes. Selecting another
//! attribute discards it and builds a new one with a fresh generation, which
//! is how late results for the old attribute are recognized and dropped.

use kanban_models::{Contact, ListAttribute, Stage};
use serde::Serialize;

use crate::display::DisplayNames;
use crate::pagination::{CursorState, PageCursor, Pagination};
use crate::partition::PartitionCache;
use crate::resolver::Resolution;

/// State of the active attribute's board.
#[derive(Debug, Clone)]
pub struct BoardSession {
    /// Identifies this session; bumped on every rebuild.
    pub generation: u64,
    /// Active classification attribute.
    pub attribute: ListAttribute,
    /// Stages in display order.
    pub stages: Vec<Stage>,
    /// Contacts per stage.
    pub cache: PartitionCache,
    /// Cursor per stage.
    pub pagination: Pagination,
    /// Shared cursor over the unfiltered listing, set once the service has
    /// rejected stage filters. Stays set for the rest of the session.
    pub fallback: Option<PageCursor>,
    /// Stage labels.
    pub display: DisplayNames,
}

impl BoardSession {
    /// Builds an empty session for a resolved attribute.
    pub fn new(generation: u64, resolution: Resolution, unassigned_label: &str) -> Self {
        let Resolution { attribute, stages } = resolution;
        Self {
            generation,
            cache: PartitionCache::new(attribute.key.clone()),
            pagination: Pagination::initialize(&stages),
            fallback: None,
            display: DisplayNames::new(&attribute, unassigned_label),
            attribute,
            stages,
        }
    }

    /// Returns true if `stage` belongs to this session.
    pub fn has_stage(&self, stage: &Stage) -> bool {
        self.stages.contains(stage)
    }

    /// Returns true once stage filters have been found unsupported.
    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }

    /// Returns whether `stage` is fetching, counting the shared unfiltered
    /// cursor in degraded mode.
    pub fn is_loading(&self, stage: &Stage) -> bool {
        let own = self.pagination.get(stage).is_some_and(|c| c.busy);
        let shared = self.fallback.as_ref().is_some_and(|c| c.busy);
        own || shared
    }

    /// Copies the session into a serializable view.
    pub fn snapshot(&self) -> BoardSnapshot {
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let cursor = self.pagination.get(stage).cloned().unwrap_or_default();
                StageSnapshot {
                    label: self.display.label(stage),
                    value: stage.attribute_value().map(str::to_string),
                    contacts: self.cache.get(stage).to_vec(),
                    has_more: cursor.has_more,
                    state: if self.is_loading(stage) {
                        CursorState::Fetching
                    } else {
                        cursor.state()
                    },
                    remote_total: cursor.remote_total,
                    error: cursor.last_error,
                }
            })
            .collect();

        BoardSnapshot {
            attribute_key: self.attribute.key.clone(),
            attribute_name: self.attribute.label().to_string(),
            degraded: self.is_degraded(),
            stages,
        }
    }
}

/// Serializable view of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    /// Display label.
    pub label: String,
    /// Attribute value, `None` for the unassigned stage.
    pub value: Option<String>,
    /// Contacts currently held.
    pub contacts: Vec<Contact>,
    /// Whether another page is available.
    pub has_more: bool,
    /// Cursor state.
    pub state: CursorState,
    /// Total reported by the service.
    pub remote_total: Option<u64>,
    /// Last fetch failure.
    pub error: Option<String>,
}

/// Serializable view of the whole board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    /// Active attribute key.
    pub attribute_key: String,
    /// Active attribute name.
    pub attribute_name: String,
    /// Whether pages are partitioned locally.
    pub degraded: bool,
    /// Stages in display order.
    pub stages: Vec<StageSnapshot>,
}
