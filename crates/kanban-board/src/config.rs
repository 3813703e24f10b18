//! Board configuration.

use kanban_models::UNASSIGNED_LABEL;

/// Default page size; matches Chatwoot's fixed contact page size.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// Default number of stages loaded concurrently when a session starts.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 4;

/// Configuration for a board.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Contacts requested per page.
    pub page_size: u32,
    /// Label shown for the unassigned stage.
    pub unassigned_label: String,
    /// Attribute key to select when the caller does not name one.
    pub preferred_attribute: Option<String>,
    /// Re-fetch the first page of both stages after a confirmed move.
    pub reconcile_after_move: bool,
    /// Stages fetched concurrently when a session starts.
    pub load_concurrency: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            unassigned_label: UNASSIGNED_LABEL.to_string(),
            preferred_attribute: None,
            reconcile_after_move: true,
            load_concurrency: DEFAULT_LOAD_CONCURRENCY,
        }
    }
}

impl BoardConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size (at least 1).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the unassigned stage label.
    pub fn with_unassigned_label(mut self, label: impl Into<String>) -> Self {
        self.unassigned_label = label.into();
        self
    }

    /// Sets the preferred attribute key.
    pub fn with_preferred_attribute(mut self, key: Option<String>) -> Self {
        self.preferred_attribute = key.filter(|k| !k.is_empty());
        self
    }

    /// Enables or disables the post-move refresh.
    pub fn with_reconcile_after_move(mut self, enabled: bool) -> Self {
        self.reconcile_after_move = enabled;
        self
    }

    /// Sets the initial load fan-out (at least 1).
    pub fn with_load_concurrency(mut self, concurrency: usize) -> Self {
        self.load_concurrency = concurrency.max(1);
        self
    }
}
