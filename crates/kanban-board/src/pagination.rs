//! Per-stage pagination cursors.
//!
//! Each stage owns a cursor with its own page number, "more available" flag
//! and busy flag. The busy flag is the single concurrency guard of the board:
//! while it is set, no second fetch for that stage may start.
//!
//! ```text
//! Idle --begin--> Fetching --complete--> Idle (more) | Exhausted
//!                    |
//!                    +----fail/release---> Idle
//! ```

use std::collections::HashMap;

use kanban_models::Stage;
use serde::Serialize;

/// Observable state of one cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    /// Not fetching; more pages may be available.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// Not fetching; no more pages.
    Exhausted,
}

/// Why a fetch request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A fetch for the same stage is already in flight.
    Busy,
    /// The stage has no more pages.
    Exhausted,
}

/// Result of a fetch request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was fetched and merged.
    Loaded {
        /// Contacts the page returned.
        count: usize,
        /// Whether another page is available.
        has_more: bool,
    },
    /// No request was issued.
    Skipped(SkipReason),
    /// The page arrived after the active attribute changed and was dropped.
    Discarded,
}

/// Pagination state of one stage (or of the shared unfiltered listing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Next page to request, starting at 1.
    pub next_page: u32,
    /// Whether another page may be available.
    pub has_more: bool,
    /// Whether a fetch is in flight.
    pub busy: bool,
    /// Total reported by the service, if any.
    pub remote_total: Option<u64>,
    /// Contacts received across all pages so far.
    pub loaded: u64,
    /// Message of the last failed fetch, cleared on success.
    pub last_error: Option<String>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            next_page: 1,
            has_more: true,
            busy: false,
            remote_total: None,
            loaded: 0,
            last_error: None,
        }
    }
}

impl PageCursor {
    /// Returns the observable state.
    pub fn state(&self) -> CursorState {
        if self.busy {
            CursorState::Fetching
        } else if self.has_more {
            CursorState::Idle
        } else {
            CursorState::Exhausted
        }
    }

    /// Marks the cursor busy and returns the page to request.
    ///
    /// With `require_more`, an exhausted cursor is skipped as well.
    pub fn begin(&mut self, require_more: bool) -> Result<u32, SkipReason> {
        if self.busy {
            return Err(SkipReason::Busy);
        }
        if require_more && !self.has_more {
            return Err(SkipReason::Exhausted);
        }
        self.busy = true;
        Ok(self.next_page)
    }

    /// Records a successful page of `returned` contacts and returns the new
    /// `has_more`.
    ///
    /// More pages are available only if the page was non-empty and fewer
    /// contacts than the reported total have arrived. Without a reported
    /// total, a full page implies more. The page number only advances on a
    /// non-empty page.
    pub fn complete(&mut self, returned: usize, total: Option<u64>, page_size: u32) -> bool {
        self.loaded += returned as u64;
        if total.is_some() {
            self.remote_total = total;
        }
        self.has_more = returned > 0
            && match self.remote_total {
                Some(total) => self.loaded < total,
                None => returned as u64 >= u64::from(page_size),
            };
        if returned > 0 {
            self.next_page += 1;
        }
        self.last_error = None;
        self.has_more
    }

    /// Records a failed fetch. Cursor position is unchanged.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Clears the busy flag.
    pub fn release(&mut self) {
        self.busy = false;
    }
}

/// Cursors for every stage of a session.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    cursors: HashMap<Stage, PageCursor>,
}

impl Pagination {
    /// Creates cursors for `stages`, each at page 1, idle, with more available.
    pub fn initialize(stages: &[Stage]) -> Self {
        Self {
            cursors: stages
                .iter()
                .map(|stage| (stage.clone(), PageCursor::default()))
                .collect(),
        }
    }

    /// Returns the cursor of `stage`.
    pub fn get(&self, stage: &Stage) -> Option<&PageCursor> {
        self.cursors.get(stage)
    }

    /// Returns the cursor of `stage` for mutation.
    pub fn get_mut(&mut self, stage: &Stage) -> Option<&mut PageCursor> {
        self.cursors.get_mut(stage)
    }

    /// Iterates over all cursors.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Stage, &mut PageCursor)> {
        self.cursors.iter_mut()
    }
}
