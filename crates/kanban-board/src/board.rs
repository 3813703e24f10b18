//! Board coordinator.
//!
//! `Board` owns the active session and drives the gateway. State lives in a
//! single mutex that is only ever held between gateway calls, never across
//! an `.await`, so every cache and cursor update is atomic with respect to
//! other tasks and the only hazard left is interleaving at the suspension
//! points (the gateway calls themselves):
//!
//! - fetches for the same stage are serialized by the cursor's busy flag;
//! - fetches for different stages run concurrently;
//! - results are committed only if the session generation they were issued
//!   under is still current;
//! - moves update the cache before the remote write and are reverted if the
//!   write fails.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use kanban_gateway::{ContactGateway, ContactPage, ContactQuery, GatewayError, StageFilter};
use kanban_models::{Contact, ContactId, ListAttribute, Stage};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::event::BoardEvent;
use crate::pagination::{FetchOutcome, PageCursor, SkipReason};
use crate::resolver::resolve;
use crate::session::{BoardSession, BoardSnapshot};

/// Capacity of the change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of a successful move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The contact was moved and the service confirmed the write.
    Moved,
    /// Source and target were the same stage; nothing happened.
    Unchanged,
}

/// Mutable board state behind the mutex.
#[derive(Default)]
struct BoardState {
    /// Attributes offered by the service, loaded once and on demand.
    attributes: Vec<ListAttribute>,
    /// Active session, if an attribute is selected.
    session: Option<BoardSession>,
    /// Generation handed to the next session.
    next_generation: u64,
}

/// What a fetch needs once the lock is released.
struct FetchPlan {
    generation: u64,
    attribute_key: String,
    filter: StageFilter,
    page: u32,
    degraded: bool,
}

/// What a move needs once the lock is released.
struct MovePlan {
    generation: u64,
    attribute_key: String,
    original: Contact,
    position: usize,
    from_label: String,
    to_label: String,
}

/// Clears busy flags set by a fetch when it goes out of scope, on every exit
/// path. Flags are only touched if the session that set them is current.
struct BusyGuard<'a> {
    board: &'a Board,
    generation: u64,
    stage: Stage,
    shared: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.board.state();
        let Some(session) = state.session.as_mut() else {
            return;
        };
        if session.generation != self.generation {
            return;
        }
        if let Some(cursor) = session.pagination.get_mut(&self.stage) {
            cursor.release();
        }
        if self.shared {
            if let Some(fallback) = session.fallback.as_mut() {
                fallback.release();
            }
        }
    }
}

/// Stage-partitioned contact board kept in step with a remote gateway.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use kanban_board::{Board, BoardConfig};
/// use kanban_gateway::ChatwootGateway;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = Arc::new(ChatwootGateway::from_env()?);
/// let board = Arc::new(Board::new(gateway, BoardConfig::default()));
///
/// let mut events = board.subscribe();
/// let stages = board.select_attribute(None).await?;
/// for stage in &stages {
///     println!("{}: {}", board.display_name(stage), board.contacts_for(stage).len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Board {
    gateway: Arc<dyn ContactGateway>,
    config: BoardConfig,
    state: Mutex<BoardState>,
    event_tx: broadcast::Sender<BoardEvent>,
}

impl Board {
    /// Creates a board with no active session.
    pub fn new(gateway: Arc<dyn ContactGateway>, config: BoardConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gateway,
            config,
            state: Mutex::new(BoardState::default()),
            event_tx,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Subscribe to board change events.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: BoardEvent) {
        // Ignore send errors (no receivers)
        let _ = self.event_tx.send(event);
    }

    /// State is consistent between statements, so a poisoned lock is still
    /// safe to use.
    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Attribute selection
    // ------------------------------------------------------------------

    /// Fetches the list attributes from the service and caches them.
    pub async fn load_attributes(&self) -> Result<Vec<ListAttribute>> {
        let attributes = self.gateway.list_attributes().await?;
        debug!(count = attributes.len(), "attributes loaded");
        self.state().attributes = attributes.clone();
        Ok(attributes)
    }

    /// Returns the cached list attributes.
    pub fn attributes(&self) -> Vec<ListAttribute> {
        self.state().attributes.clone()
    }

    /// Makes an attribute active and loads the first page of every stage.
    ///
    /// `preferred` (or the configured preference) is used when it names an
    /// available attribute; otherwise the first attribute is chosen. The
    /// previous session is discarded entirely. Per-stage load failures are
    /// reported through events and [`stage_error`](Self::stage_error), not
    /// as an error here.
    ///
    /// # Errors
    /// `BoardError::Configuration` when the service offers no list
    /// attribute; `BoardError::Gateway` when attributes cannot be listed.
    pub async fn select_attribute(&self, preferred: Option<&str>) -> Result<Vec<Stage>> {
        let cached = self.attributes();
        let attributes = if cached.is_empty() {
            self.load_attributes().await?
        } else {
            cached
        };

        let preferred = preferred.or(self.config.preferred_attribute.as_deref());
        let Some(resolution) = resolve(&attributes, preferred) else {
            let reason =
                "no list-type contact attribute is available; create one to use the board"
                    .to_string();
            {
                let mut state = self.state();
                state.session = None;
                state.next_generation += 1;
            }
            warn!("{}", reason);
            self.emit_event(BoardEvent::BoardUnusable {
                reason: reason.clone(),
            });
            return Err(BoardError::Configuration(reason));
        };

        let attribute_key = resolution.attribute.key.clone();
        let stages = resolution.stages.clone();
        {
            let mut state = self.state();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.session = Some(BoardSession::new(
                generation,
                resolution,
                &self.config.unassigned_label,
            ));
            info!(
                attribute = %attribute_key,
                generation = generation,
                stages = stages.len(),
                "board session started"
            );
        }
        self.emit_event(BoardEvent::SessionStarted {
            attribute_key,
            stages: stages.clone(),
        });

        self.load_first_pages(&stages).await;
        Ok(stages)
    }

    /// Rebuilds the current session from scratch.
    pub async fn reload(&self) -> Result<Vec<Stage>> {
        let current = self.active_attribute().map(|a| a.key);
        self.select_attribute(current.as_deref()).await
    }

    async fn load_first_pages(&self, stages: &[Stage]) {
        let results: Vec<(Stage, Result<FetchOutcome>)> = stream::iter(stages.iter().cloned())
            .map(|stage| async move {
                let result = self.fetch_page(&stage).await;
                (stage, result)
            })
            .buffer_unordered(self.config.load_concurrency)
            .collect()
            .await;

        for (stage, result) in results {
            if let Err(e) = result {
                debug!(stage = %stage, error = %e, "initial stage load failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Returns the active attribute.
    pub fn active_attribute(&self) -> Option<ListAttribute> {
        self.state().session.as_ref().map(|s| s.attribute.clone())
    }

    /// Returns the stages of the active attribute in display order.
    pub fn stages(&self) -> Vec<Stage> {
        self.state()
            .session
            .as_ref()
            .map(|s| s.stages.clone())
            .unwrap_or_default()
    }

    /// Returns the contacts currently held for `stage`, in arrival order.
    pub fn contacts_for(&self, stage: &Stage) -> Vec<Contact> {
        self.state()
            .session
            .as_ref()
            .map(|s| s.cache.get(stage).to_vec())
            .unwrap_or_default()
    }

    /// Returns whether `stage` may have more pages.
    pub fn has_more(&self, stage: &Stage) -> bool {
        self.state()
            .session
            .as_ref()
            .and_then(|s| s.pagination.get(stage))
            .is_some_and(|c| c.has_more)
    }

    /// Returns whether a fetch for `stage` is in flight.
    pub fn is_loading(&self, stage: &Stage) -> bool {
        self.state()
            .session
            .as_ref()
            .is_some_and(|s| s.is_loading(stage))
    }

    /// Returns the total the service reported for `stage`.
    pub fn total_for(&self, stage: &Stage) -> Option<u64> {
        self.state()
            .session
            .as_ref()
            .and_then(|s| s.pagination.get(stage))
            .and_then(|c| c.remote_total)
    }

    /// Returns the last fetch failure for `stage`.
    pub fn stage_error(&self, stage: &Stage) -> Option<String> {
        self.state()
            .session
            .as_ref()
            .and_then(|s| s.pagination.get(stage))
            .and_then(|c| c.last_error.clone())
    }

    /// Returns the display label for `stage`.
    pub fn display_name(&self, stage: &Stage) -> String {
        match self.state().session.as_ref() {
            Some(session) => session.display.label(stage),
            None => self.plain_label(stage),
        }
    }

    fn plain_label(&self, stage: &Stage) -> String {
        match stage {
            Stage::Unassigned => self.config.unassigned_label.clone(),
            Stage::Value(v) => v.clone(),
        }
    }

    /// Returns true once the service has rejected stage filters for the
    /// active session.
    pub fn is_degraded(&self) -> bool {
        self.state()
            .session
            .as_ref()
            .is_some_and(BoardSession::is_degraded)
    }

    /// Returns a serializable copy of the active session.
    pub fn snapshot(&self) -> Option<BoardSnapshot> {
        self.state().session.as_ref().map(BoardSession::snapshot)
    }

    // ------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------

    /// Fetches the next page of `stage`. Does nothing while a fetch for the
    /// same stage is in flight.
    pub async fn fetch_page(&self, stage: &Stage) -> Result<FetchOutcome> {
        self.fetch(stage, false).await
    }

    /// Fetches the next page of `stage` if it has more and is not busy.
    pub async fn request_more(&self, stage: &Stage) -> Result<FetchOutcome> {
        self.fetch(stage, true).await
    }

    /// Keeps requesting pages of `stage` until it is exhausted. Returns the
    /// number of contacts received.
    pub async fn load_all(&self, stage: &Stage) -> Result<usize> {
        let mut received = 0;
        loop {
            match self.request_more(stage).await? {
                FetchOutcome::Loaded { count, has_more } => {
                    received += count;
                    if !has_more {
                        break;
                    }
                }
                FetchOutcome::Skipped(reason) => {
                    debug!(stage = %stage, reason = ?reason, "load_all stopped");
                    break;
                }
                FetchOutcome::Discarded => break,
            }
        }
        Ok(received)
    }

    async fn fetch(&self, stage: &Stage, require_more: bool) -> Result<FetchOutcome> {
        let plan = match self.plan_fetch(stage, require_more)? {
            Ok(plan) => plan,
            Err(reason) => {
                debug!(stage = %stage, reason = ?reason, "fetch skipped");
                return Ok(FetchOutcome::Skipped(reason));
            }
        };

        let mut guard = BusyGuard {
            board: self,
            generation: plan.generation,
            stage: stage.clone(),
            shared: plan.degraded,
        };

        if !plan.degraded {
            let query = ContactQuery::new(
                &plan.attribute_key,
                plan.filter.clone(),
                plan.page,
                self.config.page_size,
            );
            debug!(stage = %stage, page = plan.page, "fetching stage page");
            match self.gateway.list_contacts(&query).await {
                Ok(page) => return Ok(self.commit_stage_page(stage, &plan, page)),
                Err(GatewayError::FilterUnsupported(reason)) => {
                    if !self.enter_degraded(plan.generation, &reason) {
                        return Ok(FetchOutcome::Discarded);
                    }
                    match self.begin_shared(plan.generation) {
                        Some(Ok(())) => guard.shared = true,
                        Some(Err(reason)) => return Ok(FetchOutcome::Skipped(reason)),
                        None => return Ok(FetchOutcome::Discarded),
                    }
                }
                Err(source) => return Err(self.record_failure(stage, plan.generation, source)),
            }
        }

        self.fetch_unfiltered(stage, &plan).await
    }

    /// Checks the session and marks the stage (and in degraded mode the
    /// shared cursor) busy.
    fn plan_fetch(
        &self,
        stage: &Stage,
        require_more: bool,
    ) -> Result<std::result::Result<FetchPlan, SkipReason>> {
        let mut state = self.state();
        let session = state.session.as_mut().ok_or(BoardError::NoSession)?;
        if !session.has_stage(stage) {
            return Err(BoardError::UnknownStage(stage.clone()));
        }

        let filter = match stage {
            Stage::Value(v) => StageFilter::Value(v.clone()),
            Stage::Unassigned => StageFilter::Unassigned {
                legal_values: session.attribute.values.clone(),
            },
        };
        let generation = session.generation;
        let attribute_key = session.attribute.key.clone();

        let Some(cursor) = session.pagination.get_mut(stage) else {
            return Err(BoardError::UnknownStage(stage.clone()));
        };
        let page = match cursor.begin(require_more) {
            Ok(page) => page,
            Err(reason) => return Ok(Err(reason)),
        };

        // The unfiltered listing is shared: once it is exhausted every stage
        // is fully loaded.
        let degraded = match session.fallback.as_mut() {
            None => false,
            Some(fallback) => match fallback.begin(true) {
                Ok(_) => true,
                Err(reason) => {
                    if let Some(cursor) = session.pagination.get_mut(stage) {
                        cursor.release();
                    }
                    return Ok(Err(reason));
                }
            },
        };

        Ok(Ok(FetchPlan {
            generation,
            attribute_key,
            filter,
            page,
            degraded,
        }))
    }

    /// Switches the session to local partitioning. Returns false if the
    /// session is gone.
    fn enter_degraded(&self, generation: u64, reason: &str) -> bool {
        let attribute_key = {
            let mut state = self.state();
            let Some(session) = state.session.as_mut() else {
                return false;
            };
            if session.generation != generation {
                return false;
            }
            if session.fallback.is_some() {
                return true;
            }
            session.fallback = Some(PageCursor::default());
            session.attribute.key.clone()
        };
        warn!(
            attribute = %attribute_key,
            reason = %reason,
            "stage filters unsupported, partitioning unfiltered pages locally"
        );
        self.emit_event(BoardEvent::DegradedMode { attribute_key });
        true
    }

    /// Marks the shared unfiltered cursor busy. `None` if the session is gone.
    fn begin_shared(&self, generation: u64) -> Option<std::result::Result<(), SkipReason>> {
        let mut state = self.state();
        let session = state.session.as_mut()?;
        if session.generation != generation {
            return None;
        }
        let fallback = session.fallback.as_mut()?;
        Some(fallback.begin(false).map(|_| ()))
    }

    async fn fetch_unfiltered(&self, stage: &Stage, plan: &FetchPlan) -> Result<FetchOutcome> {
        let page = {
            let state = self.state();
            match state.session.as_ref() {
                Some(session) if session.generation == plan.generation => session
                    .fallback
                    .as_ref()
                    .map(|c| c.next_page)
                    .unwrap_or(1),
                _ => return Ok(FetchOutcome::Discarded),
            }
        };

        let query = ContactQuery::new(
            &plan.attribute_key,
            StageFilter::Any,
            page,
            self.config.page_size,
        );
        debug!(stage = %stage, page = page, "fetching unfiltered page");
        match self.gateway.list_contacts(&query).await {
            Ok(contacts) => Ok(self.commit_unfiltered_page(plan, contacts)),
            Err(source) => Err(self.record_failure(stage, plan.generation, source)),
        }
    }

    fn commit_stage_page(&self, stage: &Stage, plan: &FetchPlan, page: ContactPage) -> FetchOutcome {
        let returned = page.contacts.len();
        let (loaded, has_more) = {
            let mut state = self.state();
            let Some(session) = state
                .session
                .as_mut()
                .filter(|s| s.generation == plan.generation)
            else {
                warn!(
                    stage = %stage,
                    attribute = %plan.attribute_key,
                    "discarding page for superseded attribute"
                );
                return FetchOutcome::Discarded;
            };

            session.cache.merge(stage, page.contacts);
            let has_more = match session.pagination.get_mut(stage) {
                Some(cursor) => cursor.complete(returned, page.meta.total_count, self.config.page_size),
                None => false,
            };
            (session.cache.len(stage), has_more)
        };

        debug!(stage = %stage, returned = returned, loaded = loaded, has_more = has_more, "stage page merged");
        self.emit_event(BoardEvent::StageLoaded {
            stage: stage.clone(),
            loaded,
            has_more,
        });
        FetchOutcome::Loaded {
            count: returned,
            has_more,
        }
    }

    fn commit_unfiltered_page(&self, plan: &FetchPlan, page: ContactPage) -> FetchOutcome {
        let returned = page.contacts.len();
        let (loaded, has_more) = {
            let mut state = self.state();
            let Some(session) = state
                .session
                .as_mut()
                .filter(|s| s.generation == plan.generation)
            else {
                warn!(
                    attribute = %plan.attribute_key,
                    "discarding unfiltered page for superseded attribute"
                );
                return FetchOutcome::Discarded;
            };

            for contact in page.contacts {
                let stage = Stage::of(&contact, &session.attribute);
                session.cache.merge(&stage, std::iter::once(contact));
            }

            let Some(fallback) = session.fallback.as_mut() else {
                return FetchOutcome::Discarded;
            };
            let has_more = fallback.complete(returned, page.meta.total_count, self.config.page_size);
            let next_page = fallback.next_page;
            for (_, cursor) in session.pagination.iter_mut() {
                cursor.has_more = has_more;
                cursor.next_page = next_page;
                cursor.last_error = None;
            }

            let loaded: Vec<(Stage, usize)> = session
                .stages
                .iter()
                .map(|s| (s.clone(), session.cache.len(s)))
                .collect();
            (loaded, has_more)
        };

        debug!(returned = returned, has_more = has_more, "unfiltered page partitioned");
        for (stage, count) in loaded {
            self.emit_event(BoardEvent::StageLoaded {
                stage,
                loaded: count,
                has_more,
            });
        }
        FetchOutcome::Loaded {
            count: returned,
            has_more,
        }
    }

    fn record_failure(&self, stage: &Stage, generation: u64, source: GatewayError) -> BoardError {
        let message = source.to_string();
        let label = {
            let mut state = self.state();
            match state
                .session
                .as_mut()
                .filter(|s| s.generation == generation)
            {
                Some(session) => {
                    if let Some(cursor) = session.pagination.get_mut(stage) {
                        cursor.fail(message.clone());
                    }
                    session.display.label(stage)
                }
                None => self.plain_label(stage),
            }
        };
        warn!(stage = %stage, error = %message, transient = source.is_transient(), "stage fetch failed");
        self.emit_event(BoardEvent::StageFetchFailed {
            stage: stage.clone(),
            label,
            error: message,
        });
        BoardError::TransientFetch {
            stage: stage.clone(),
            source,
        }
    }

    /// Re-fetches page 1 of `stage` and merges it without moving the
    /// cursor. Skipped while the stage is busy. In degraded mode the
    /// unfiltered page is partitioned across every stage.
    async fn refresh_first_page(&self, stage: &Stage) -> Result<FetchOutcome> {
        let (generation, attribute_key, filter, attribute) = {
            let mut state = self.state();
            let session = state.session.as_mut().ok_or(BoardError::NoSession)?;
            let filter = match (&session.fallback, stage) {
                (Some(_), _) => StageFilter::Any,
                (None, Stage::Value(v)) => StageFilter::Value(v.clone()),
                (None, Stage::Unassigned) => StageFilter::Unassigned {
                    legal_values: session.attribute.values.clone(),
                },
            };
            let cursor = session
                .pagination
                .get_mut(stage)
                .ok_or_else(|| BoardError::UnknownStage(stage.clone()))?;
            if let Err(reason) = cursor.begin(false) {
                return Ok(FetchOutcome::Skipped(reason));
            }
            (
                session.generation,
                session.attribute.key.clone(),
                filter,
                session.attribute.clone(),
            )
        };
        let _guard = BusyGuard {
            board: self,
            generation,
            stage: stage.clone(),
            shared: false,
        };

        let query = ContactQuery::new(&attribute_key, filter.clone(), 1, self.config.page_size);
        let page = self
            .gateway
            .list_contacts(&query)
            .await
            .map_err(|source| BoardError::TransientFetch {
                stage: stage.clone(),
                source,
            })?;
        let returned = page.contacts.len();

        let (touched, has_more) = {
            let mut state = self.state();
            let Some(session) = state
                .session
                .as_mut()
                .filter(|s| s.generation == generation)
            else {
                return Ok(FetchOutcome::Discarded);
            };

            let touched: Vec<Stage> = if filter == StageFilter::Any {
                for contact in page.contacts {
                    let target = Stage::of(&contact, &attribute);
                    session.cache.merge(&target, std::iter::once(contact));
                }
                session.stages.clone()
            } else {
                session.cache.merge(stage, page.contacts);
                if let (Some(cursor), Some(total)) =
                    (session.pagination.get_mut(stage), page.meta.total_count)
                {
                    cursor.remote_total = Some(total);
                }
                vec![stage.clone()]
            };

            let touched: Vec<(Stage, usize, bool)> = touched
                .into_iter()
                .map(|s| {
                    let more = session.pagination.get(&s).is_some_and(|c| c.has_more);
                    let loaded = session.cache.len(&s);
                    (s, loaded, more)
                })
                .collect();
            let has_more = session.pagination.get(stage).is_some_and(|c| c.has_more);
            (touched, has_more)
        };

        for (stage, loaded, has_more) in touched {
            self.emit_event(BoardEvent::StageLoaded {
                stage,
                loaded,
                has_more,
            });
        }
        Ok(FetchOutcome::Loaded {
            count: returned,
            has_more,
        })
    }

    /// Refreshes page 1 of the given stages; failures are only logged.
    async fn reconcile(&self, stages: &[&Stage]) {
        // One unfiltered page already covers every stage.
        let stages = if self.is_degraded() {
            &stages[..stages.len().min(1)]
        } else {
            stages
        };
        for stage in stages {
            match self.refresh_first_page(stage).await {
                Ok(outcome) => debug!(stage = %stage, outcome = ?outcome, "stage reconciled"),
                Err(e) => warn!(stage = %stage, error = %e, "stage reconciliation failed"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Moves
    // ------------------------------------------------------------------

    /// Moves a contact between stages.
    ///
    /// The cache is updated before the remote write so the move is visible
    /// immediately. If the write fails the move is reverted, both stages are
    /// refreshed, a single `MoveFailed` event is emitted and
    /// `BoardError::MutationConflict` is returned.
    ///
    /// # Errors
    /// `PreconditionFailed` if the contact is not in `from` (nothing is
    /// changed); `MutationConflict` if the remote write failed.
    pub async fn move_contact(
        &self,
        contact_id: &ContactId,
        from: &Stage,
        to: &Stage,
    ) -> Result<MoveOutcome> {
        let plan = self.apply_optimistic_move(contact_id, from, to)?;
        let Some(plan) = plan else {
            return Ok(MoveOutcome::Unchanged);
        };

        info!(
            contact_id = %contact_id,
            from = %from,
            to = %to,
            attribute = %plan.attribute_key,
            "moving contact"
        );
        self.emit_event(BoardEvent::ContactMoved {
            contact_id: contact_id.clone(),
            from: from.clone(),
            to: to.clone(),
        });

        match self
            .gateway
            .set_stage(contact_id, &plan.attribute_key, to.attribute_value())
            .await
        {
            Ok(()) => {
                debug!(contact_id = %contact_id, to = %to, "move confirmed");
                self.emit_event(BoardEvent::MoveConfirmed {
                    contact_id: contact_id.clone(),
                    to: to.clone(),
                });
                if self.config.reconcile_after_move && self.is_current(plan.generation) {
                    self.reconcile(&[from, to]).await;
                }
                Ok(MoveOutcome::Moved)
            }
            Err(source) => {
                warn!(
                    contact_id = %contact_id,
                    from = %from,
                    to = %to,
                    error = %source,
                    "move failed, reverting"
                );
                let contact_name = plan.original.display_name();
                let reverted = {
                    let mut state = self.state();
                    match state
                        .session
                        .as_mut()
                        .filter(|s| s.generation == plan.generation)
                    {
                        Some(session) => {
                            session.cache.restore(plan.original, from, plan.position);
                            true
                        }
                        None => false,
                    }
                };
                if reverted {
                    self.reconcile(&[from, to]).await;
                }
                self.emit_event(BoardEvent::MoveFailed {
                    contact_id: contact_id.clone(),
                    contact_name,
                    from: from.clone(),
                    to: to.clone(),
                    from_label: plan.from_label,
                    to_label: plan.to_label,
                    error: source.to_string(),
                    occurred_at: Utc::now(),
                });
                Err(BoardError::MutationConflict {
                    contact_id: contact_id.clone(),
                    from: from.clone(),
                    to: to.clone(),
                    source,
                })
            }
        }
    }

    /// Validates the move and applies it to the cache. `Ok(None)` for a
    /// same-stage move.
    fn apply_optimistic_move(
        &self,
        contact_id: &ContactId,
        from: &Stage,
        to: &Stage,
    ) -> Result<Option<MovePlan>> {
        let mut state = self.state();
        let session = state.session.as_mut().ok_or(BoardError::NoSession)?;
        for stage in [from, to] {
            if !session.has_stage(stage) {
                return Err(BoardError::UnknownStage(stage.clone()));
            }
        }

        let Some(position) = session.cache.position(from, contact_id) else {
            return Err(BoardError::PreconditionFailed {
                contact_id: contact_id.clone(),
                stage: from.clone(),
            });
        };
        if from == to {
            return Ok(None);
        }

        let original = session.cache.get(from)[position].clone();
        if session.cache.apply_move(contact_id, from, to).is_none() {
            return Err(BoardError::PreconditionFailed {
                contact_id: contact_id.clone(),
                stage: from.clone(),
            });
        }

        Ok(Some(MovePlan {
            generation: session.generation,
            attribute_key: session.attribute.key.clone(),
            original,
            position,
            from_label: session.display.label(from),
            to_label: session.display.label(to),
        }))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state()
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }
}
