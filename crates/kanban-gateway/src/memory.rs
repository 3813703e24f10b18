//! In-process contact gateway.
//!
//! Holds attributes and contacts in memory and serves them with the same
//! page semantics as the remote service. Failure switches, per-attribute
//! pausing and call statistics make it suitable for exercising the board's
//! interleavings deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kanban_models::{Contact, ContactId, ListAttribute};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::gateway::{ContactGateway, ContactPage, ContactQuery, PageMeta, StageFilter};

/// Call statistics recorded by [`MemoryGateway`].
#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    /// Every list request, in arrival order.
    pub list_calls: Vec<ContactQuery>,
    /// Number of write requests.
    pub write_calls: usize,
    /// Fetches currently in flight per `attribute/filter` label.
    in_flight: HashMap<String, usize>,
    /// Highest concurrency observed per `attribute/filter` label.
    pub max_in_flight: HashMap<String, usize>,
}

impl GatewayStats {
    /// Number of list requests that used `filter`.
    pub fn list_calls_for(&self, filter: &StageFilter) -> usize {
        self.list_calls.iter().filter(|q| &q.filter == filter).count()
    }

    /// Total fetches currently in flight.
    pub fn in_flight_total(&self) -> usize {
        self.in_flight.values().sum()
    }
}

fn flight_key(query: &ContactQuery) -> String {
    format!("{}/{}", query.attribute_key, query.filter.label())
}

/// Contact gateway backed by in-memory collections.
pub struct MemoryGateway {
    attributes: Mutex<Vec<ListAttribute>>,
    contacts: Mutex<Vec<Contact>>,
    reject_filters: AtomicBool,
    fail_writes: AtomicBool,
    fail_lists: AtomicBool,
    paused: watch::Sender<HashSet<String>>,
    stats: Mutex<GatewayStats>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl MemoryGateway {
    /// Creates a gateway serving the given attributes and contacts.
    pub fn new(attributes: Vec<ListAttribute>, contacts: Vec<Contact>) -> Self {
        let (paused, _) = watch::channel(HashSet::new());
        Self {
            attributes: Mutex::new(attributes),
            contacts: Mutex::new(contacts),
            reject_filters: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            paused,
            stats: Mutex::new(GatewayStats::default()),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes filtered list requests fail with `FilterUnsupported`.
    pub fn set_reject_filters(&self, reject: bool) {
        self.reject_filters.store(reject, Ordering::SeqCst);
    }

    /// Makes writes fail with a server error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes list requests fail with a server error.
    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Holds list and write requests for `attribute_key` until
    /// [`resume`](Self::resume).
    pub fn pause(&self, attribute_key: &str) {
        self.paused.send_modify(|keys| {
            keys.insert(attribute_key.to_string());
        });
    }

    /// Releases requests held for `attribute_key`.
    pub fn resume(&self, attribute_key: &str) {
        self.paused.send_modify(|keys| {
            keys.remove(attribute_key);
        });
    }

    /// Replaces (or inserts) a contact, simulating an external edit.
    pub fn upsert_contact(&self, contact: Contact) {
        let mut contacts = Self::lock(&self.contacts);
        match contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(existing) => *existing = contact,
            None => contacts.push(contact),
        }
    }

    /// Returns the stored contact with `id`.
    pub fn contact(&self, id: &ContactId) -> Option<Contact> {
        Self::lock(&self.contacts).iter().find(|c| &c.id == id).cloned()
    }

    /// Returns a snapshot of the call statistics.
    pub fn stats(&self) -> GatewayStats {
        Self::lock(&self.stats).clone()
    }

    async fn wait_until_resumed(&self, attribute_key: &str) {
        let mut rx = self.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|keys| !keys.contains(attribute_key)).await;
    }

    fn begin_flight(&self, query: &ContactQuery) {
        let key = flight_key(query);
        let mut stats = Self::lock(&self.stats);
        stats.list_calls.push(query.clone());
        let current = {
            let count = stats.in_flight.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let max = stats.max_in_flight.entry(key).or_insert(0);
        *max = (*max).max(current);
    }

    fn end_flight(&self, query: &ContactQuery) {
        let mut stats = Self::lock(&self.stats);
        if let Some(count) = stats.in_flight.get_mut(&flight_key(query)) {
            *count = count.saturating_sub(1);
        }
    }

    fn page_of(&self, query: &ContactQuery) -> ContactPage {
        let contacts = Self::lock(&self.contacts);
        let matching: Vec<&Contact> = contacts
            .iter()
            .filter(|c| query.filter.matches(c, &query.attribute_key))
            .collect();

        let page_size = query.page_size.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * page_size;
        let page: Vec<Contact> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|c| (*c).clone())
            .collect();

        ContactPage {
            contacts: page,
            meta: PageMeta {
                total_count: Some(matching.len() as u64),
                current_page: query.page,
            },
        }
    }
}

#[async_trait]
impl ContactGateway for MemoryGateway {
    async fn list_attributes(&self) -> Result<Vec<ListAttribute>> {
        Ok(Self::lock(&self.attributes).clone())
    }

    async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        self.begin_flight(query);
        self.wait_until_resumed(&query.attribute_key).await;
        self.end_flight(query);

        if query.filter != StageFilter::Any && self.reject_filters.load(Ordering::SeqCst) {
            return Err(GatewayError::FilterUnsupported(
                "filtered listing disabled".to_string(),
            ));
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(GatewayError::Http {
                status: 503,
                method: "GET".to_string(),
                url: format!("memory://contacts?page={}", query.page),
                body: "unavailable".to_string(),
            });
        }

        let page = self.page_of(query);
        debug!(
            attribute = %query.attribute_key,
            filter = %query.filter.label(),
            page = query.page,
            returned = page.contacts.len(),
            "memory gateway listed contacts"
        );
        Ok(page)
    }

    async fn set_stage(
        &self,
        contact_id: &ContactId,
        attribute_key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        Self::lock(&self.stats).write_calls += 1;
        self.wait_until_resumed(attribute_key).await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Http {
                status: 500,
                method: "PUT".to_string(),
                url: format!("memory://contacts/{}", contact_id),
                body: "write rejected".to_string(),
            });
        }

        let mut contacts = Self::lock(&self.contacts);
        let contact = contacts
            .iter_mut()
            .find(|c| &c.id == contact_id)
            .ok_or_else(|| GatewayError::NotFound(contact_id.to_string()))?;
        *contact = contact.with_stage(attribute_key, value);
        Ok(())
    }
}
