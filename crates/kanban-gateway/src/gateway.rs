//! ContactGateway trait definition for contact service backends.
//!
//! The board only needs three request shapes from the remote system of
//! record: the list-type attributes, one page of contacts (optionally
//! filtered to a stage), and a single-attribute write. Backends are stateless
//! request/response adapters; all caching happens in the caller.

use async_trait::async_trait;
use kanban_models::{Contact, ContactId, ListAttribute};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which contacts a list request should return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StageFilter {
    /// No filtering; every contact.
    Any,
    /// Contacts whose attribute equals this value.
    Value(String),
    /// Contacts whose attribute is absent or not one of `legal_values`.
    Unassigned {
        /// Declared values of the attribute.
        legal_values: Vec<String>,
    },
}

impl StageFilter {
    /// Returns true if `contact` satisfies this filter for `attribute_key`.
    pub fn matches(&self, contact: &Contact, attribute_key: &str) -> bool {
        match self {
            StageFilter::Any => true,
            StageFilter::Value(v) => contact.stage_value(attribute_key) == Some(v.as_str()),
            StageFilter::Unassigned { legal_values } => match contact.stage_value(attribute_key) {
                None => true,
                Some(v) => !legal_values.iter().any(|legal| legal == v),
            },
        }
    }

    /// Short label for logs and statistics.
    pub fn label(&self) -> String {
        match self {
            StageFilter::Any => "*".to_string(),
            StageFilter::Value(v) => v.clone(),
            StageFilter::Unassigned { .. } => "<unassigned>".to_string(),
        }
    }
}

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    /// Page number, starting at 1.
    pub page: u32,
    /// Requested page size. Services with a fixed page size may ignore it.
    pub page_size: u32,
    /// Classification attribute the filter applies to.
    pub attribute_key: String,
    /// Stage filter.
    pub filter: StageFilter,
}

impl ContactQuery {
    /// Creates a query for `page` of contacts matching `filter`.
    pub fn new(
        attribute_key: impl Into<String>,
        filter: StageFilter,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            page: page.max(1),
            page_size,
            attribute_key: attribute_key.into(),
            filter,
        }
    }
}

/// Pagination metadata reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Total matching contacts, if reported.
    pub total_count: Option<u64>,
    /// Page the service says it returned.
    pub current_page: u32,
}

/// One page of contacts.
#[derive(Debug, Clone, Default)]
pub struct ContactPage {
    /// Contacts on this page, in service order.
    pub contacts: Vec<Contact>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// Trait for contact service backends.
///
/// All operations are async to support both local and remote backends.
#[async_trait]
pub trait ContactGateway: Send + Sync {
    /// Lists the list-type contact attributes usable as a classification.
    async fn list_attributes(&self) -> Result<Vec<ListAttribute>>;

    /// Fetches one page of contacts.
    ///
    /// # Errors
    /// Returns `GatewayError::FilterUnsupported` when the service cannot
    /// evaluate `query.filter`; callers may retry with `StageFilter::Any`.
    async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactPage>;

    /// Sets (or with `None`, clears) one attribute of a contact.
    async fn set_stage(
        &self,
        contact_id: &ContactId,
        attribute_key: &str,
        value: Option<&str>,
    ) -> Result<()>;
}
