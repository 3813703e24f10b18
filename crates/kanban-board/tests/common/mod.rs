//! Shared fixtures for board integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kanban_board::{Board, BoardConfig, BoardEvent};
use kanban_gateway::{
    ContactGateway, ContactPage, ContactQuery, MemoryGateway, PageMeta, Result, StageFilter,
};
use kanban_models::{Contact, ContactId, ListAttribute};
use tokio::sync::broadcast;

pub const PIPELINE: &str = "pipeline";

pub fn pipeline() -> ListAttribute {
    ListAttribute::new(PIPELINE, "Pipeline", ["New", "Qualified", "Won"])
}

pub fn priority() -> ListAttribute {
    ListAttribute::new("priority", "Priority", ["High", "Low"])
}

pub fn contact(id: &str, name: &str, stage: Option<&str>) -> Contact {
    let c = Contact::new(id, name);
    match stage {
        Some(s) => c.with_attribute(PIPELINE, s),
        None => c,
    }
}

/// Ten contacts spread over the pipeline, including one with a value that
/// is not declared on the attribute.
pub fn pipeline_contacts() -> Vec<Contact> {
    vec![
        contact("1", "Ana", Some("New")),
        contact("2", "Bruno", Some("New")),
        contact("R7", "Rita", Some("New")),
        contact("4", "Davi", Some("Qualified")),
        contact("5", "Eva", Some("Qualified")),
        contact("6", "Fabio", Some("Won")),
        contact("7", "Gil", None),
        contact("8", "Hana", Some("Archived")),
        contact("9", "Ivo", None).with_attribute("priority", "High"),
        contact("10", "Jo", Some("New")).with_attribute("priority", "Low"),
    ]
}

pub fn memory_gateway() -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new(
        vec![pipeline(), priority()],
        pipeline_contacts(),
    ))
}

pub fn board(gateway: Arc<dyn ContactGateway>, config: BoardConfig) -> Arc<Board> {
    Arc::new(Board::new(gateway, config))
}

pub fn ids(contacts: &[Contact]) -> Vec<String> {
    contacts.iter().map(|c| c.id.to_string()).collect()
}

pub fn sorted_ids(contacts: &[Contact]) -> Vec<String> {
    let mut ids = ids(contacts);
    ids.sort();
    ids
}

/// Collects every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<BoardEvent>) -> Vec<BoardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Waits until the memory gateway holds at least one list request.
pub async fn wait_for_flight(gateway: &MemoryGateway) {
    while gateway.stats().in_flight_total() == 0 {
        tokio::task::yield_now().await;
    }
}

/// Gateway returning pre-arranged pages regardless of page size.
///
/// Unscripted pages come back empty with an unknown total.
pub struct ScriptedGateway {
    attributes: Vec<ListAttribute>,
    pages: Mutex<HashMap<(String, u32), ContactPage>>,
    calls: Mutex<Vec<ContactQuery>>,
}

impl ScriptedGateway {
    pub fn new(attributes: Vec<ListAttribute>) -> Self {
        Self {
            attributes,
            pages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, filter: &StageFilter, page: u32, contacts: Vec<Contact>, total: Option<u64>) {
        self.pages.lock().unwrap().insert(
            (filter.label(), page),
            ContactPage {
                contacts,
                meta: PageMeta {
                    total_count: total,
                    current_page: page,
                },
            },
        );
    }

    pub fn calls(&self) -> Vec<ContactQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactGateway for ScriptedGateway {
    async fn list_attributes(&self) -> Result<Vec<ListAttribute>> {
        Ok(self.attributes.clone())
    }

    async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        self.calls.lock().unwrap().push(query.clone());
        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get(&(query.filter.label(), query.page))
            .cloned();
        Ok(scripted.unwrap_or(ContactPage {
            contacts: Vec::new(),
            meta: PageMeta {
                total_count: None,
                current_page: query.page,
            },
        }))
    }

    async fn set_stage(&self, _: &ContactId, _: &str, _: Option<&str>) -> Result<()> {
        Ok(())
    }
}
