//! Contact service gateway for the Kanban board.
//!
//! The board talks to its system of record only through the
//! [`ContactGateway`] trait. Two backends are provided:
//!
//! - **ChatwootGateway**: the Chatwoot REST API over `reqwest`
//! - **MemoryGateway**: in-process storage for tests and offline runs
//!
//! # Example
//!
//! ```no_run
//! use kanban_gateway::{ChatwootConfig, ChatwootGateway, ContactGateway, ContactQuery, StageFilter};
//!
//! # async fn example() -> kanban_gateway::Result<()> {
//! let config = ChatwootConfig::new("https://chat.example.com", "1", "token")?;
//! let gateway = ChatwootGateway::new(config)?;
//!
//! let attributes = gateway.list_attributes().await?;
//! if let Some(attr) = attributes.first() {
//!     let query = ContactQuery::new(&attr.key, StageFilter::Any, 1, 15);
//!     let page = gateway.list_contacts(&query).await?;
//!     println!("{} of {:?} contacts", page.contacts.len(), page.meta.total_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chatwoot;
pub mod error;
pub mod gateway;
pub mod memory;

// Re-export commonly used items
pub use chatwoot::{ChatwootConfig, ChatwootGateway};
pub use error::{GatewayError, Result};
pub use gateway::{ContactGateway, ContactPage, ContactQuery, PageMeta, StageFilter};
pub use memory::{GatewayStats, MemoryGateway};
