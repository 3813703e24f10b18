//! Core data models for the contact Kanban board.
//!
//! This crate provides the value types shared by the gateway and the board:
//! contacts and their identities, list-type classification attributes, and
//! the stages (columns) derived from them.

pub mod attribute;
pub mod contact;
pub mod stage;

// Re-export main types
pub use attribute::ListAttribute;
pub use contact::{Contact, ContactId};
pub use stage::{Stage, UNASSIGNED_LABEL};
