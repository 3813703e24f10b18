//! Contact board core.
//!
//! Splits the contacts of a contact-management service into stages by the
//! value of one list-type custom attribute, and keeps that view in step with
//! the service:
//!
//! - [`resolve`] picks the active attribute and derives its stages, with a
//!   synthetic unassigned stage last.
//! - [`PartitionCache`] holds the contacts per stage; every identity lives in
//!   at most one stage.
//! - [`Board`] pages each stage independently, allows one fetch per stage at
//!   a time, drops results for an attribute that is no longer active and
//!   applies moves optimistically, reverting them if the service rejects the
//!   write.
//! - [`BoardEvent`]s on the broadcast channel drive the presentation layer.

pub mod board;
pub mod config;
pub mod display;
pub mod error;
pub mod event;
pub mod pagination;
pub mod partition;
pub mod resolver;
pub mod session;

pub use board::{Board, MoveOutcome};
pub use config::BoardConfig;
pub use display::DisplayNames;
pub use error::{BoardError, Result};
pub use event::BoardEvent;
pub use pagination::{CursorState, FetchOutcome, PageCursor, SkipReason};
pub use partition::PartitionCache;
pub use resolver::{resolve, Resolution};
pub use session::{BoardSnapshot, StageSnapshot};
