//! Error types for board operations.

use kanban_gateway::GatewayError;
use kanban_models::{ContactId, Stage};
use thiserror::Error;

/// Errors that can occur while loading or editing the board.
#[derive(Error, Debug)]
pub enum BoardError {
    /// No list-type attribute exists; the board cannot be shown.
    #[error("board unusable: {0}")]
    Configuration(String),

    /// No attribute has been selected yet.
    #[error("no active board session")]
    NoSession,

    /// The stage is not part of the active attribute.
    #[error("unknown stage: {0}")]
    UnknownStage(Stage),

    /// Loading a page of one stage failed.
    #[error("failed to load stage '{stage}': {source}")]
    TransientFetch {
        /// Stage whose fetch failed.
        stage: Stage,
        /// Underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    /// The contact is not where the caller believes it is.
    #[error("contact {contact_id} is not in stage '{stage}'")]
    PreconditionFailed {
        /// Contact being moved.
        contact_id: ContactId,
        /// Stage the caller expected it in.
        stage: Stage,
    },

    /// The remote write backing a move failed; the move was reverted.
    #[error("failed to move contact {contact_id} from '{from}' to '{to}': {source}")]
    MutationConflict {
        /// Contact being moved.
        contact_id: ContactId,
        /// Source stage.
        from: Stage,
        /// Target stage.
        to: Stage,
        /// Underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    /// Any other gateway failure (e.g. listing attributes).
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result type alias for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
