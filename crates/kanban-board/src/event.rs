//! Board change notifications.

use chrono::{DateTime, Utc};
use kanban_models::{ContactId, Stage};

/// Events emitted by the board for the presentation layer.
#[derive(Debug, Clone)]
pub enum BoardEvent {
    /// A new session was built for an attribute.
    SessionStarted {
        /// Active attribute key.
        attribute_key: String,
        /// Stages in display order.
        stages: Vec<Stage>,
    },
    /// No attribute is usable; the board should render a disabled state.
    BoardUnusable {
        /// Why the board cannot be shown.
        reason: String,
    },
    /// A page was merged into a stage.
    StageLoaded {
        /// Stage that changed.
        stage: Stage,
        /// Contacts now held for the stage.
        loaded: usize,
        /// Whether another page is available.
        has_more: bool,
    },
    /// Fetching a page of a stage failed.
    StageFetchFailed {
        /// Stage whose fetch failed.
        stage: Stage,
        /// Display label of the stage.
        label: String,
        /// Error message.
        error: String,
    },
    /// The service rejected stage filters; pages are now partitioned locally.
    DegradedMode {
        /// Active attribute key.
        attribute_key: String,
    },
    /// A move was applied locally, before remote confirmation.
    ContactMoved {
        /// Moved contact.
        contact_id: ContactId,
        /// Source stage.
        from: Stage,
        /// Target stage.
        to: Stage,
    },
    /// The remote write backing a move succeeded.
    MoveConfirmed {
        /// Moved contact.
        contact_id: ContactId,
        /// Target stage.
        to: Stage,
    },
    /// The remote write backing a move failed and the move was reverted.
    MoveFailed {
        /// Contact that was moved.
        contact_id: ContactId,
        /// Contact name for the notification.
        contact_name: String,
        /// Source stage (where the contact is again).
        from: Stage,
        /// Attempted target stage.
        to: Stage,
        /// Display label of the source stage.
        from_label: String,
        /// Display label of the target stage.
        to_label: String,
        /// Error message.
        error: String,
        /// When the failure was observed.
        occurred_at: DateTime<Utc>,
    },
}

impl BoardEvent {
    /// Returns the stages whose contents this event affects.
    pub fn stages(&self) -> Vec<&Stage> {
        match self {
            BoardEvent::SessionStarted { stages, .. } => stages.iter().collect(),
            BoardEvent::StageLoaded { stage, .. } | BoardEvent::StageFetchFailed { stage, .. } => {
                vec![stage]
            }
            BoardEvent::ContactMoved { from, to, .. } | BoardEvent::MoveFailed { from, to, .. } => {
                vec![from, to]
            }
            BoardEvent::MoveConfirmed { to, .. } => vec![to],
            BoardEvent::BoardUnusable { .. } | BoardEvent::DegradedMode { .. } => Vec::new(),
        }
    }

    /// Returns true if this event should be shown to the user as an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            BoardEvent::BoardUnusable { .. }
                | BoardEvent::StageFetchFailed { .. }
                | BoardEvent::MoveFailed { .. }
        )
    }

    /// Renders a user-facing notification for error events.
    pub fn notification(&self) -> Option<String> {
        match self {
            BoardEvent::BoardUnusable { reason } => Some(reason.clone()),
            BoardEvent::StageFetchFailed { label, error, .. } => {
                Some(format!("Could not load '{}': {}", label, error))
            }
            BoardEvent::MoveFailed {
                contact_name,
                to_label,
                error,
                ..
            } => Some(format!(
                "Could not move {} to '{}': {}",
                contact_name, to_label, error
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_failed_notification() {
        let event = BoardEvent::MoveFailed {
            contact_id: ContactId::from("R7"),
            contact_name: "Rita".into(),
            from: Stage::value("New"),
            to: Stage::value("Qualified"),
            from_label: "New".into(),
            to_label: "Qualified".into(),
            error: "HTTP 500".into(),
            occurred_at: Utc::now(),
        };
        assert!(event.is_error());
        assert_eq!(
            event.notification().unwrap(),
            "Could not move Rita to 'Qualified': HTTP 500"
        );
        assert_eq!(event.stages().len(), 2);
    }

    #[test]
    fn test_fetch_failed_notification_uses_label() {
        let event = BoardEvent::StageFetchFailed {
            stage: Stage::Unassigned,
            label: "Não Atribuído".into(),
            error: "timeout".into(),
        };
        assert_eq!(
            event.notification().unwrap(),
            "Could not load 'Não Atribuído': timeout"
        );
    }

    #[test]
    fn test_non_error_events() {
        let event = BoardEvent::StageLoaded {
            stage: Stage::Unassigned,
            loaded: 3,
            has_more: false,
        };
        assert!(!event.is_error());
        assert!(event.notification().is_none());
        assert_eq!(event.stages(), vec![&Stage::Unassigned]);
    }
}
