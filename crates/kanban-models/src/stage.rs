//! Stages: the columns a classification attribute splits the board into.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::ListAttribute;
use crate::contact::Contact;

/// Default label for the synthetic "no value assigned" stage.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// One column of the board.
///
/// Either a declared value of the active attribute, or the synthetic
/// unassigned stage holding contacts whose value is absent or not legal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// A declared attribute value.
    Value(String),
    /// No legal value assigned.
    Unassigned,
}

impl Stage {
    /// Creates a stage for a declared value.
    pub fn value(v: impl Into<String>) -> Self {
        Stage::Value(v.into())
    }

    /// Classifies a contact under `attribute`.
    pub fn of(contact: &Contact, attribute: &ListAttribute) -> Stage {
        match contact.stage_value(&attribute.key) {
            Some(v) if attribute.has_value(v) => Stage::Value(v.to_string()),
            _ => Stage::Unassigned,
        }
    }

    /// Returns the attribute value a contact in this stage carries, `None`
    /// for the unassigned stage.
    pub fn attribute_value(&self) -> Option<&str> {
        match self {
            Stage::Value(v) => Some(v.as_str()),
            Stage::Unassigned => None,
        }
    }

    /// Parses user input. `-`, an empty string, or `unassigned_label`
    /// (case-insensitive) select the unassigned stage.
    pub fn parse(input: &str, unassigned_label: &str) -> Stage {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case(unassigned_label) {
            Stage::Unassigned
        } else {
            Stage::Value(trimmed.to_string())
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Value(v) => f.write_str(v),
            Stage::Unassigned => f.write_str(UNASSIGNED_LABEL),
        }
    }
}
