//! List-type classification attributes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A remotely defined, enumerated contact attribute that can partition the
/// board into stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAttribute {
    /// Attribute key as stored on contacts.
    pub key: String,

    /// Human-readable attribute name.
    pub display_name: String,

    /// Legal values in declared order.
    #[serde(default)]
    pub values: Vec<String>,

    /// Optional display labels for individual values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub value_display_names: HashMap<String, String>,
}

impl ListAttribute {
    /// Creates an attribute with the given legal values.
    pub fn new<I, S>(key: impl Into<String>, display_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            values: values.into_iter().map(Into::into).collect(),
            value_display_names: HashMap::new(),
        }
    }

    /// Sets the display label for one value.
    pub fn with_value_display_name(
        mut self,
        value: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.value_display_names.insert(value.into(), label.into());
        self
    }

    /// Returns true if `value` is one of the declared values.
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Returns the attribute's name for selectors, falling back to the key.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.key
        } else {
            &self.display_name
        }
    }
}
