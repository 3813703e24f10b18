//! Contact records as served by the remote contact service.
//!
//! Contacts are treated as immutable snapshots: any local change produces a
//! new `Contact` value rather than mutating one other holders can observe.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Stable identity of a contact.
///
/// Chatwoot emits numeric IDs, but the board only relies on equality, so the
/// identity is kept in its string form and accepts either shape on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    /// Creates a contact ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContactId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for ContactId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for ContactId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => ContactId::from(n),
            RawId::Str(s) => ContactId(s),
        })
    }
}

/// A contact and its custom attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique, stable identity.
    pub id: ContactId,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Thumbnail image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Avatar URL, used when no thumbnail is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Custom attribute values keyed by attribute key.
    #[serde(default)]
    pub custom_attributes: Map<String, Value>,
}

impl Contact {
    /// Creates a contact with no custom attributes.
    pub fn new(id: impl Into<ContactId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: None,
            phone_number: None,
            thumbnail: None,
            avatar_url: None,
            custom_attributes: Map::new(),
        }
    }

    /// Builder-style setter for a custom attribute value.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the name, or the ID when the contact has no name.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("#{}", self.id),
        }
    }

    /// Returns the card image: the thumbnail, else the avatar.
    pub fn image_url(&self) -> Option<&str> {
        self.thumbnail
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.avatar_url.as_deref())
    }

    /// Returns the value of `key` when it is a non-empty string.
    pub fn stage_value(&self, key: &str) -> Option<&str> {
        match self.custom_attributes.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a copy of this contact with `key` set to `value`, or removed
    /// when `value` is `None`.
    pub fn with_stage(&self, key: &str, value: Option<&str>) -> Contact {
        let mut updated = self.clone();
        match value {
            Some(v) => {
                updated
                    .custom_attributes
                    .insert(key.to_string(), Value::String(v.to_string()));
            }
            None => {
                updated.custom_attributes.remove(key);
            }
        }
        updated
    }

    /// Returns the custom attributes worth showing on a card: keys starting
    /// with `prefix` whose value is neither null nor empty, sorted by key.
    pub fn card_attributes(&self, prefix: &str) -> Vec<(String, String)> {
        let mut shown: Vec<(String, String)> = self
            .custom_attributes
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::String(s) if s.is_empty() => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), rendered))
            })
            .collect();
        shown.sort();
        shown
    }
}
