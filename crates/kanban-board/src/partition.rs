//! Partition cache: the contacts currently materialized per stage.
//!
//! Every contact identity lives in at most one stage, at most once. The
//! cache keeps an identity index next to the per-stage sequences so that
//! invariant is enforced on every write rather than assumed.

use std::collections::HashMap;

use kanban_models::{Contact, ContactId, Stage};

/// Per-stage ordered contact sequences with identity deduplication.
#[derive(Debug, Clone, Default)]
pub struct PartitionCache {
    /// Classification attribute the stages belong to.
    attribute_key: String,
    /// Contacts per stage, in arrival order.
    partitions: HashMap<Stage, Vec<Contact>>,
    /// Stage currently holding each identity.
    index: HashMap<ContactId, Stage>,
}

impl PartitionCache {
    /// Creates an empty cache for `attribute_key`.
    pub fn new(attribute_key: impl Into<String>) -> Self {
        Self {
            attribute_key: attribute_key.into(),
            partitions: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Merges contacts observed in `stage`.
    ///
    /// Contacts already in `stage` are left in place. Contacts currently held
    /// by another stage are taken out of it first: the most recent
    /// observation wins. Returns the number of contacts appended.
    pub fn merge<I>(&mut self, stage: &Stage, contacts: I) -> usize
    where
        I: IntoIterator<Item = Contact>,
    {
        let mut added = 0;
        for contact in contacts {
            match self.index.get(&contact.id) {
                Some(current) if current == stage => continue,
                Some(current) => {
                    let current = current.clone();
                    self.remove_from(&current, &contact.id);
                }
                None => {}
            }
            self.index.insert(contact.id.clone(), stage.clone());
            self.partitions.entry(stage.clone()).or_default().push(contact);
            added += 1;
        }
        added
    }

    /// Moves a contact from `from` to `to`, rewriting its attribute value
    /// (or clearing it for the unassigned stage).
    ///
    /// Returns the updated contact, or `None` (and changes nothing) when the
    /// contact is not in `from`.
    pub fn apply_move(&mut self, id: &ContactId, from: &Stage, to: &Stage) -> Option<Contact> {
        if self.index.get(id) != Some(from) {
            return None;
        }
        let original = self.remove_from(from, id)?;
        let updated = original.with_stage(&self.attribute_key, to.attribute_value());
        self.index.insert(id.clone(), to.clone());
        self.partitions
            .entry(to.clone())
            .or_default()
            .push(updated.clone());
        Some(updated)
    }

    /// Puts `original` back into `stage` at `position` (clamped), wherever
    /// its identity currently is.
    pub fn restore(&mut self, original: Contact, stage: &Stage, position: usize) {
        if let Some(current) = self.index.get(&original.id).cloned() {
            self.remove_from(&current, &original.id);
        }
        self.index.insert(original.id.clone(), stage.clone());
        let contacts = self.partitions.entry(stage.clone()).or_default();
        let position = position.min(contacts.len());
        contacts.insert(position, original);
    }

    /// Clears every stage.
    pub fn reset(&mut self) {
        self.partitions.clear();
        self.index.clear();
    }

    /// Returns the contacts held for `stage`.
    pub fn get(&self, stage: &Stage) -> &[Contact] {
        self.partitions.get(stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the stage holding `id`.
    pub fn stage_of(&self, id: &ContactId) -> Option<&Stage> {
        self.index.get(id)
    }

    /// Returns the position of `id` within `stage`.
    pub fn position(&self, stage: &Stage, id: &ContactId) -> Option<usize> {
        self.get(stage).iter().position(|c| &c.id == id)
    }

    /// Number of contacts held for `stage`.
    pub fn len(&self, stage: &Stage) -> usize {
        self.get(stage).len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Checks that every identity appears exactly once and the index agrees
    /// with the partitions.
    pub fn is_consistent(&self) -> bool {
        let mut seen: HashMap<&ContactId, &Stage> = HashMap::new();
        for (stage, contacts) in &self.partitions {
            for contact in contacts {
                if seen.insert(&contact.id, stage).is_some() {
                    return false;
                }
            }
        }
        seen.len() == self.index.len()
            && seen
                .iter()
                .all(|(id, stage)| self.index.get(*id) == Some(*stage))
    }

    fn remove_from(&mut self, stage: &Stage, id: &ContactId) -> Option<Contact> {
        let contacts = self.partitions.get_mut(stage)?;
        let position = contacts.iter().position(|c| &c.id == id)?;
        self.index.remove(id);
        Some(contacts.remove(position))
    }
}
