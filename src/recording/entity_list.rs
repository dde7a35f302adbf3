//! Filterable list of the entities in the current frame.

use crate::schema::{EntitySnapshot, Frame};

use super::sink::EntityListSink;

/// One row of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityEntry {
    pub entity_id: String,
    /// Display label, the entity name when first seen.
    pub label: String,
    /// Present in the current frame.
    pub present: bool,
    /// Shown when no search filter is active.
    pub default_visible: bool,
    /// Shown with the current filter applied.
    pub visible: bool,
}

/// Entity list model.
///
/// Rows are created the first time an entity appears and kept afterwards;
/// rows of entities missing from the current frame are hidden.
#[derive(Debug, Clone)]
pub struct EntityList {
    entries: Vec<EntityEntry>,
    hidden_prefix: String,
    filter: String,
    current: Option<(usize, Frame)>,
}

impl EntityList {
    /// Create an empty list hiding names that start with `hidden_prefix`.
    pub fn new(hidden_prefix: &str) -> Self {
        Self {
            entries: Vec::new(),
            hidden_prefix: hidden_prefix.to_string(),
            filter: String::new(),
            current: None,
        }
    }

    pub fn entries(&self) -> &[EntityEntry] {
        &self.entries
    }

    /// Rows currently shown.
    pub fn visible(&self) -> impl Iterator<Item = &EntityEntry> {
        self.entries.iter().filter(|e| e.visible)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Set the search text. Matching is a case-insensitive substring test on
    /// the label; an empty filter restores the default visibility.
    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_lowercase();
        self.apply_filter();
    }

    /// Frame index of the last refresh.
    pub fn frame_index(&self) -> Option<usize> {
        self.current.as_ref().map(|(i, _)| *i)
    }

    /// Snapshot of a listed entity in the current frame, for tracking it.
    pub fn select(&self, entity_id: &str) -> Option<&EntitySnapshot> {
        self.current.as_ref()?.1.get(entity_id)
    }

    fn apply_filter(&mut self) {
        let filter = &self.filter;
        for entry in &mut self.entries {
            entry.visible = if filter.is_empty() {
                entry.default_visible
            } else {
                entry.present && entry.label.to_lowercase().contains(filter.as_str())
            };
        }
    }
}

impl EntityListSink for EntityList {
    fn refresh(&mut self, frame_index: usize, frame: &Frame) {
        for entry in &mut self.entries {
            entry.present = frame.contains(&entry.entity_id);
            entry.default_visible = entry.present
                && frame
                    .get(&entry.entity_id)
                    .is_some_and(|s| !s.name.starts_with(&self.hidden_prefix));
        }

        for snapshot in frame {
            if self.entries.iter().any(|e| e.entity_id == snapshot.entity_id) {
                continue;
            }
            self.entries.push(EntityEntry {
                entity_id: snapshot.entity_id.clone(),
                label: snapshot.name.clone(),
                present: true,
                default_visible: !snapshot.name.starts_with(&self.hidden_prefix),
                visible: false,
            });
        }

        self.current = Some((frame_index, frame.clone()));
        self.apply_filter();
    }
}
