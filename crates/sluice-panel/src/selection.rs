//! Multi-select state for bulk queue actions.

use std::collections::{BTreeSet, HashSet};

/// Tri-state of the "select all" checkbox for the visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectAllState {
    /// No visible row is selected.
    #[default]
    None,
    /// Some, but not all, visible rows are selected.
    Some,
    /// Every visible row is selected.
    All,
}

/// Set of selected queue item identifiers.
///
/// After every snapshot ingestion the set is pruned against the snapshot, so it never
/// references an identifier the backend no longer reports.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionStore {
    selected: BTreeSet<String>,
}

impl SelectionStore {
    /// Empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            selected: BTreeSet::new(),
        }
    }

    /// Mark or unmark one identifier.
    pub fn set_selected(&mut self, id: &str, selected: bool) {
        if selected {
            self.selected.insert(id.to_string());
        } else {
            self.selected.remove(id);
        }
    }

    /// Flip one identifier; returns the new state.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    /// Mark or unmark every identifier in `ids`.
    pub fn select_all<I, S>(&mut self, ids: I, selected: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            self.set_selected(id.as_ref(), selected);
        }
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected identifiers in sorted order.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    /// Number of selected identifiers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.selected.len()
    }

    /// Drop every selection.
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop every identifier that is not in `current_ids`. Returns how many were dropped.
    pub fn prune(&mut self, current_ids: &HashSet<&str>) -> usize {
        let before = self.selected.len();
        self.selected.retain(|id| current_ids.contains(id.as_str()));
        before - self.selected.len()
    }

    /// Checkbox state for a set of visible identifiers.
    #[must_use]
    pub fn select_all_state<I, S>(&self, visible_ids: I) -> SelectAllState
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut visible = 0_usize;
        let mut selected = 0_usize;
        for id in visible_ids {
            visible += 1;
            if self.is_selected(id.as_ref()) {
                selected += 1;
            }
        }
        if selected == 0 {
            SelectAllState::None
        } else if selected == visible {
            SelectAllState::All
        } else {
            SelectAllState::Some
        }
    }
}
