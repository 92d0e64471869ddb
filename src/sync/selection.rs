//! Delete-mode selection

use crate::sync::Mirror;
use std::collections::BTreeSet;

/// Messages picked for deletion while delete mode is on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    enabled: bool,
    ids: BTreeSet<String>,
}

impl Selection {
    /// Disabled, empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn delete mode on
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn delete mode off and forget the picks
    pub fn disable(&mut self) {
        self.enabled = false;
        self.ids.clear();
    }

    /// Whether delete mode is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip `id`; ignored outside delete mode. Returns whether it is now selected.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Whether `id` is selected
    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Selected ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Number of selected messages
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget the picks, staying in the current mode
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop picks whose message is no longer mirrored
    pub fn retain_existing(&mut self, mirror: &Mirror) {
        self.ids.retain(|id| mirror.contains(id));
    }
}
