//! Keyboard selection over the current filtered view.
//!
//! The cursor stores an id, not a position. Navigation resolves that id
//! against whatever view is passed at call time; an id that is not in the
//! view counts as "no selection", so the first arrow press lands on the
//! first visible row. A selection filtered out of view is left dangling
//! until the user navigates.

use crate::record::{Identified, RecordId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCursor {
    selected: Option<RecordId>,
}

impl SelectionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&RecordId> {
        self.selected.as_ref()
    }

    /// Direct set, as from pointer interaction.
    pub fn select(&mut self, id: RecordId) {
        self.selected = Some(id);
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Index of the selection within `view`, if present.
    pub fn position_in<R: Identified>(&self, view: &[R]) -> Option<usize> {
        let selected = self.selected.as_ref()?;
        view.iter().position(|r| r.record_id() == selected)
    }

    pub fn move_down<R: Identified>(&mut self, view: &[R]) {
        if view.is_empty() {
            return;
        }
        let next = match self.position_in(view) {
            Some(i) => (i + 1).min(view.len() - 1),
            None => 0,
        };
        self.selected = Some(view[next].record_id().clone());
    }

    pub fn move_up<R: Identified>(&mut self, view: &[R]) {
        if view.is_empty() {
            return;
        }
        let next = match self.position_in(view) {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.selected = Some(view[next].record_id().clone());
    }
}
