//! Selection lookup and filtered/sorted listing.

use crate::model::note::{Note, NoteId};
use crate::model::theme::Theme;

/// Returns the selected note, or `None` when nothing is selected or the
/// selection points at a note that no longer exists.
pub fn selected_note<'a>(notes: &'a [Note], selection: Option<&NoteId>) -> Option<&'a Note> {
    let selection = selection?;
    notes.iter().find(|note| &note.id == selection)
}

/// Returns notes whose title or content contains `query`
/// case-insensitively, newest `updated_at` first.
///
/// Notes with equal `updated_at` keep their collection order.
pub fn visible_notes<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let needle = query.to_lowercase();
    let mut visible = notes
        .iter()
        .filter(|note| matches_query(note, &needle))
        .collect::<Vec<_>>();
    // sort_by is stable.
    visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    visible
}

/// `needle` must already be lowercased.
fn matches_query(note: &Note, needle: &str) -> bool {
    needle.is_empty()
        || note.title.to_lowercase().contains(needle)
        || note.content.to_lowercase().contains(needle)
}

/// Snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesView {
    pub selected: Option<Note>,
    pub visible: Vec<Note>,
    pub query: String,
    pub theme: Theme,
    /// Size of the unfiltered collection.
    pub total: usize,
}

impl NotesView {
    pub fn compute(notes: &[Note], selection: Option<&NoteId>, query: &str, theme: Theme) -> Self {
        Self {
            selected: selected_note(notes, selection).cloned(),
            visible: visible_notes(notes, query).into_iter().cloned().collect(),
            query: query.to_string(),
            theme,
            total: notes.len(),
        }
    }

    pub fn is_selected(&self, id: &NoteId) -> bool {
        self.selected.as_ref().is_some_and(|note| &note.id == id)
    }

    /// Whether the collection itself is empty, as opposed to a search
    /// that matched nothing.
    pub fn has_no_notes(&self) -> bool {
        self.total == 0
    }
}
