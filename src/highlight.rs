//! Highlight collaborator: consumes selection events raised against the
//! text layer. The viewer guarantees geometry, not persistence.

use crate::render::SelectionEvent;

pub trait HighlightStore {
    fn on_selection(&mut self, fingerprint: &str, event: &SelectionEvent);
}

/// Collects every selection in memory
#[derive(Debug, Default)]
pub struct MemoryHighlightStore {
    highlights: Vec<(String, SelectionEvent)>,
}

impl MemoryHighlightStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlights recorded for one document, oldest first
    pub fn for_document<'a>(&'a self, fingerprint: &'a str) -> impl Iterator<Item = &'a SelectionEvent> {
        self.highlights
            .iter()
            .filter(move |(f, _)| f == fingerprint)
            .map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }
}

impl HighlightStore for MemoryHighlightStore {
    fn on_selection(&mut self, fingerprint: &str, event: &SelectionEvent) {
        self.highlights.push((fingerprint.to_string(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_are_grouped_by_document() {
        let event = SelectionEvent {
            page: 1,
            text: "hi".into(),
            rects: vec![],
        };
        let mut store = MemoryHighlightStore::new();
        store.on_selection("a", &event);
        store.on_selection("b", &event);
        store.on_selection("a", &event);

        assert_eq!(store.for_document("a").count(), 2);
        assert_eq!(store.for_document("b").count(), 1);
        assert_eq!(store.len(), 3);
    }
}
