//! Text selection over the text layer overlay

use super::text_layer::{TextLayer, TextNode};

/// A point in overlay coordinates (CSS pixels from the page's top-left)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SelectionPoint {
    pub page: usize,
    pub x: f32,
    pub y: f32,
}

impl SelectionPoint {
    #[must_use]
    pub fn new(page: usize, x: f32, y: f32) -> Self {
        Self { page, x, y }
    }
}

/// Text selection state
#[derive(Clone, Debug, Default)]
pub struct TextSelection {
    /// Start point of selection
    pub start: Option<SelectionPoint>,
    /// End point of selection
    pub end: Option<SelectionPoint>,
    /// Whether selection is in progress
    pub is_selecting: bool,
}

impl TextSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start selection at a point
    pub fn start_at(&mut self, point: SelectionPoint) {
        self.start = Some(point);
        self.end = Some(point);
        self.is_selecting = true;
    }

    /// Update the end point during selection
    pub fn update_end(&mut self, point: SelectionPoint) {
        if self.is_selecting {
            self.end = Some(point);
        }
    }

    /// Finish selection
    pub fn finish(&mut self) {
        self.is_selecting = false;
    }

    /// Clear selection
    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
        self.is_selecting = false;
    }

    /// Check if there is an active selection
    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Get ordered selection bounds (start before end in reading order)
    #[must_use]
    pub fn get_ordered_bounds(&self) -> Option<(SelectionPoint, SelectionPoint)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                let start_before = (start.page, start.y, start.x) <= (end.page, end.y, end.x);
                if start_before {
                    Some((start, end))
                } else {
                    Some((end, start))
                }
            }
            _ => None,
        }
    }
}

/// Rectangle covered by one selected text node
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionRect {
    pub page: usize,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Resolved selection handed to the highlight store
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionEvent {
    /// Page the selection starts on
    pub page: usize,
    pub text: String,
    pub rects: Vec<SelectionRect>,
}

fn after_start(page: usize, node: &TextNode, start: &SelectionPoint) -> bool {
    let (_, top, right, bottom) = node.bounds();
    page > start.page
        || (page == start.page && (top > start.y || (bottom >= start.y && right > start.x)))
}

fn before_end(page: usize, node: &TextNode, end: &SelectionPoint) -> bool {
    let (left, top, _, bottom) = node.bounds();
    page < end.page || (page == end.page && (bottom < end.y || (top <= end.y && left < end.x)))
}

/// Resolve a selection against the text layers of the pages it spans.
///
/// `layer_for` returns the overlay currently built for a page; pages without
/// one contribute nothing. Returns `None` when no text falls inside.
pub fn resolve_selection<'a>(
    selection: &TextSelection,
    layer_for: impl Fn(usize) -> Option<&'a TextLayer>,
) -> Option<SelectionEvent> {
    let (start, end) = selection.get_ordered_bounds()?;

    let mut text = String::new();
    let mut rects = Vec::new();
    let mut last_top: Option<(usize, f32)> = None;

    for page in start.page..=end.page {
        let Some(layer) = layer_for(page) else {
            continue;
        };
        for node in &layer.nodes {
            if !(after_start(page, node, &start) && before_end(page, node, &end)) {
                continue;
            }

            if let Some((last_page, top)) = last_top {
                let same_line = last_page == page && (node.top - top).abs() < node.font_size / 2.0;
                text.push(if same_line { ' ' } else { '\n' });
            }
            text.push_str(&node.text);
            last_top = Some((page, node.top));

            let (x0, y0, x1, y1) = node.bounds();
            rects.push(SelectionRect {
                page,
                x0,
                y0,
                x1,
                y1,
            });
        }
    }

    if rects.is_empty() {
        return None;
    }
    Some(SelectionEvent {
        page: start.page,
        text,
        rects,
    })
}
