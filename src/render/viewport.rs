//! Viewport tracking: page layout, current-page detection, frame-aligned
//! coalescing and the sliding render window.
//!
//! The tracker is the only place that decides which page is current.
//! Progress persistence, callbacks and navigation all read from it.

/// Vertical geometry of the page column in CSS pixels
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    tops: Vec<f32>,
    heights: Vec<f32>,
    total_height: f32,
}

impl PageLayout {
    /// Stack pages top to bottom with `gap` above the first page and between
    /// every pair.
    #[must_use]
    pub fn from_heights(heights: &[f32], gap: f32) -> Self {
        let mut tops = Vec::with_capacity(heights.len());
        let mut y = gap;
        for &h in heights {
            tops.push(y);
            y += h + gap;
        }
        Self {
            tops,
            heights: heights.to_vec(),
            total_height: y,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.tops.len()
    }

    /// Offset of a 1-based page's top edge
    #[must_use]
    pub fn top(&self, page: usize) -> Option<f32> {
        page.checked_sub(1).and_then(|i| self.tops.get(i)).copied()
    }

    #[must_use]
    pub fn height(&self, page: usize) -> Option<f32> {
        page.checked_sub(1).and_then(|i| self.heights.get(i)).copied()
    }

    #[must_use]
    pub fn center(&self, page: usize) -> Option<f32> {
        Some(self.top(page)? + self.height(page)? / 2.0)
    }

    #[must_use]
    pub fn total_height(&self) -> f32 {
        self.total_height
    }

    /// Page whose vertical center is nearest `y`. Ties go to the lower page.
    #[must_use]
    pub fn nearest_center(&self, y: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, (&top, &h)) in self.tops.iter().zip(&self.heights).enumerate() {
            let distance = (top + h / 2.0 - y).abs();
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((i + 1, distance)),
            }
        }
        best.map(|(page, _)| page)
    }
}

/// Coalesces scroll/resize bursts into one evaluation per display refresh
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameThrottle {
    pending: bool,
}

impl FrameThrottle {
    /// Ask for an evaluation on the next frame. Returns true only for the
    /// request that actually scheduled one.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    /// Consume the pending request, if any
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn reset(&mut self) {
        self.pending = false;
    }
}

/// Pages eligible for a high-res surface
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderWindow {
    /// In render priority order
    pages: Vec<usize>,
}

impl RenderWindow {
    /// `{current, current-1, current+1}`, clipped to the document
    #[must_use]
    pub fn around(current: usize, page_count: usize) -> Self {
        let pages = [Some(current), current.checked_sub(1), Some(current + 1)]
            .into_iter()
            .flatten()
            .filter(|&p| (1..=page_count).contains(&p))
            .collect();
        Self { pages }
    }

    /// Every page, ascending
    #[must_use]
    pub fn all(page_count: usize) -> Self {
        Self {
            pages: (1..=page_count).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Authoritative current-page state
#[derive(Clone, Debug, Default)]
pub struct ViewportTracker {
    current_page: usize,
    last_scroll_top: f32,
    evaluations: u64,
}

impl ViewportTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn last_scroll_top(&self) -> f32 {
        self.last_scroll_top
    }

    /// Viewport computations performed so far
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Seed the current page without an evaluation (document load)
    pub fn reset(&mut self, page: usize) {
        self.current_page = page;
        self.last_scroll_top = 0.0;
    }

    /// Recompute the current page. Returns the new page when it changed.
    pub fn evaluate(
        &mut self,
        scroll_top: f32,
        viewport_height: f32,
        layout: &PageLayout,
    ) -> Option<usize> {
        self.evaluations += 1;
        self.last_scroll_top = scroll_top;

        let page = layout.nearest_center(scroll_top + viewport_height / 2.0)?;
        if page == self.current_page {
            return None;
        }
        self.current_page = page;
        Some(page)
    }
}
