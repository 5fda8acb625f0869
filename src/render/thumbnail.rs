//! Thumbnail scheduling: a window around the initial page first, then the
//! rest of the document trickling in with a small stagger.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Zoom-independent scale thumbnails are painted at
pub const THUMBNAIL_SCALE: f32 = 0.2;
/// Pages on each side of the initial page rendered first
pub const THUMBNAIL_WINDOW: usize = 3;
/// Gap between consecutive thumbnail dispatches
pub const THUMBNAIL_STAGGER: Duration = Duration::from_millis(8);

/// Order thumbnails are produced in
#[must_use]
pub fn thumbnail_order(initial: usize, page_count: usize, window: usize) -> Vec<usize> {
    if page_count == 0 {
        return Vec::new();
    }
    let initial = initial.clamp(1, page_count);
    let start = initial.saturating_sub(window).max(1);
    let end = (initial + window).min(page_count);

    let mut order: Vec<usize> = (start..=end).collect();
    order.extend((1..start).chain(end + 1..=page_count));
    order
}

/// Staggered dispatch queue
#[derive(Debug, Default)]
pub struct ThumbnailSchedule {
    queue: VecDeque<(usize, Instant)>,
}

impl ThumbnailSchedule {
    /// Lay out `order` starting at `start`, one page every `stagger`
    #[must_use]
    pub fn new(order: &[usize], start: Instant, stagger: Duration) -> Self {
        let queue = order
            .iter()
            .enumerate()
            .map(|(i, &page)| (page, start + stagger * i as u32))
            .collect();
        Self { queue }
    }

    /// Pop every page whose slot has come up
    pub fn due(&mut self, now: Instant) -> Vec<usize> {
        let mut due = Vec::new();
        while let Some(&(page, at)) = self.queue.front() {
            if at > now {
                break;
            }
            due.push(page);
            self.queue.pop_front();
        }
        due
    }

    /// When the next page becomes due
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.front().map(|&(_, at)| at)
    }

    /// Drop a page from the queue, e.g. because it was rendered directly
    pub fn remove(&mut self, page: usize) {
        self.queue.retain(|&(p, _)| p != page);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
