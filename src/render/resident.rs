//! Resident set - bounds how many pages hold a materialized high-res raster

use lru::LruCache;

/// Smallest and largest accepted bound
pub const MIN_BOUND: usize = 3;
pub const MAX_BOUND: usize = 6;
pub const DEFAULT_BOUND: usize = 4;

/// Recency-ordered set of page numbers.
///
/// Every mutation restores `len() <= bound()` before returning unless
/// eviction is disabled, in which case the set grows without limit.
pub struct ResidentSet {
    order: LruCache<usize, ()>,
    bound: usize,
    eviction_disabled: bool,
}

impl ResidentSet {
    #[must_use]
    pub fn new(bound: usize, eviction_disabled: bool) -> Self {
        Self {
            order: LruCache::unbounded(),
            bound: clamp_bound(bound),
            eviction_disabled,
        }
    }

    /// Mark `page` most recently used. Returns the pages evicted to get back
    /// under the bound, least recent first.
    pub fn touch(&mut self, page: usize) -> Vec<usize> {
        if self.order.get(&page).is_none() {
            self.order.put(page, ());
        }
        self.enforce_bound()
    }

    /// Forget a page without counting it as an eviction
    pub fn remove(&mut self, page: usize) -> bool {
        self.order.pop(&page).is_some()
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.order.contains(&page)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn bound(&self) -> usize {
        self.bound
    }

    #[must_use]
    pub fn is_eviction_disabled(&self) -> bool {
        self.eviction_disabled
    }

    /// Pages from most to least recently used
    #[must_use]
    pub fn pages(&self) -> Vec<usize> {
        self.order.iter().map(|(&p, _)| p).collect()
    }

    /// Pages in ascending page order
    #[must_use]
    pub fn sorted(&self) -> Vec<usize> {
        let mut pages = self.pages();
        pages.sort_unstable();
        pages
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    fn enforce_bound(&mut self) -> Vec<usize> {
        let mut evicted = Vec::new();
        if self.eviction_disabled {
            return evicted;
        }
        while self.order.len() > self.bound {
            match self.order.pop_lru() {
                Some((page, ())) => evicted.push(page),
                None => break,
            }
        }
        evicted
    }
}

/// Clamp a requested bound into the supported range
#[must_use]
pub fn clamp_bound(bound: usize) -> usize {
    bound.clamp(MIN_BOUND, MAX_BOUND)
}

impl std::fmt::Debug for ResidentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidentSet")
            .field("pages", &self.pages())
            .field("bound", &self.bound)
            .field("eviction_disabled", &self.eviction_disabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_evicts_least_recent_over_bound() {
        let mut set = ResidentSet::new(3, false);
        assert!(set.touch(1).is_empty());
        assert!(set.touch(2).is_empty());
        assert!(set.touch(3).is_empty());

        // 1 becomes most recent, so 2 is the oldest
        assert!(set.touch(1).is_empty());
        assert_eq!(set.touch(4), vec![2]);
        assert_eq!(set.sorted(), vec![1, 3, 4]);
        assert_eq!(set.pages(), vec![4, 1, 3]);
    }

    #[test]
    fn size_never_exceeds_bound_for_any_touch_sequence() {
        for bound in MIN_BOUND..=MAX_BOUND {
            let mut set = ResidentSet::new(bound, false);
            // deterministic pseudo-random walk over 40 pages
            let mut x: usize = 7;
            for _ in 0..500 {
                x = (x * 31 + 17) % 40 + 1;
                set.touch(x);
                assert!(set.len() <= bound);
                assert!(set.contains(x));
            }
        }
    }

    #[test]
    fn disabled_eviction_is_unbounded() {
        let mut set = ResidentSet::new(3, true);
        for page in 1..=10 {
            assert!(set.touch(page).is_empty());
        }
        assert_eq!(set.len(), 10);
        assert!(set.is_eviction_disabled());
    }

    #[test]
    fn bound_is_clamped() {
        assert_eq!(ResidentSet::new(0, false).bound(), MIN_BOUND);
        assert_eq!(ResidentSet::new(99, false).bound(), MAX_BOUND);
        assert_eq!(ResidentSet::new(5, false).bound(), 5);
    }

    #[test]
    fn remove_is_not_an_eviction() {
        let mut set = ResidentSet::new(3, false);
        set.touch(1);
        set.touch(2);
        assert!(set.remove(1));
        assert!(!set.remove(1));
        assert_eq!(set.pages(), vec![2]);
    }
}
