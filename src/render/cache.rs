//! LRU cache of rasters rolled back out of the render window

use std::num::NonZeroUsize;

use lru::LruCache;

use super::engine::Bitmap;
use super::text_layer::TextLayer;

/// Cache key for retired rasters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetiredKey {
    pub page: usize,
    /// Zoom percent the raster was painted at
    pub zoom: u32,
}

/// A stale but still valid raster for one page at one zoom
#[derive(Clone, Debug)]
pub struct RetiredSurface {
    pub bitmap: Bitmap,
    pub css_size: (f32, f32),
    pub text_layer: Option<TextLayer>,
}

/// Bounded store of rolled-back rasters. A hit at the current zoom lets a
/// page that re-enters the window skip the paint entirely.
pub struct RetiredCache {
    cache: LruCache<RetiredKey, RetiredSurface>,
}

impl RetiredCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Store a raster, replacing any other zoom held for the same page
    pub fn insert(&mut self, key: RetiredKey, surface: RetiredSurface) {
        self.invalidate_page(key.page);
        self.cache.put(key, surface);
    }

    /// Remove and return the raster for `key`
    pub fn take(&mut self, key: &RetiredKey) -> Option<RetiredSurface> {
        self.cache.pop(key)
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &RetiredKey) -> bool {
        self.cache.contains(key)
    }

    /// Zoom of the raster held for `page`, if any
    #[must_use]
    pub fn zoom_of(&self, page: usize) -> Option<u32> {
        self.cache
            .iter()
            .find(|(k, _)| k.page == page)
            .map(|(k, _)| k.zoom)
    }

    /// Invalidate all cached versions of a specific page
    pub fn invalidate_page(&mut self, page: usize) {
        let keys_to_remove: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| *k)
            .collect();

        for key in keys_to_remove {
            self.cache.pop(&key);
        }
    }

    /// Drop least recently retired rasters until at most `len` remain.
    /// Returns the dropped keys.
    pub fn shrink_to(&mut self, len: usize) -> Vec<RetiredKey> {
        let mut dropped = Vec::new();
        while self.cache.len() > len {
            match self.cache.pop_lru() {
                Some((key, _)) => dropped.push(key),
                None => break,
            }
        }
        dropped
    }

    /// Pages holding a raster, ascending
    #[must_use]
    pub fn pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.cache.iter().map(|(k, _)| k.page).collect();
        pages.sort_unstable();
        pages
    }

    /// Clear all cached rasters
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached rasters
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Cache capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retired(w: u32) -> RetiredSurface {
        RetiredSurface {
            bitmap: Bitmap::filled(w, 1, [0, 0, 0]),
            css_size: (w as f32, 1.0),
            text_layer: None,
        }
    }

    fn key(page: usize, zoom: u32) -> RetiredKey {
        RetiredKey { page, zoom }
    }

    #[test]
    fn test_take_removes_entry() {
        let mut cache = RetiredCache::new(3);
        cache.insert(key(1, 100), retired(2));
        assert!(cache.contains(&key(1, 100)));
        assert!(cache.take(&key(1, 150)).is_none());

        let hit = cache.take(&key(1, 100)).unwrap();
        assert_eq!(hit.bitmap.width, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_one_zoom_per_page() {
        let mut cache = RetiredCache::new(3);
        cache.insert(key(1, 100), retired(2));
        cache.insert(key(1, 150), retired(3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.zoom_of(1), Some(150));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = RetiredCache::new(2);
        cache.insert(key(1, 100), retired(1));
        cache.insert(key(2, 100), retired(1));
        cache.insert(key(3, 100), retired(1));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(1, 100)));
        assert!(cache.contains(&key(3, 100)));
    }

    #[test]
    fn test_shrink_drops_oldest_first() {
        let mut cache = RetiredCache::new(4);
        cache.insert(key(1, 100), retired(1));
        cache.insert(key(2, 100), retired(1));
        cache.insert(key(3, 100), retired(1));

        assert_eq!(cache.shrink_to(1), vec![key(1, 100), key(2, 100)]);
        assert_eq!(cache.pages(), vec![3]);
        assert!(cache.shrink_to(5).is_empty());
        assert_eq!(cache.shrink_to(0), vec![key(3, 100)]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        assert_eq!(RetiredCache::new(0).capacity(), 1);
    }
}
