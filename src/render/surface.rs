//! Per-page surface pairs: a thumbnail placeholder and a high-res raster

use super::engine::{Bitmap, PageSize};
use super::resources::{ResourceHandle, ResourceTable};
use super::text_layer::TextLayer;
use crate::error::RenderFailure;

/// Background painted before a high-res render lands
pub const PAGE_BACKGROUND: [u8; 3] = [0xFF, 0xFF, 0xFF];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

/// Low-detail placeholder. Never evicted while the document is open.
#[derive(Clone, Debug)]
pub struct ThumbnailSurface {
    pub handle: Option<ResourceHandle>,
    /// Natural size of the encoded image in pixels
    pub width: u32,
    pub height: u32,
    /// Provisional layout height until the image lands
    pub min_height: f32,
    pub opacity: f32,
}

impl ThumbnailSurface {
    fn placeholder(min_height: f32) -> Self {
        Self {
            handle: None,
            width: 0,
            height: 0,
            min_height,
            opacity: 1.0,
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// Attach a new image, returning the handle it replaces
    pub fn assign(&mut self, handle: ResourceHandle, width: u32, height: u32) -> Option<ResourceHandle> {
        self.width = width;
        self.height = height;
        self.min_height = 0.0;
        self.handle.replace(handle)
    }

    pub fn reveal(&mut self) {
        self.opacity = 1.0;
    }

    /// Transparent but still in layout
    pub fn fade_out(&mut self) {
        self.opacity = 0.0;
    }
}

/// Full-quality raster; zero-sized and hidden until rendered
#[derive(Clone, Debug)]
pub struct HighResSurface {
    pub bitmap: Bitmap,
    /// Display size in CSS pixels
    pub css_width: f32,
    pub css_height: f32,
    pub visibility: Visibility,
    pub opacity: f32,
    /// The bitmap holds a finished render rather than background fill
    painted: bool,
}

impl HighResSurface {
    fn detached() -> Self {
        Self {
            bitmap: Bitmap::empty(),
            css_width: 0.0,
            css_height: 0.0,
            visibility: Visibility::Hidden,
            opacity: 0.0,
            painted: false,
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// Holds a backing store
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        !self.bitmap.is_empty()
    }

    #[must_use]
    pub fn is_painted(&self) -> bool {
        self.painted
    }

    /// Resize the backing store if the dimensions changed, then paint the
    /// background. Returns whether a resize happened.
    pub fn prepare(&mut self, width: u32, height: u32, css: (f32, f32)) -> bool {
        self.painted = false;
        let resized = self.bitmap.width != width || self.bitmap.height != height;
        if resized {
            self.bitmap = Bitmap::filled(width, height, PAGE_BACKGROUND);
            self.css_width = css.0;
            self.css_height = css.1;
        } else {
            self.bitmap.fill(PAGE_BACKGROUND);
        }
        resized
    }

    pub fn present(&mut self, bitmap: Bitmap, css: (f32, f32)) {
        self.bitmap = bitmap;
        self.css_width = css.0;
        self.css_height = css.1;
        self.painted = true;
        self.reveal();
    }

    pub fn reveal(&mut self) {
        self.visibility = Visibility::Visible;
        self.opacity = 1.0;
    }

    pub fn hide(&mut self) {
        self.visibility = Visibility::Hidden;
        self.opacity = 0.0;
    }

    /// Drop the backing store and hide. Returns the raster it held.
    pub fn release(&mut self) -> Bitmap {
        self.hide();
        self.css_width = 0.0;
        self.css_height = 0.0;
        self.painted = false;
        std::mem::replace(&mut self.bitmap, Bitmap::empty())
    }
}

/// Everything the renderer knows about one page
#[derive(Clone, Debug)]
pub struct PageSurface {
    pub page: usize,
    pub size: PageSize,
    pub thumbnail: ThumbnailSurface,
    pub high_res: HighResSurface,
    /// Zoom percent of the raster currently in `high_res`
    pub last_rendered_scale: Option<u32>,
    pub render_version: u64,
    pub text_layer: Option<TextLayer>,
    pub last_error: Option<RenderFailure>,
}

impl PageSurface {
    fn new(page: usize, size: PageSize, min_height: f32) -> Self {
        Self {
            page,
            size,
            thumbnail: ThumbnailSurface::placeholder(min_height),
            high_res: HighResSurface::detached(),
            last_rendered_scale: None,
            render_version: 0,
            text_layer: None,
            last_error: None,
        }
    }

    /// Already showing a finished raster at this zoom
    #[must_use]
    pub fn is_current_at(&self, zoom: u32) -> bool {
        self.last_rendered_scale == Some(zoom)
            && self.high_res.is_visible()
            && self.high_res.is_painted()
    }

    /// Height this page occupies in the scroll container
    #[must_use]
    pub fn display_height(&self, zoom: u32) -> f32 {
        if self.high_res.is_visible() {
            self.high_res.css_height
        } else if self.thumbnail.is_loaded() {
            self.size.scaled(zoom).1
        } else {
            self.thumbnail.min_height
        }
    }

    /// Drop the high-res raster and fall back to the thumbnail
    pub fn roll_back(&mut self) -> Bitmap {
        self.text_layer = None;
        self.thumbnail.reveal();
        self.high_res.release()
    }
}

/// Owns the surfaces of the open document
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: Vec<PageSurface>,
}

impl SurfaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a placeholder pair for pages 1..=N, discarding any prior map
    /// and revoking its thumbnail handles.
    pub fn prepare_surfaces(
        &mut self,
        page_sizes: &[PageSize],
        min_height: f32,
        resources: &mut ResourceTable,
    ) {
        self.release_all(resources);
        self.surfaces = page_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| PageSurface::new(i + 1, size, min_height))
            .collect();
    }

    /// Revoke every handle and drop every raster
    pub fn release_all(&mut self, resources: &mut ResourceTable) {
        for surface in &mut self.surfaces {
            if let Some(handle) = surface.thumbnail.handle.take() {
                resources.revoke(handle);
            }
            surface.high_res.release();
        }
        self.surfaces.clear();
    }

    #[must_use]
    pub fn get(&self, page: usize) -> Option<&PageSurface> {
        page.checked_sub(1).and_then(|i| self.surfaces.get(i))
    }

    pub fn get_mut(&mut self, page: usize) -> Option<&mut PageSurface> {
        page.checked_sub(1).and_then(|i| self.surfaces.get_mut(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageSurface> {
        self.surfaces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageSurface> {
        self.surfaces.iter_mut()
    }

    /// Pages whose high-res raster is currently shown
    #[must_use]
    pub fn visible_high_res(&self) -> Vec<usize> {
        self.surfaces
            .iter()
            .filter(|s| s.high_res.is_visible())
            .map(|s| s.page)
            .collect()
    }
}
