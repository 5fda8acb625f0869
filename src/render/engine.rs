//! Document engine seam and the raster/text types it produces

use crate::error::EngineFault;

use super::request::CancelToken;

/// Opens raw document bytes into a page source.
///
/// Every render worker opens its own `PageSource` from the shared bytes, so
/// sources never cross threads and engines with thread-bound handles (MuPDF)
/// work unchanged.
pub trait DocumentEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageSource>, EngineFault>;
}

/// An opened document. Page numbers are 1-based.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Page size in points at scale 1.0
    fn page_size(&self, page: usize) -> Result<PageSize, EngineFault>;

    /// Paint a page at `scale`. Implementations may poll `cancel` between
    /// drawing steps and return `EngineFault::Cancelled`; they are never
    /// interrupted mid-call.
    fn render(&self, page: usize, scale: f32, cancel: &CancelToken)
    -> Result<Bitmap, EngineFault>;

    /// Text runs in PDF user space (origin bottom-left, y up)
    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, EngineFault>;
}

/// Page dimensions in points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size in CSS pixels at a zoom percentage
    #[must_use]
    pub fn scaled(self, zoom_percent: u32) -> (f32, f32) {
        let s = zoom_percent as f32 / 100.0;
        (self.width * s, self.height * s)
    }

    /// Backing-store size in device pixels: zoom × device pixel ratio, floored
    #[must_use]
    pub fn device_pixels(self, zoom_percent: u32, device_pixel_ratio: f32) -> (u32, u32) {
        let s = zoom_percent as f32 / 100.0 * device_pixel_ratio;
        (
            (self.width * s).floor().max(0.0) as u32,
            (self.height * s).floor().max(0.0) as u32,
        )
    }
}

/// RGB raster, 3 bytes per pixel, rows packed
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// A raster filled with one colour
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 3);
        for _ in 0..len {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes held by the backing store
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Paint the whole raster with one colour, keeping dimensions
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A run of text as reported by the engine.
///
/// `transform` is the text matrix `[a, b, c, d, e, f]` mapping glyph space
/// into page space; `width` and `height` are in page units.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub transform: [f32; 6],
    pub width: f32,
    pub height: f32,
    /// Font ascent as a fraction of the font size, when known
    pub ascent: Option<f32>,
}

impl TextRun {
    /// An unrotated run with its baseline at (`x`, `y`)
    #[must_use]
    pub fn horizontal(text: impl Into<String>, x: f32, y: f32, font_size: f32, width: f32) -> Self {
        Self {
            text: text.into(),
            transform: [font_size, 0.0, 0.0, font_size, x, y],
            width,
            height: font_size,
            ascent: None,
        }
    }
}
