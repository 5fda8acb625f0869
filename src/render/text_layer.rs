//! Invisible selectable text overlay matched to the page raster
//!
//! Positions are in CSS pixels relative to the page's top-left corner, the
//! same space the high-res surface is displayed in.

use super::engine::{PageSize, TextRun};

/// Ascent used when the engine does not report one
const DEFAULT_ASCENT: f32 = 0.8;

/// One positioned, zero-opacity text node
#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub font_size: f32,
    /// Rotation in degrees, clockwise in screen space
    pub angle: f32,
    /// Width the text must be stretched to, in pixels
    pub width: f32,
    pub opacity: f32,
}

impl TextNode {
    /// Axis-aligned bounds `(x0, y0, x1, y1)` of the unrotated box
    #[must_use]
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.font_size,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayer {
    pub page: usize,
    /// Zoom percent the layer was built for
    pub zoom: u32,
    pub nodes: Vec<TextNode>,
}

/// Viewport transform from PDF user space (y up) to CSS pixels (y down)
#[must_use]
pub fn viewport_transform(size: PageSize, zoom: u32) -> [f32; 6] {
    let s = zoom as f32 / 100.0;
    [s, 0.0, 0.0, -s, 0.0, size.height * s]
}

/// Compose two affine transforms: `m1 · m2`
#[must_use]
pub fn compose(m1: [f32; 6], m2: [f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[2] * m2[1],
        m1[1] * m2[0] + m1[3] * m2[1],
        m1[0] * m2[2] + m1[2] * m2[3],
        m1[1] * m2[2] + m1[3] * m2[3],
        m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
        m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
    ]
}

/// Build the overlay for a page rendered at `zoom`
#[must_use]
pub fn build_text_layer(page: usize, size: PageSize, zoom: u32, runs: &[TextRun]) -> TextLayer {
    let viewport = viewport_transform(size, zoom);
    let scale = zoom as f32 / 100.0;

    let nodes = runs
        .iter()
        .filter(|run| !run.text.trim().is_empty())
        .map(|run| {
            let tx = compose(viewport, run.transform);
            // y is flipped, so a clockwise screen angle comes out of tx[1] directly
            let angle = tx[1].atan2(tx[0]);
            let font_size = tx[2].hypot(tx[3]);
            let ascent = font_size * run.ascent.unwrap_or(DEFAULT_ASCENT);

            let (left, top) = if angle == 0.0 {
                (tx[4], tx[5] - ascent)
            } else {
                (
                    tx[4] + ascent * angle.sin(),
                    tx[5] - ascent * angle.cos(),
                )
            };

            TextNode {
                text: run.text.clone(),
                left,
                top,
                font_size,
                angle: angle.to_degrees(),
                width: run.width * scale,
                opacity: 0.0,
            }
        })
        .collect();

    TextLayer { page, zoom, nodes }
}
