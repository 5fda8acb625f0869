//! MuPDF-backed PDF engine

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, TextPageFlags};

use crate::error::EngineFault;
use crate::render::{Bitmap, CancelToken, DocumentEngine, PageSize, PageSource, TextRun};

const PDF_MAGIC: &str = "application/pdf";

fn fault(e: mupdf::error::Error) -> EngineFault {
    EngineFault::generic(e.to_string())
}

/// Opens PDF bytes with MuPDF. Each worker gets its own `Document`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfEngine;

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for MupdfEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageSource>, EngineFault> {
        let doc = Document::from_bytes(bytes, PDF_MAGIC).map_err(|e| EngineFault::Open {
            detail: e.to_string(),
        })?;
        let page_count = doc.page_count().map_err(|e| EngineFault::Open {
            detail: e.to_string(),
        })?;
        Ok(Box::new(MupdfDocument {
            doc,
            page_count: page_count.max(0) as usize,
        }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load(&self, page: usize) -> Result<Page, EngineFault> {
        if page == 0 || page > self.page_count {
            return Err(EngineFault::page(page, "out of range"));
        }
        self.doc
            .load_page(page as i32 - 1)
            .map_err(|e| EngineFault::page(page, e.to_string()))
    }
}

impl PageSource for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, EngineFault> {
        let bounds = self.load(page)?.bounds().map_err(fault)?;
        Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render(&self, page: usize, scale: f32, cancel: &CancelToken) -> Result<Bitmap, EngineFault> {
        let loaded = self.load(page)?;
        if cancel.is_cancelled() {
            return Err(EngineFault::Cancelled);
        }

        let rgb = Colorspace::device_rgb();
        let pixmap = loaded
            .to_pixmap(&Matrix::new_scale(scale, scale), &rgb, false, false)
            .map_err(|e| EngineFault::page(page, e.to_string()))?;
        if cancel.is_cancelled() {
            return Err(EngineFault::Cancelled);
        }

        Ok(Bitmap {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels: pixmap_to_rgb(&pixmap)?,
        })
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, EngineFault> {
        let loaded = self.load(page)?;
        let bounds = loaded.bounds().map_err(fault)?;
        let page_height = bounds.y1 - bounds.y0;
        let text_page = loaded.to_text_page(TextPageFlags::empty()).map_err(fault)?;

        let mut runs = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                if text.trim().is_empty() {
                    continue;
                }
                let bbox = line.bounds();
                let font_size = (bbox.y1 - bbox.y0).max(1.0);
                // MuPDF reports y down from the top edge; runs are y up
                let baseline = line.chars().next().map_or(bbox.y1, |ch| ch.origin().y);
                let mut run = TextRun::horizontal(
                    text,
                    bbox.x0 - bounds.x0,
                    page_height - (baseline - bounds.y0),
                    font_size,
                    bbox.x1 - bbox.x0,
                );
                run.ascent = Some(((baseline - bbox.y0) / font_size).clamp(0.0, 1.0));
                runs.push(run);
            }
        }
        Ok(runs)
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, EngineFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(EngineFault::generic(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(EngineFault::generic("pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
