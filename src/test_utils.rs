//! Scripted collaborators for unit and integration tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::EngineFault;
use crate::highlight::HighlightStore;
use crate::host::{ScrollBehavior, ScrollHost};
use crate::progress::ProgressStore;
use crate::render::{Bitmap, CancelToken, DocumentEngine, PageSize, PageSource, SelectionEvent, TextRun};

/// `(page, scale)` for every paint that started
pub type RenderLog = Arc<Mutex<Vec<(usize, f32)>>>;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory document engine with scripted timing and failures
#[derive(Clone)]
pub struct FakeEngine {
    page_count: usize,
    page_size: PageSize,
    open_delay: Duration,
    render_delay: Duration,
    page_delays: HashMap<usize, Duration>,
    failing_pages: HashSet<usize>,
    log: RenderLog,
}

impl FakeEngine {
    /// Bytes the engine refuses to open
    pub const MALFORMED: &'static [u8] = b"%MALFORMED%";

    /// Default page: 600 x 800 points
    pub const PAGE_SIZE: PageSize = PageSize::new(600.0, 800.0);

    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            page_size: Self::PAGE_SIZE,
            open_delay: Duration::ZERO,
            render_delay: Duration::ZERO,
            page_delays: HashMap::new(),
            failing_pages: HashSet::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Every paint takes at least `delay`, polling its cancel token
    #[must_use]
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    #[must_use]
    pub fn with_page_delay(mut self, page: usize, delay: Duration) -> Self {
        self.page_delays.insert(page, delay);
        self
    }

    /// High-res paints of `page` fail; its thumbnail still paints
    #[must_use]
    pub fn with_failing_page(mut self, page: usize) -> Self {
        self.failing_pages.insert(page);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    /// Shared log of every paint that started
    #[must_use]
    pub fn render_log(&self) -> RenderLog {
        Arc::clone(&self.log)
    }
}

impl DocumentEngine for FakeEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PageSource>, EngineFault> {
        if bytes == Self::MALFORMED {
            return Err(EngineFault::Open {
                detail: "no header".into(),
            });
        }
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        Ok(Box::new(FakeDocument {
            engine: self.clone(),
        }))
    }
}

struct FakeDocument {
    engine: FakeEngine,
}

impl FakeDocument {
    fn check_page(&self, page: usize) -> Result<(), EngineFault> {
        if (1..=self.engine.page_count).contains(&page) {
            Ok(())
        } else {
            Err(EngineFault::page(page, "out of range"))
        }
    }
}

impl PageSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.engine.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, EngineFault> {
        self.check_page(page)?;
        Ok(self.engine.page_size)
    }

    fn render(&self, page: usize, scale: f32, cancel: &CancelToken) -> Result<Bitmap, EngineFault> {
        self.check_page(page)?;
        lock(&self.engine.log).push((page, scale));

        let delay = self
            .engine
            .page_delays
            .get(&page)
            .copied()
            .unwrap_or(self.engine.render_delay);
        let started = Instant::now();
        while started.elapsed() < delay {
            if cancel.is_cancelled() {
                return Err(EngineFault::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        if scale > crate::render::THUMBNAIL_SCALE && self.engine.failing_pages.contains(&page) {
            return Err(EngineFault::page(page, "scripted failure"));
        }

        let size = self.engine.page_size;
        let shade = (page % 200) as u8;
        Ok(Bitmap::filled(
            (size.width * scale).floor() as u32,
            (size.height * scale).floor() as u32,
            [shade, shade, shade],
        ))
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, EngineFault> {
        self.check_page(page)?;
        let height = self.engine.page_size.height;
        Ok(vec![TextRun::horizontal(
            format!("page {page}"),
            72.0,
            height - 72.0,
            12.0,
            60.0,
        )])
    }
}

/// Scroll container that lands every scroll immediately
#[derive(Debug, Default)]
pub struct FakeHost {
    pub viewport_height: f32,
    pub scroll_top: f32,
    /// Every programmatic scroll, in order
    pub scrolls: Vec<(f32, ScrollBehavior)>,
}

impl FakeHost {
    #[must_use]
    pub fn new(viewport_height: f32) -> Self {
        Self {
            viewport_height,
            ..Self::default()
        }
    }

    /// Simulate the user dragging the scrollbar
    pub fn set_scroll_top(&mut self, top: f32) {
        self.scroll_top = top.max(0.0);
    }
}

impl ScrollHost for FakeHost {
    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior) {
        self.scrolls.push((top, behavior));
        self.scroll_top = top;
    }
}

/// Progress store whose contents the test keeps a handle to
#[derive(Clone, Debug, Default)]
pub struct RecordingProgressStore {
    pub saved: Arc<Mutex<HashMap<String, usize>>>,
    pub writes: Arc<Mutex<Vec<(String, usize)>>>,
}

impl RecordingProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_saved(fingerprint: &str, page: usize) -> Self {
        let store = Self::default();
        lock(&store.saved).insert(fingerprint.to_string(), page);
        store
    }

    #[must_use]
    pub fn writes(&self) -> Vec<(String, usize)> {
        lock(&self.writes).clone()
    }
}

impl ProgressStore for RecordingProgressStore {
    fn get(&self, fingerprint: &str) -> Option<usize> {
        lock(&self.saved).get(fingerprint).copied()
    }

    fn set(&mut self, fingerprint: &str, page: usize) {
        lock(&self.saved).insert(fingerprint.to_string(), page);
        lock(&self.writes).push((fingerprint.to_string(), page));
    }
}

/// Highlight store that keeps every event for inspection
#[derive(Clone, Debug, Default)]
pub struct RecordingHighlightStore {
    pub events: Arc<Mutex<Vec<(String, SelectionEvent)>>>,
}

impl RecordingHighlightStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<(String, SelectionEvent)> {
        lock(&self.events).clone()
    }
}

impl HighlightStore for RecordingHighlightStore {
    fn on_selection(&mut self, fingerprint: &str, event: &SelectionEvent) {
        lock(&self.events).push((fingerprint.to_string(), event.clone()));
    }
}

/// Collects `(page, total)` callback invocations
#[derive(Clone, Debug, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl CallRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends to this recorder
    pub fn callback(&self) -> impl FnMut(usize, usize) + 'static {
        let calls = Arc::clone(&self.calls);
        move |page, total| lock(&calls).push((page, total))
    }

    #[must_use]
    pub fn calls(&self) -> Vec<(usize, usize)> {
        lock(&self.calls).clone()
    }
}
