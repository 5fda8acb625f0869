//! The viewer: one controller owning `Document -> Surfaces -> RenderWindow`
//!
//! Everything here runs on the caller's thread. Render workers only ever
//! see requests and send back responses; all surface mutation, resident-set
//! bookkeeping and callback dispatch happens in `Viewer` methods.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::error::{EngineFault, LoadFailure, RenderFailure};
use crate::highlight::{HighlightStore, MemoryHighlightStore};
use crate::host::{ScrollBehavior, ScrollHost, WheelEvent};
use crate::progress::{MemoryProgressStore, ProgressStore};
use crate::render::selection::resolve_selection;
use crate::render::thumbnail::thumbnail_order;
use crate::render::{
    ByteFetcher, Command, DefaultFetcher, DocumentEngine, DocumentHandle, DocumentSource, Effect,
    FrameThrottle, PageLayout, PageSurface, RenderOutput, RenderPipeline, RenderResponse,
    RenderWindow, RequestId, ResidentSet, ResourceHandle, ResourceTable, RetiredCache, RetiredKey,
    RetiredSurface, SelectionEvent, Strategy, SurfaceRegistry, TaskKind, TextLayer, TextSelection,
    ThumbnailSchedule, ViewState, ViewportTracker, Zoom, build_text_layer, load_document,
};

/// `(page, total_pages)` callback
pub type PageCallback = Box<dyn FnMut(usize, usize)>;

/// Fraction of the viewport left above a page after navigation
const NAVIGATION_OFFSET: f32 = 0.1;
/// Poll interval while blocking on render responses
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Options for one `Viewer::load_document` call
pub struct ViewerOptions {
    /// Page to open at; defaults to the saved progress, then page 1
    pub initial_page: Option<usize>,
    pub on_page_change: Option<PageCallback>,
    pub on_progress_update: Option<PageCallback>,
    /// Resident set bound, clamped into 3..=6
    pub resident_set_bound: usize,
    pub eager_mode: bool,
    pub retain_high_res: bool,
    /// Zoom to apply on open; keeps the current zoom when unset
    pub zoom: Option<u32>,
    pub zoom_step: u32,
    pub load_timeout: Duration,
    pub thumbnail_scale: f32,
    pub thumbnail_window: usize,
    pub thumbnail_stagger: Duration,
    pub placeholder_min_height: f32,
    pub page_gap: f32,
    pub device_pixel_ratio: f32,
    pub workers: usize,
    /// Opacity transition hosts should animate reveals and fades with
    pub fade: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            initial_page: None,
            on_page_change: None,
            on_progress_update: None,
            resident_set_bound: crate::render::resident::DEFAULT_BOUND,
            eager_mode: false,
            retain_high_res: false,
            zoom: None,
            zoom_step: Zoom::STEP,
            load_timeout: Duration::from_secs(30),
            thumbnail_scale: crate::render::THUMBNAIL_SCALE,
            thumbnail_window: crate::render::THUMBNAIL_WINDOW,
            thumbnail_stagger: crate::render::THUMBNAIL_STAGGER,
            placeholder_min_height: crate::render::PLACEHOLDER_MIN_HEIGHT,
            page_gap: crate::render::PAGE_GAP,
            device_pixel_ratio: 1.0,
            workers: crate::render::DEFAULT_WORKERS,
            fade: Duration::from_millis(crate::render::FADE_MS),
        }
    }
}

impl ViewerOptions {
    #[must_use]
    pub fn initial_page(mut self, page: usize) -> Self {
        self.initial_page = Some(page);
        self
    }

    #[must_use]
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager_mode = eager;
        self
    }

    #[must_use]
    pub fn resident_set_bound(mut self, bound: usize) -> Self {
        self.resident_set_bound = bound;
        self
    }

    #[must_use]
    pub fn retain_high_res(mut self, retain: bool) -> Self {
        self.retain_high_res = retain;
        self
    }

    #[must_use]
    pub fn on_page_change(mut self, f: impl FnMut(usize, usize) + 'static) -> Self {
        self.on_page_change = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_progress_update(mut self, f: impl FnMut(usize, usize) + 'static) -> Self {
        self.on_progress_update = Some(Box::new(f));
        self
    }
}

/// Result of a successful load
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub fingerprint: String,
    pub page_count: usize,
    pub initial_page: usize,
}

/// Observable transitions, drained by the host
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    Loaded { fingerprint: String, page_count: usize },
    ThumbnailReady { page: usize, handle: ResourceHandle },
    HighResShown { page: usize, zoom: u32 },
    /// Restored from the retired cache without a paint
    Restored { page: usize, zoom: u32 },
    Evicted { page: usize },
    RolledBack { page: usize },
    RenderFailed(RenderFailure),
    PageChanged { page: usize, total: usize },
    Closed,
}

/// What a high-res request turned into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HighResStart {
    Memoized,
    Restored,
    Dispatched(RequestId),
    Skipped,
}

struct SessionConfig {
    thumbnail_scale: f32,
    device_pixel_ratio: f32,
    page_gap: f32,
    wait_ceiling: Duration,
    fade: Duration,
}

/// Everything that belongs to the open document
struct Session {
    doc: DocumentHandle,
    surfaces: SurfaceRegistry,
    pipeline: RenderPipeline,
    resident: ResidentSet,
    retired: RetiredCache,
    thumbnails: ThumbnailSchedule,
    window: RenderWindow,
    config: SessionConfig,
    on_page_change: Option<PageCallback>,
    on_progress_update: Option<PageCallback>,
}

impl Session {
    fn layout(&self, zoom: u32) -> PageLayout {
        let heights: Vec<f32> = self.surfaces.iter().map(|s| s.display_height(zoom)).collect();
        PageLayout::from_heights(&heights, self.config.page_gap)
    }

    fn dispatch_thumbnail(&mut self, page: usize) -> Option<RequestId> {
        let surface = self.surfaces.get(page)?;
        if surface.thumbnail.is_loaded() || self.pipeline.is_in_flight(page, true) {
            return None;
        }
        let (id, _) = self
            .pipeline
            .dispatch(page, self.config.thumbnail_scale, TaskKind::Thumbnail);
        Some(id)
    }

    /// Mark `page` most recent, releasing whatever falls out of the set
    fn touch(&mut self, page: usize, events: &mut Vec<ViewerEvent>) {
        for evicted in self.resident.touch(page) {
            if let Some(surface) = self.surfaces.get_mut(evicted) {
                surface.roll_back();
                debug!("evicted page {evicted} from resident set");
                events.push(ViewerEvent::Evicted { page: evicted });
            }
        }
        self.trim_retired();
    }

    fn render_high_res(&mut self, page: usize, zoom: u32, events: &mut Vec<ViewerEvent>) -> HighResStart {
        let Some(surface) = self.surfaces.get_mut(page) else {
            return HighResStart::Skipped;
        };

        if surface.is_current_at(zoom) {
            self.touch(page, events);
            return HighResStart::Memoized;
        }

        let key = RetiredKey { page, zoom };
        if let Some(retired) = self.retired.take(&key) {
            // A newer render may still be queued for another zoom
            self.pipeline.cancel_high_res(page);
            surface.render_version += 1;
            surface.high_res.present(retired.bitmap, retired.css_size);
            surface.thumbnail.fade_out();
            surface.text_layer = retired.text_layer;
            surface.last_rendered_scale = Some(zoom);
            surface.last_error = None;
            debug!("restored page {page} at {zoom}% from retired cache");
            events.push(ViewerEvent::Restored { page, zoom });
            self.touch(page, events);
            return HighResStart::Restored;
        }

        self.pipeline.cancel_high_res(page);
        surface.render_version += 1;
        let version = surface.render_version;

        let dpr = self.config.device_pixel_ratio;
        let (w, h) = surface.size.device_pixels(zoom, dpr);
        surface.high_res.prepare(w, h, surface.size.scaled(zoom));

        let scale = zoom as f32 / 100.0 * dpr;
        let (id, _) = self
            .pipeline
            .dispatch(page, scale, TaskKind::HighRes { version, zoom });
        HighResStart::Dispatched(id)
    }

    fn render_window(&mut self, zoom: u32, events: &mut Vec<ViewerEvent>) {
        let pages = self.window.pages().to_vec();
        for page in pages {
            self.render_high_res(page, zoom, events);
        }
    }

    /// Return every page outside the window to its thumbnail
    fn roll_back_outside_window(&mut self, events: &mut Vec<ViewerEvent>) {
        let outside: Vec<usize> = self
            .surfaces
            .iter()
            .map(|s| s.page)
            .filter(|&p| !self.window.contains(p))
            .collect();

        for page in outside {
            if self.pipeline.cancel_high_res(page) > 0 {
                if let Some(surface) = self.surfaces.get_mut(page) {
                    surface.render_version += 1;
                }
            }

            let Some(surface) = self.surfaces.get_mut(page) else {
                continue;
            };
            if !surface.high_res.is_materialized() {
                continue;
            }

            // A raster mid re-render is background fill at the new size
            let shown_at = surface
                .last_rendered_scale
                .filter(|_| surface.high_res.is_visible() && surface.high_res.is_painted());
            let css_size = (surface.high_res.css_width, surface.high_res.css_height);
            let text_layer = surface.text_layer.take();
            let bitmap = surface.roll_back();

            if let Some(zoom) = shown_at {
                self.retired.insert(
                    RetiredKey { page, zoom },
                    RetiredSurface {
                        bitmap,
                        css_size,
                        text_layer,
                    },
                );
            }
            self.resident.remove(page);
            trace!("rolled back page {page}");
            events.push(ViewerEvent::RolledBack { page });
        }
        self.trim_retired();
    }

    /// Retired rasters share the resident bound with the live ones
    fn trim_retired(&mut self) {
        if self.resident.is_eviction_disabled() {
            return;
        }
        let room = self.resident.bound().saturating_sub(self.resident.len());
        for dropped in self.retired.shrink_to(room) {
            trace!("dropped retired raster of page {} at {}%", dropped.page, dropped.zoom);
        }
    }

    fn handle_response(
        &mut self,
        response: RenderResponse,
        resources: &mut ResourceTable,
        events: &mut Vec<ViewerEvent>,
    ) {
        match response {
            RenderResponse::Cancelled { page, kind, .. } => {
                debug!("discarding cancelled {kind:?} for page {page}");
            }

            RenderResponse::Failed {
                page,
                kind: TaskKind::Thumbnail,
                fault,
                ..
            } => {
                warn!("thumbnail failed for page {page}: {fault}");
            }

            RenderResponse::Failed {
                page,
                kind: TaskKind::HighRes { version, .. },
                fault,
                ..
            } => {
                let Some(surface) = self.surfaces.get_mut(page) else {
                    return;
                };
                if surface.render_version != version {
                    debug!("discarding stale failure for page {page} (v{version})");
                    return;
                }
                let failure = RenderFailure { page, fault };
                error!("{failure}");
                // Drop the background-filled store, keep the thumbnail
                surface.roll_back();
                surface.last_error = Some(failure.clone());
                self.resident.remove(page);
                events.push(ViewerEvent::RenderFailed(failure));
            }

            RenderResponse::Rendered {
                page,
                output: RenderOutput::Thumbnail { bitmap, png },
                ..
            } => {
                let Some(surface) = self.surfaces.get_mut(page) else {
                    return;
                };
                let handle = resources.register_png(png);
                if let Some(old) = surface.thumbnail.assign(handle, bitmap.width, bitmap.height) {
                    resources.revoke(old);
                }
                trace!("thumbnail ready for page {page}");
                events.push(ViewerEvent::ThumbnailReady { page, handle });
            }

            RenderResponse::Rendered {
                page,
                kind: TaskKind::HighRes { version, zoom },
                output: RenderOutput::HighRes { bitmap, text_runs },
                ..
            } => {
                let Some(surface) = self.surfaces.get_mut(page) else {
                    return;
                };
                if surface.render_version != version {
                    debug!(
                        "discarding stale render for page {page} (v{version}, current v{})",
                        surface.render_version
                    );
                    return;
                }

                surface.high_res.present(bitmap, surface.size.scaled(zoom));
                surface.thumbnail.fade_out();
                surface.last_rendered_scale = Some(zoom);
                surface.last_error = None;
                surface.text_layer = Some(build_text_layer(page, surface.size, zoom, &text_runs));
                self.retired.invalidate_page(page);

                events.push(ViewerEvent::HighResShown { page, zoom });
                self.touch(page, events);
            }

            RenderResponse::Rendered { page, kind, .. } => {
                warn!("page {page}: output does not match task {kind:?}");
            }
        }
    }

    /// Block until the response for `id` has been applied
    fn wait_for(&mut self, id: RequestId, resources: &mut ResourceTable, events: &mut Vec<ViewerEvent>) {
        let deadline = Instant::now() + self.config.wait_ceiling;
        while self.pipeline.is_pending(id) {
            if Instant::now() >= deadline {
                warn!("gave up waiting for render {id:?}");
                return;
            }
            if let Some(response) = self.pipeline.recv_timeout(WAIT_SLICE) {
                self.handle_response(response, resources, events);
            }
        }
    }

    fn shutdown(&mut self, resources: &mut ResourceTable) {
        self.pipeline.shutdown();
        self.surfaces.release_all(resources);
        self.resident.clear();
        self.retired.invalidate_all();
        self.thumbnails.clear();
    }
}

fn session_for(session: &mut Option<Session>, page: usize) -> Result<&mut Session, RenderFailure> {
    match session.as_mut() {
        Some(session) if (1..=session.doc.page_count).contains(&page) => Ok(session),
        _ => Err(RenderFailure {
            page,
            fault: EngineFault::page(page, "no such page"),
        }),
    }
}

/// Incremental, viewport-driven page viewer mounted in a scroll host
pub struct Viewer<H: ScrollHost> {
    host: H,
    engine: Arc<dyn DocumentEngine>,
    fetcher: Arc<dyn ByteFetcher>,
    progress: Box<dyn ProgressStore>,
    highlights: Box<dyn HighlightStore>,
    resources: ResourceTable,
    state: ViewState,
    tracker: ViewportTracker,
    throttle: FrameThrottle,
    session: Option<Session>,
    events: Vec<ViewerEvent>,
}

impl<H: ScrollHost> Viewer<H> {
    #[must_use]
    pub fn new(host: H, engine: Arc<dyn DocumentEngine>) -> Self {
        Self {
            host,
            engine,
            fetcher: Arc::new(DefaultFetcher::default()),
            progress: Box::new(MemoryProgressStore::new()),
            highlights: Box::new(MemoryHighlightStore::new()),
            resources: ResourceTable::new(),
            state: ViewState::default(),
            tracker: ViewportTracker::new(),
            throttle: FrameThrottle::default(),
            session: None,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_progress_store(mut self, store: Box<dyn ProgressStore>) -> Self {
        self.progress = store;
        self
    }

    #[must_use]
    pub fn with_highlight_store(mut self, store: Box<dyn HighlightStore>) -> Self {
        self.highlights = store;
        self
    }

    /// Open a document, replacing the current one.
    ///
    /// The previous document is torn down first, whether or not the new one
    /// opens. On success the initial page has its thumbnail and high-res
    /// surface (every page, in eager mode) and the host has been scrolled to it.
    pub fn load_document(
        &mut self,
        source: impl Into<DocumentSource>,
        options: ViewerOptions,
    ) -> Result<DocumentInfo, LoadFailure> {
        self.close();

        let doc = load_document(
            source.into(),
            Arc::clone(&self.engine),
            Arc::clone(&self.fetcher),
            options.load_timeout,
        )?;
        let page_count = doc.page_count;

        let mut surfaces = SurfaceRegistry::new();
        surfaces.prepare_surfaces(&doc.page_sizes, options.placeholder_min_height, &mut self.resources);

        let strategy = Strategy {
            eager: options.eager_mode,
            retain_high_res: options.retain_high_res,
        };
        let _ = self.state.apply(Command::Open {
            page_count,
            strategy,
        });
        self.state.zoom_step = options.zoom_step;
        if let Some(zoom) = options.zoom {
            self.state.zoom = Zoom::new(i64::from(zoom));
        }

        let initial_page = options
            .initial_page
            .or_else(|| self.progress.get(&doc.fingerprint))
            .unwrap_or(1)
            .clamp(1, page_count);
        self.tracker.reset(initial_page);
        self.throttle.reset();

        let pipeline = RenderPipeline::new(
            Arc::clone(&self.engine),
            Arc::clone(&doc.bytes),
            options.workers,
        );
        let info = DocumentInfo {
            fingerprint: doc.fingerprint.clone(),
            page_count,
            initial_page,
        };

        self.session = Some(Session {
            doc,
            surfaces,
            pipeline,
            resident: ResidentSet::new(options.resident_set_bound, strategy.keeps_out_of_window()),
            retired: RetiredCache::new(options.resident_set_bound),
            thumbnails: ThumbnailSchedule::default(),
            window: self.state.window(initial_page),
            config: SessionConfig {
                thumbnail_scale: options.thumbnail_scale,
                device_pixel_ratio: options.device_pixel_ratio,
                page_gap: options.page_gap,
                wait_ceiling: options.load_timeout,
                fade: options.fade,
            },
            on_page_change: options.on_page_change,
            on_progress_update: options.on_progress_update,
        });
        self.events.push(ViewerEvent::Loaded {
            fingerprint: info.fingerprint.clone(),
            page_count,
        });
        info!(
            "loaded {} ({page_count} pages) at page {initial_page}, zoom {}%{}",
            info.fingerprint,
            self.zoom(),
            if strategy.eager { ", eager" } else { "" }
        );

        if strategy.eager {
            self.materialize_all();
        } else {
            self.materialize_initial(initial_page, options.thumbnail_window, options.thumbnail_stagger);
        }

        self.navigate_to_page(initial_page);
        let zoom = self.zoom();
        if let Some(session) = self.session.as_mut() {
            session.render_window(zoom, &mut self.events);
        }
        Ok(info)
    }

    /// Eager mode: paint every page once, ascending, each awaited
    fn materialize_all(&mut self) {
        let zoom = self.zoom();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for page in 1..=session.doc.page_count {
            if let HighResStart::Dispatched(id) = session.render_high_res(page, zoom, &mut self.events) {
                session.wait_for(id, &mut self.resources, &mut self.events);
            }
            let failed = session
                .surfaces
                .get(page)
                .is_some_and(|s| s.last_error.is_some());
            if failed {
                session.dispatch_thumbnail(page);
            }
        }
    }

    /// Progressive mode: initial thumbnail and high-res awaited, the rest of
    /// the thumbnails scheduled
    fn materialize_initial(&mut self, initial: usize, window: usize, stagger: Duration) {
        let zoom = self.zoom();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let order = thumbnail_order(initial, session.doc.page_count, window);
        session.thumbnails = ThumbnailSchedule::new(&order, Instant::now(), stagger);
        session.thumbnails.remove(initial);

        if let Some(id) = session.dispatch_thumbnail(initial) {
            session.wait_for(id, &mut self.resources, &mut self.events);
        }
        if let HighResStart::Dispatched(id) = session.render_high_res(initial, zoom, &mut self.events) {
            session.wait_for(id, &mut self.resources, &mut self.events);
        }
    }

    /// Tear down the open document: cancel all tasks, release all surfaces
    /// and handles. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("closing {}", session.doc.fingerprint);
            session.shutdown(&mut self.resources);
            self.events.push(ViewerEvent::Closed);
        }
        let _ = self.state.apply(Command::Close);
        self.tracker.reset(0);
        self.throttle.reset();
    }

    /// Scroll so page `n` is in view. Out-of-range pages are ignored.
    pub fn navigate_to_page(&mut self, page: usize) {
        let effects = self.state.apply(Command::Navigate(page));
        self.execute_effects(effects);
    }

    /// Set the zoom percentage, clamped into `[50, 200]`
    pub fn set_zoom(&mut self, percent: i64) {
        let effects = self.state.apply(Command::SetZoom(percent));
        self.execute_effects(effects);
    }

    /// Set the zoom from the current value
    pub fn set_zoom_with(&mut self, f: impl FnOnce(u32) -> i64) {
        let next = f(self.zoom());
        self.set_zoom(next);
    }

    pub fn zoom_in(&mut self) {
        let step = i64::from(self.state.zoom_step);
        let effects = self.state.apply(Command::StepZoom(step));
        self.execute_effects(effects);
    }

    pub fn zoom_out(&mut self) {
        let step = i64::from(self.state.zoom_step);
        let effects = self.state.apply(Command::StepZoom(-step));
        self.execute_effects(effects);
    }

    pub fn reset_zoom(&mut self) {
        let effects = self.state.apply(Command::ResetZoom);
        self.execute_effects(effects);
    }

    /// Feed a wheel tick. Returns true when the viewer consumed it as a
    /// zoom gesture; otherwise the host should scroll as usual.
    pub fn on_wheel(&mut self, event: WheelEvent) -> bool {
        let consumed = event.modifier && self.session.is_some();
        let effects = self.state.apply(Command::Wheel {
            delta_y: event.delta_y,
            modifier: event.modifier,
        });
        self.execute_effects(effects);
        consumed
    }

    /// The host scrolled
    pub fn on_scroll(&mut self) {
        self.throttle.request();
    }

    /// The host resized
    pub fn on_resize(&mut self) {
        self.throttle.request();
    }

    /// Display refresh: run the one pending viewport computation, if any
    pub fn on_frame(&mut self) {
        if self.throttle.take() {
            self.update_viewport();
        }
    }

    /// One turn of the event loop: a frame, then completed renders, then any
    /// thumbnails whose stagger slot has come up.
    pub fn tick(&mut self) {
        self.on_frame();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        for response in session.pipeline.poll_responses() {
            session.handle_response(response, &mut self.resources, &mut self.events);
        }
        for page in session.thumbnails.due(Instant::now()) {
            session.dispatch_thumbnail(page);
        }
    }

    /// Run the loop until no frame, render or thumbnail is outstanding.
    /// Returns false if `ceiling` passed first.
    pub fn settle(&mut self, ceiling: Duration) -> bool {
        let deadline = Instant::now() + ceiling;
        loop {
            self.tick();

            let Some(session) = self.session.as_mut() else {
                return true;
            };
            let idle = session.pipeline.is_idle() && session.thumbnails.is_empty();
            if idle && !self.throttle.is_pending() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    "viewer did not settle: {} render(s), {} thumbnail(s) outstanding",
                    session.pipeline.pending_count(),
                    session.thumbnails.len()
                );
                return false;
            }

            if !session.pipeline.is_idle() {
                if let Some(response) = session.pipeline.recv_timeout(WAIT_SLICE) {
                    session.handle_response(response, &mut self.resources, &mut self.events);
                }
            } else if let Some(due) = session.thumbnails.next_due() {
                std::thread::sleep(due.saturating_duration_since(Instant::now()).min(WAIT_SLICE));
            }
        }
    }

    /// Render page `p` at the current zoom and wait for the result
    pub fn render_high_res(&mut self, page: usize) -> Result<(), RenderFailure> {
        let zoom = self.zoom();
        let session = session_for(&mut self.session, page)?;
        if let HighResStart::Dispatched(id) = session.render_high_res(page, zoom, &mut self.events) {
            session.wait_for(id, &mut self.resources, &mut self.events);
        }
        Self::page_result(session, page)
    }

    /// Render page `p`'s thumbnail and wait for it
    pub fn render_thumbnail(&mut self, page: usize) -> Result<(), RenderFailure> {
        let session = session_for(&mut self.session, page)?;
        session.thumbnails.remove(page);
        // An explicit request replaces any thumbnail already shown
        let (id, _) = session
            .pipeline
            .dispatch(page, session.config.thumbnail_scale, TaskKind::Thumbnail);
        session.wait_for(id, &mut self.resources, &mut self.events);
        match session.surfaces.get(page) {
            Some(s) if s.thumbnail.is_loaded() => Ok(()),
            _ => Err(RenderFailure {
                page,
                fault: EngineFault::page(page, "thumbnail unavailable"),
            }),
        }
    }

    fn page_result(session: &Session, page: usize) -> Result<(), RenderFailure> {
        match session.surfaces.get(page).and_then(|s| s.last_error.clone()) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Resolve a selection against the current text layers and hand it to
    /// the highlight store
    pub fn raise_selection(&mut self, selection: &TextSelection) -> Option<SelectionEvent> {
        let session = self.session.as_ref()?;
        let event = resolve_selection(selection, |page| {
            session.surfaces.get(page).and_then(|s| s.text_layer.as_ref())
        })?;
        self.highlights.on_selection(&session.doc.fingerprint, &event);
        Some(event)
    }

    fn update_viewport(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let layout = session.layout(self.zoom());
        let changed = self.tracker.evaluate(
            self.host.scroll_top(),
            self.host.viewport_height(),
            &layout,
        );
        if let Some(page) = changed {
            debug!("current page -> {page}");
            let effects = self.state.apply(Command::PageChanged(page));
            self.execute_effects(effects);
        }
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        let zoom = self.zoom();
        let current = self.tracker.current_page();

        for effect in effects {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            match effect {
                Effect::PersistProgress(page) => {
                    self.progress.set(&session.doc.fingerprint, page);
                }

                Effect::NotifyPageChange(page) => {
                    let total = session.doc.page_count;
                    if let Some(cb) = session.on_page_change.as_mut() {
                        cb(page, total);
                    }
                    if let Some(cb) = session.on_progress_update.as_mut() {
                        cb(page, total);
                    }
                    self.events.push(ViewerEvent::PageChanged { page, total });
                }

                Effect::RollbackOutsideWindow => {
                    session.window = self.state.window(current);
                    session.roll_back_outside_window(&mut self.events);
                }

                Effect::RenderWindow => {
                    session.window = self.state.window(current);
                    session.render_window(zoom, &mut self.events);
                }

                Effect::ScrollToPage(page) => {
                    let layout = session.layout(zoom);
                    if let Some(top) = layout.top(page) {
                        let offset = NAVIGATION_OFFSET * self.host.viewport_height();
                        self.host.scroll_to((top - offset).max(0.0), ScrollBehavior::Smooth);
                        self.throttle.request();
                    }
                }
            }
        }
    }

    /// Current page as decided by the viewport tracker
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.tracker.current_page()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.doc.page_count)
    }

    #[must_use]
    pub fn zoom(&self) -> u32 {
        self.state.zoom.percent()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.doc.fingerprint.as_str())
    }

    #[must_use]
    pub fn surface(&self, page: usize) -> Option<&PageSurface> {
        self.session.as_ref()?.surfaces.get(page)
    }

    #[must_use]
    pub fn text_layer(&self, page: usize) -> Option<&TextLayer> {
        self.surface(page)?.text_layer.as_ref()
    }

    /// Resident pages, ascending
    #[must_use]
    pub fn resident_pages(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map(|s| s.resident.sorted())
            .unwrap_or_default()
    }

    /// Pages whose high-res raster is currently shown, ascending
    #[must_use]
    pub fn visible_pages(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map(|s| s.surfaces.visible_high_res())
            .unwrap_or_default()
    }

    /// Pages holding a rolled-back raster, ascending
    #[must_use]
    pub fn retired_pages(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map(|s| s.retired.pages())
            .unwrap_or_default()
    }

    /// Zoom of the rolled-back raster held for `page`, if any
    #[must_use]
    pub fn retired_zoom(&self, page: usize) -> Option<u32> {
        self.session.as_ref()?.retired.zoom_of(page)
    }

    #[must_use]
    pub fn render_window(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map(|s| s.window.pages().to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn layout(&self) -> Option<PageLayout> {
        Some(self.session.as_ref()?.layout(self.zoom()))
    }

    /// Duration of reveal and fade transitions for the open document
    #[must_use]
    pub fn fade_duration(&self) -> Duration {
        self.session
            .as_ref()
            .map_or(Duration::from_millis(crate::render::FADE_MS), |s| s.config.fade)
    }

    /// Renders dispatched and not yet answered
    #[must_use]
    pub fn pending_renders(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.pipeline.pending_count())
    }

    /// Viewport computations performed so far
    #[must_use]
    pub fn viewport_evaluations(&self) -> u64 {
        self.tracker.evaluations()
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    #[must_use]
    pub fn progress(&self) -> &dyn ProgressStore {
        self.progress.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }
}

impl<H: ScrollHost> Drop for Viewer<H> {
    fn drop(&mut self) {
        self.close();
    }
}
