//! Page rendering infrastructure

pub mod cache;
pub mod engine;
pub mod loader;
pub mod pipeline;
pub mod request;
pub mod resident;
pub mod resources;
pub mod selection;
pub mod source;
pub mod state;
pub mod surface;
pub mod text_layer;
pub mod thumbnail;
pub mod viewport;
pub mod worker;
pub mod zoom;

pub use cache::{RetiredCache, RetiredKey, RetiredSurface};
pub use engine::{Bitmap, DocumentEngine, PageSize, PageSource, TextRun};
pub use loader::{DocumentHandle, fingerprint, load_document};
pub use pipeline::RenderPipeline;
pub use request::{CancelToken, RenderOutput, RenderRequest, RenderResponse, RequestId, TaskKind};
pub use resident::ResidentSet;
pub use resources::{ResourceHandle, ResourceTable};
pub use selection::{SelectionEvent, SelectionPoint, SelectionRect, TextSelection};
pub use source::{ByteFetcher, DefaultFetcher, DocumentSource};
pub use state::{Command, Effect, Strategy, ViewState};
pub use surface::{HighResSurface, PageSurface, SurfaceRegistry, ThumbnailSurface, Visibility};
pub use text_layer::{TextLayer, TextNode, build_text_layer};
pub use thumbnail::{THUMBNAIL_SCALE, THUMBNAIL_STAGGER, THUMBNAIL_WINDOW, ThumbnailSchedule};
pub use viewport::{FrameThrottle, PageLayout, RenderWindow, ViewportTracker};
pub use zoom::{Zoom, ZoomUpdate};

/// Render workers per document
pub const DEFAULT_WORKERS: usize = 2;
/// Provisional placeholder height before a thumbnail lands, in CSS pixels
pub const PLACEHOLDER_MIN_HEIGHT: f32 = 800.0;
/// Vertical gap around pages in the scroll column
pub const PAGE_GAP: f32 = 32.0;
/// Opacity transition duration hosts should animate with
pub const FADE_MS: u64 = 180;
