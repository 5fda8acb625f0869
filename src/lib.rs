//! Viewport-driven incremental page renderer.
//!
//! Pages appear first as low-resolution thumbnails, then upgrade to
//! high-resolution rasters with a selectable text layer while they sit in the
//! render window around the page the reader is looking at. A small resident
//! set bounds how many high-res rasters stay materialized.

pub mod error;
pub mod highlight;
pub mod host;
pub mod panic_handler;
pub mod progress;
pub mod render;
pub mod settings;
pub mod viewer;

#[cfg(feature = "pdf")]
pub mod engines;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{EngineFault, LoadFailure, RenderFailure};
pub use highlight::{HighlightStore, MemoryHighlightStore};
pub use host::{ScrollBehavior, ScrollHost, WheelEvent};
pub use progress::{JsonProgressStore, MemoryProgressStore, ProgressStore};
pub use render::{DocumentEngine, DocumentSource, PageSource};
pub use settings::Settings;
pub use viewer::{DocumentInfo, Viewer, ViewerEvent, ViewerOptions};
