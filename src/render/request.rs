//! Render request and response types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::engine::{Bitmap, TextRun};
use crate::error::EngineFault;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Cooperative cancellation flag shared between the controller and a worker.
///
/// Cancelling never interrupts a paint call; it only marks the task so its
/// continuation is dropped.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; all clones observe it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// What a render task produces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Low-resolution placeholder, PNG-encoded on the worker
    Thumbnail,
    /// Full-quality render guarded by the page's render version
    HighRes { version: u64, zoom: u32 },
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    Render {
        id: RequestId,
        page: usize,
        /// Effective raster scale (zoom × device pixel ratio for high-res)
        scale: f32,
        kind: TaskKind,
        cancel: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Payload of a finished task
#[derive(Debug)]
pub enum RenderOutput {
    Thumbnail { bitmap: Bitmap, png: Vec<u8> },
    HighRes { bitmap: Bitmap, text_runs: Vec<TextRun> },
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    Rendered {
        id: RequestId,
        page: usize,
        kind: TaskKind,
        output: RenderOutput,
    },

    /// The task observed its cancel token
    Cancelled {
        id: RequestId,
        page: usize,
        kind: TaskKind,
    },

    Failed {
        id: RequestId,
        page: usize,
        kind: TaskKind,
        fault: EngineFault,
    },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Rendered { id, .. } | Self::Cancelled { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn page(&self) -> usize {
        match self {
            Self::Rendered { page, .. }
            | Self::Cancelled { page, .. }
            | Self::Failed { page, .. } => *page,
        }
    }
}
