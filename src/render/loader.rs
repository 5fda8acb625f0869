//! Document loading with a wall-clock ceiling

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use log::{debug, info, warn};

use super::engine::{DocumentEngine, PageSize};
use super::source::{ByteFetcher, DocumentSource};
use crate::error::LoadFailure;

/// An opened document. Replaced wholesale on the next load.
#[derive(Clone)]
pub struct DocumentHandle {
    /// MD5 of the document bytes, stable across reloads
    pub fingerprint: String,
    pub page_count: usize,
    /// Size of every page in points, index 0 is page 1
    pub page_sizes: Vec<PageSize>,
    /// Shared with render workers, each opens its own page source
    pub bytes: Arc<[u8]>,
}

impl DocumentHandle {
    /// Size of a 1-based page
    #[must_use]
    pub fn page_size(&self, page: usize) -> Option<PageSize> {
        page.checked_sub(1).and_then(|i| self.page_sizes.get(i)).copied()
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("fingerprint", &self.fingerprint)
            .field("page_count", &self.page_count)
            .field("bytes", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Content fingerprint used as the progress key
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Resolve the source, open it and measure every page.
///
/// The work runs on a dedicated thread; if it does not answer within
/// `timeout` the load fails with `LoadFailure::Timeout` and whatever the
/// thread eventually produces is dropped.
pub fn load_document(
    source: DocumentSource,
    engine: Arc<dyn DocumentEngine>,
    fetcher: Arc<dyn ByteFetcher>,
    timeout: Duration,
) -> Result<DocumentHandle, LoadFailure> {
    let started = Instant::now();
    let (tx, rx) = flume::bounded(1);

    std::thread::Builder::new()
        .name("pagesurf-loader".into())
        .spawn(move || {
            let result = open_document(source, engine.as_ref(), fetcher.as_ref());
            if tx.send(result).is_err() {
                debug!("load finished after the caller gave up");
            }
        })
        .map_err(|e| LoadFailure::source(format!("cannot spawn loader: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(handle)) => {
            info!(
                "opened document {} ({} pages) in {:?}",
                handle.fingerprint,
                handle.page_count,
                started.elapsed()
            );
            Ok(handle)
        }
        Ok(Err(e)) => {
            warn!("document load failed: {e}");
            Err(e)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("document load timed out after {timeout:?}");
            Err(LoadFailure::Timeout { after: timeout })
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(LoadFailure::source("loader thread exited without a result"))
        }
    }
}

fn open_document(
    source: DocumentSource,
    engine: &dyn DocumentEngine,
    fetcher: &dyn ByteFetcher,
) -> Result<DocumentHandle, LoadFailure> {
    let bytes = source.into_bytes(fetcher)?;
    let doc = engine.open(&bytes)?;

    let page_count = doc.page_count();
    if page_count == 0 {
        return Err(LoadFailure::Empty);
    }

    let page_sizes = (1..=page_count)
        .map(|page| doc.page_size(page))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DocumentHandle {
        fingerprint: fingerprint(&bytes),
        page_count,
        page_sizes,
        bytes: Arc::from(bytes),
    })
}
