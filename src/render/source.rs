//! Document sources and the byte fetcher seam

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::LoadFailure;

/// Produces the document bytes on the loader thread
pub type ByteProducer = Box<dyn FnOnce() -> anyhow::Result<Vec<u8>> + Send>;

/// Where a document comes from
pub enum DocumentSource {
    /// A network locator or path, resolved through a `ByteFetcher`
    Locator(String),
    /// Bytes already in memory
    Bytes(Vec<u8>),
    /// A handle that yields bytes when asked (a blob, a download in flight)
    Producer(ByteProducer),
}

impl DocumentSource {
    pub fn producer<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Vec<u8>> + Send + 'static,
    {
        Self::Producer(Box::new(f))
    }

    /// Resolve into raw bytes. Runs on the loader thread.
    pub fn into_bytes(self, fetcher: &dyn ByteFetcher) -> Result<Vec<u8>, LoadFailure> {
        let bytes = match self {
            Self::Locator(locator) => fetcher
                .fetch(&locator)
                .map_err(|e| LoadFailure::source(format!("{locator}: {e:#}")))?,
            Self::Bytes(bytes) => bytes,
            Self::Producer(produce) => {
                produce().map_err(|e| LoadFailure::source(format!("{e:#}")))?
            }
        };

        if bytes.is_empty() {
            return Err(LoadFailure::source("source produced no bytes"));
        }
        Ok(bytes)
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locator(l) => f.debug_tuple("Locator").field(l).finish(),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl From<&str> for DocumentSource {
    fn from(locator: &str) -> Self {
        Self::Locator(locator.to_string())
    }
}

impl From<String> for DocumentSource {
    fn from(locator: String) -> Self {
        Self::Locator(locator)
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Requests whole-document bytes for a locator.
///
/// A document byte cache plugs in here; the renderer never manages its policy.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> anyhow::Result<Vec<u8>>;
}

/// Fetches `http(s)://` locators over the network and everything else from disk
#[derive(Clone, Debug)]
pub struct DefaultFetcher {
    timeout: Duration,
}

impl DefaultFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ByteFetcher for DefaultFetcher {
    fn fetch(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            debug!("fetching {locator}");
            let response = ureq::get(locator).timeout(self.timeout).call()?;
            let mut bytes = Vec::new();
            response.into_reader().read_to_end(&mut bytes)?;
            Ok(bytes)
        } else {
            let path = locator.strip_prefix("file://").unwrap_or(locator);
            Ok(fs::read(Path::new(path))?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoFetch;

    impl ByteFetcher for NoFetch {
        fn fetch(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("unreachable: {locator}")
        }
    }

    #[test]
    fn bytes_pass_through() {
        let bytes = DocumentSource::from(vec![1, 2, 3]).into_bytes(&NoFetch).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn producer_errors_become_source_failures() {
        let source = DocumentSource::producer(|| Err(anyhow::anyhow!("blob revoked")));
        let err = source.into_bytes(&NoFetch).unwrap_err();
        assert!(matches!(err, LoadFailure::Source { .. }));
        assert!(err.to_string().contains("blob revoked"));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = DocumentSource::Bytes(Vec::new())
            .into_bytes(&NoFetch)
            .unwrap_err();
        assert!(matches!(err, LoadFailure::Source { .. }));
    }

    #[test]
    fn unreachable_locator_names_the_locator() {
        let err = DocumentSource::from("https://example.invalid/book.pdf")
            .into_bytes(&NoFetch)
            .unwrap_err();
        assert!(err.to_string().contains("example.invalid/book.pdf"));
    }

    #[test]
    fn default_fetcher_reads_file_locators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        fs::write(&path, b"%PDF-1.7").unwrap();

        let fetcher = DefaultFetcher::default();
        let plain = fetcher.fetch(path.to_str().unwrap()).unwrap();
        let url = fetcher
            .fetch(&format!("file://{}", path.to_str().unwrap()))
            .unwrap();
        assert_eq!(plain, b"%PDF-1.7");
        assert_eq!(url, plain);
    }
}
