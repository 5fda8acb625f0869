//! Error types for document loading and page rendering

use std::time::Duration;

/// Errors raised by a document engine while opening or painting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineFault {
    #[error("cannot open document: {detail}")]
    Open { detail: String },

    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// The render noticed its cancel token and stopped early
    #[error("render cancelled")]
    Cancelled,

    #[error("{detail}")]
    Generic { detail: String },
}

impl EngineFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }

    pub fn page(page: usize, msg: impl Into<String>) -> Self {
        Self::Page {
            page,
            detail: msg.into(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure of a whole document load. Nothing from a failed load survives.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    /// The source could not be reached or produced no bytes
    #[error("document source unavailable: {detail}")]
    Source { detail: String },

    /// The engine rejected the bytes
    #[error("malformed document: {0}")]
    Malformed(#[from] EngineFault),

    #[error("document has no pages")]
    Empty,

    /// Opening exceeded the configured wall-clock ceiling
    #[error("document open timed out after {after:?}")]
    Timeout { after: Duration },
}

impl LoadFailure {
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source { detail: msg.into() }
    }

    /// Distinguishes the timeout kind from every other load error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A paint failure scoped to one page. The page keeps its thumbnail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("render failed for page {page}: {fault}")]
pub struct RenderFailure {
    pub page: usize,
    pub fault: EngineFault,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_distinguishable_from_other_failures() {
        let timeout = LoadFailure::Timeout {
            after: Duration::from_millis(5),
        };
        assert!(timeout.is_timeout());
        assert!(!LoadFailure::Empty.is_timeout());
        assert!(!LoadFailure::source("404").is_timeout());
    }

    #[test]
    fn engine_fault_converts_into_malformed_load() {
        let failure: LoadFailure = EngineFault::Open {
            detail: "bad xref".into(),
        }
        .into();
        assert!(matches!(failure, LoadFailure::Malformed(_)));
        assert_eq!(
            failure.to_string(),
            "malformed document: cannot open document: bad xref"
        );
    }

    #[test]
    fn render_failure_names_the_page() {
        let failure = RenderFailure {
            page: 7,
            fault: EngineFault::generic("out of memory"),
        };
        assert_eq!(failure.to_string(), "render failed for page 7: out of memory");
    }
}
