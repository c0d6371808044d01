use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Source-level failures the pipeline recovers from locally, plus
/// configuration errors raised once at startup. Record-level failures are
/// [`RejectReason`]s.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source '{}' is unreadable: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("source '{}' is not valid JSON: {reason}", .path.display())]
    MalformedJson { path: PathBuf, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a single record was dropped. Counted, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    /// No link-like field present at all.
    MissingUrl,
    /// A link field exists but is blank after trimming.
    EmptyUrl,
    /// The array element was not a JSON object.
    NotAnObject,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingUrl => "missing_url",
            RejectReason::EmptyUrl => "empty_url",
            RejectReason::NotAnObject => "not_an_object",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
