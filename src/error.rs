//! Typed errors for the two stages whose failures callers need to inspect:
//! export parsing (always fatal) and asset downloads (classified for retry).

use thiserror::Error;

/// Failure while decoding the export document. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read export: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed export at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("unterminated <{element}> element")]
    Unterminated { element: String },

    #[error("invalid number in <{element}>: {value:?}")]
    InvalidNumber { element: String, value: String },
}

/// Classification of a permanent download failure, kept on the failure
/// record after the underlying error is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ConnectionRefused,
    Aborted,
    HttpStatus(u16),
    Io,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ConnectionRefused => write!(f, "connection refused"),
            FailureKind::Aborted => write!(f, "aborted"),
            FailureKind::HttpStatus(code) => write!(f, "http {}", code),
            FailureKind::Io => write!(f, "io"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Failure of a single download attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("the operation has timed out")]
    Timeout,

    #[error("unable to connect to the remote server: {0}")]
    Connect(String),

    #[error("the request was aborted: {0}")]
    Aborted(String),

    #[error("the remote server returned an error: ({0})")]
    Status(u16),

    #[error("failed to write asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Transient failures are retried in place; everything else is terminal.
    ///
    /// Retryable: timeouts, refused connections, aborted transfers and
    /// HTTP 408. Terminal: 403, 404, every other status, local I/O errors
    /// and anything unclassified.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Aborted(_) => true,
            FetchError::Status(code) => *code == 408,
            FetchError::Io(_) | FetchError::Other(_) => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout => FailureKind::Timeout,
            FetchError::Connect(_) => FailureKind::ConnectionRefused,
            FetchError::Aborted(_) => FailureKind::Aborted,
            FetchError::Status(code) => FailureKind::HttpStatus(*code),
            FetchError::Io(_) => FailureKind::Io,
            FetchError::Other(_) => FailureKind::Other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_request() || e.is_body() {
            FetchError::Aborted(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}
