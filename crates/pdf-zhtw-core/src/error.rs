use thiserror::Error;

/// Unified error type for pdf-zhtw-core
///
/// Covers everything that can abort a conversion:
/// - Document operations (reading, parsing, writing)
/// - Page rewriting (content streams, fonts)
/// - Configuration and cache access
///
/// Translation backend failures are a separate type ([`BackendError`]) because
/// the translation gate absorbs them instead of aborting the conversion.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// Input path missing or not a PDF at all
    #[error("cannot read document: {0}")]
    DocumentUnreadable(String),

    /// Document structure cannot be parsed
    #[error("document is corrupt: {0}")]
    DocumentCorrupt(String),

    /// Output could not be written
    #[error("failed to write document: {0}")]
    DocumentWriteFailed(String),

    // ==========================================================================
    // Page Errors
    // ==========================================================================
    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    InvalidPage { page: usize, total: usize },

    /// A page content stream could not be decoded or re-encoded
    #[error("content stream error on page {page}: {reason}")]
    ContentStream { page: usize, reason: String },

    /// No font can render the requested text
    #[error("no font can render text: {0}")]
    FontUnavailable(String),

    // ==========================================================================
    // Conversion Control
    // ==========================================================================
    /// Conversion was cancelled before the document was written
    #[error("conversion cancelled")]
    Cancelled,

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    /// Missing required configuration field
    #[error("missing required config field: {0}")]
    ConfigMissing(String),

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to initialize the cache
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),
}

/// The fatal document failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentErrorKind {
    Unreadable,
    Corrupt,
    WriteFailed,
}

impl Error {
    /// Classify this error into the document failure taxonomy, if it is one.
    pub const fn document_kind(&self) -> Option<DocumentErrorKind> {
        match self {
            Self::DocumentUnreadable(_) => Some(DocumentErrorKind::Unreadable),
            Self::DocumentCorrupt(_) => Some(DocumentErrorKind::Corrupt),
            Self::DocumentWriteFailed(_) => Some(DocumentErrorKind::WriteFailed),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single outbound translation call.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// Credential rejected or missing
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure, timeout or unexpected HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// Rate limited by the service
    #[error("rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    /// Reply could not be parsed or was not a bare translation
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Coarse classification of a [`BackendError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Auth,
    Network,
    RateLimit,
    InvalidResponse,
}

impl BackendError {
    pub const fn kind(&self) -> BackendErrorKind {
        match self {
            Self::Auth(_) => BackendErrorKind::Auth,
            Self::Network(_) => BackendErrorKind::Network,
            Self::RateLimited { .. } => BackendErrorKind::RateLimit,
            Self::InvalidResponse(_) => BackendErrorKind::InvalidResponse,
        }
    }

    /// Seconds the service asked us to wait, if any.
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
