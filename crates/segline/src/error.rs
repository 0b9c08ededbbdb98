use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeglineError {
    #[error("HTTP error: {0}")]
    HttpError(u16),

    #[error("Request timeout")]
    Timeout,

    /// The segment payload failed a container-level structural check.
    #[error("Segment integrity error: {0}")]
    IntegrityError(String),

    #[error("Expected {expected} segment, got {actual}")]
    UnexpectedSegmentType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid index descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid media range: {0}")]
    InvalidMediaRange(String),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

impl SeglineError {
    /// HTTP status code attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError(status) => Some(*status),
            _ => None,
        }
    }
}

pub type SeglineResult<T> = Result<T, SeglineError>;
