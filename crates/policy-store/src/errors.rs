use thiserror::Error;

use crate::category::RegoObjectCategory;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("fetch timed out: {0}")]
    Timeout(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed payload: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(value: serde_json::Error) -> Self {
        ParseError::new(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RefreshCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A failed refresh cycle, tagged with the first category that failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("refresh of {category} failed: {cause}")]
pub struct RefreshError {
    pub category: RegoObjectCategory,
    #[source]
    pub cause: RefreshCause,
}

impl RefreshError {
    pub fn new(category: RegoObjectCategory, cause: impl Into<RefreshCause>) -> Self {
        Self {
            category,
            cause: cause.into(),
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self.cause, RefreshCause::Fetch(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("unsupported settings key: {0}")]
    UnsupportedPath(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
