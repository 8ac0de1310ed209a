//! Error module
//!
//! Error taxonomy shared by the storage adapter, the local cache and the
//! HTTP front end. Only the front end turns these into status codes.

use thiserror::Error;

/// Errors raised while listing or fetching objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Object (or bucket) does not exist in the store
    #[error("not found: {0}")]
    NotFound(String),

    /// The store reported a failure other than absence
    #[error("store error: {0}")]
    StoreError(String),

    /// No session could be established with the store
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Local filesystem create/write failure
    #[error("local IO error: {0}")]
    LocalIoError(String),
}

impl ProxyError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::LocalIoError(err.to_string())
    }
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
