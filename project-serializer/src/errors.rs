use thiserror::Error;

/// Result type alias for serializer operations
pub type Result<T, E = SerializerError> = std::result::Result<T, E>;

/// Error returned by a backing store or query engine.
///
/// Stores are opaque collaborators; their failures are carried as a message
/// plus the store name so callers can tell which round-trip failed.
#[derive(Error, Debug)]
#[error("{store} lookup failed: {message}")]
pub struct StoreError {
    pub store: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(store: &'static str, message: impl Into<String>) -> Self {
        StoreError {
            store,
            message: message.into(),
        }
    }
}

/// Errors that can occur while building a serialized response
#[derive(Error, Debug)]
pub enum SerializerError {
    #[error("Unknown stats period: {0}")]
    UnknownStatsPeriod(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(#[from] serde_json::Error),
}
