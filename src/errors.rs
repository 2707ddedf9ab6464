//! Configuration Distribution Error Hierarchy
//!
//! The top-level [`Error`] carries the protocol taxonomy shared by the
//! controller, agent and worker (not found, conflict, not modified, ...)
//! plus layered infrastructure failures that always surface as internal
//! errors to HTTP callers.

use std::path::PathBuf;

use config::ConfigError;
use warp::http::StatusCode;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Body returned for every 5xx so internals never leak to callers.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested record does not exist (no revision yet, unknown agent, empty cache)
    #[error("resource not found")]
    NotFound,

    /// Malformed structured input
    #[error("resource conflict")]
    Conflict,

    /// Missing or unknown bearer token, missing agent id
    #[error("unauthorized")]
    Unauthorized,

    /// Token is valid but its role may not use the endpoint
    #[error("forbidden")]
    Forbidden,

    /// Request body or parameters could not be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Control signal: nothing changed, nothing to do
    #[error("data not modified")]
    NotModified,

    /// Agent liveness check failed
    #[error("agent inactive")]
    InActive,

    /// Infrastructure-level failures (network, storage, broker)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// HTTP status used when this error crosses the HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden | Error::InActive => StatusCode::FORBIDDEN,
            Error::Conflict => StatusCode::CONFLICT,
            Error::NotModified => StatusCode::NOT_MODIFIED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message body paired with [`Error::status_code`].
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_ERROR_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    /// True for errors meaning the controller no longer accepts this agent's identity.
    pub fn is_identity_rejected(&self) -> bool {
        matches!(self, Error::InActive | Error::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures (state file, sled directory)
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Embedded database errors
    #[error(transparent)]
    DbError(#[from] sled::Error),

    /// Shared store (redis) command failures
    #[error("redis store error: {0}")]
    RedisError(#[source] redis::RedisError),

    /// Serialization failures for persisted records
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    /// JSON encoding failures for documents and the agent state file
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Another writer already created this version
    #[error("Version {0} already exists")]
    VersionConflict(u64),

    /// Stored key is not an 8-byte big-endian version
    #[error("invalid byte length: expected 8 bytes, received {0} bytes")]
    InvalidKeyLength(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// HTTP client transport failures
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Peer answered with a status the protocol does not expect
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Invalid URL format: {0}")]
    InvalidURL(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Subscription stream ended (connection lost)
    #[error("Broker subscription closed")]
    Closed,

    #[error("Broker publish failed: {0}")]
    Publish(String),
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Error::System(SystemError::Broker(e))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        StorageError::DbError(e).into()
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        StorageError::BincodeError(e).into()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        NetworkError::Http(e).into()
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        BrokerError::Redis(e).into()
    }
}
