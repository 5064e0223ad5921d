//! Logical API of the remote secret store

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Request or response body of a logical path
pub type Payload = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("no resource at {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Key-addressed API the controller reconciles against
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create or fully overwrite the resource at `path`
    async fn write(&self, path: &str, data: Payload) -> Result<(), RemoteError>;

    /// Read a resource. `Ok(None)` means nothing exists at `path`.
    async fn read(&self, path: &str) -> Result<Option<Payload>, RemoteError>;

    /// Delete a resource. A missing resource is reported as `RemoteError::NotFound`.
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    /// Backend name
    fn name(&self) -> &str;
}
