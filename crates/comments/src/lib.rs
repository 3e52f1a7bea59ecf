/// Comment synchronization engine for a shared, frequently edited document
/// Keeps the client-side comment cache fresh under concurrent edits without
/// ever trusting data that bypassed the server's access-control boundary
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod model;
pub use model::*;

mod config;
pub use config::*;

mod recovery;
pub use recovery::*;

mod realtime;
pub use realtime::*;

mod subscription;
pub use subscription::*;

mod store;
pub use store::*;

mod sync;
pub use sync::*;

/// Expected failures crossing the remote comment-store boundary
#[derive(Debug, Error)]
pub enum CommentError {
    #[error("network error: {0}")]
    Network(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CommentError {
    /// User-facing message for a failed remote call, phrased from the
    /// operation and resource the user was acting on.
    pub fn contextual_message(&self, operation: &str, resource: &str) -> String {
        match self {
            CommentError::Network(_) => {
                format!("Could not {operation} {resource}: connection problem, please try again")
            }
            CommentError::PermissionDenied(_) => {
                format!("You don't have permission to {operation} this {resource}")
            }
            CommentError::Validation(reason) => {
                format!("Could not {operation} {resource}: {reason}")
            }
            CommentError::NotFound(_) => {
                format!("Could not {operation} {resource}: it no longer exists")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CommentError>;

/// Comment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub uuid::Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the document a comment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptId(pub uuid::Uuid);

impl ScriptId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ScriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Comment author identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
