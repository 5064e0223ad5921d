use std::fmt;
use thiserror::Error;

use crate::path::PathFormatError;
use crate::remote::RemoteError;

/// Controller operation an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Exists,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Exists => "exists",
            Operation::Import => "import",
        })
    }
}

#[derive(Error, Debug)]
pub enum RoleError {
    #[error(transparent)]
    InvalidPath(#[from] PathFormatError),

    #[error("{op}: error writing AppRole role {path:?}: {source}")]
    RemoteWrite {
        op: Operation,
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("{op}: error reading AppRole role {path:?}: {source}")]
    RemoteRead {
        op: Operation,
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("{op}: error deleting AppRole role {path:?}: {source}")]
    RemoteDelete {
        op: Operation,
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("cannot import {0:?}: no AppRole role exists at that path")]
    ImportTargetMissing(String),

    #[error("AppRole role {0:?} disappeared while being updated")]
    Vanished(String),

    #[error("no AppRole role is managed by this controller")]
    Unmanaged,
}

impl RoleError {
    /// Path the failing call was addressed to, when there was one
    pub fn path(&self) -> Option<&str> {
        match self {
            RoleError::InvalidPath(e) => Some(&e.path),
            RoleError::RemoteWrite { path, .. }
            | RoleError::RemoteRead { path, .. }
            | RoleError::RemoteDelete { path, .. } => Some(path),
            RoleError::ImportTargetMissing(path) | RoleError::Vanished(path) => Some(path),
            RoleError::Unmanaged => None,
        }
    }
}
