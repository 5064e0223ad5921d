//! Canonical AppRole role paths
//!
//! Path format: `auth/<mount>/role/<role_name>`
//! - mount: the auth backend mount, without leading or trailing slashes
//! - role_name: the role name, without leading or trailing slashes
//!
//! The RoleID of a role lives at `<path>/role-id`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const PREFIX: &str = "auth/";
const SEPARATOR: &str = "/role/";
const ROLE_ID_SUFFIX: &str = "/role-id";

/// A path that does not match `auth/<mount>/role/<role_name>`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid AppRole role path {path:?}: {reason}")]
pub struct PathFormatError {
    pub path: String,
    pub reason: &'static str,
}

impl PathFormatError {
    fn new(path: &str, reason: &'static str) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }
}

/// The (mount, role name) pair a role path is derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleIdentity {
    pub mount: String,
    pub role_name: String,
}

impl RoleIdentity {
    pub fn new(mount: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            role_name: role_name.into(),
        }
    }

    /// Canonical path for this identity
    pub fn path(&self) -> String {
        encode(&self.mount, &self.role_name)
    }
}

impl fmt::Display for RoleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Build the canonical role path. Never fails.
pub fn encode(mount: &str, role_name: &str) -> String {
    format!(
        "{}{}{}{}",
        PREFIX,
        mount.trim_matches('/'),
        SEPARATOR,
        role_name.trim_matches('/')
    )
}

/// Split a role path back into its identity.
///
/// The mount capture is greedy: the split happens at the last `/role/` that
/// still leaves a non-empty role name, so `auth/a/role/b/role/c` yields mount
/// `a/role/b` and role `c`.
pub fn decode(path: &str) -> Result<RoleIdentity, PathFormatError> {
    if path.contains('\n') {
        return Err(PathFormatError::new(path, "path must be a single line"));
    }

    let rest = path
        .strip_prefix(PREFIX)
        .ok_or_else(|| PathFormatError::new(path, "missing \"auth/\" prefix"))?;

    // Separator occurrences may overlap ("/role/role/"), so walk every
    // candidate offset from the right instead of using match_indices.
    let split = (1..rest.len())
        .rev()
        .filter(|&i| rest.is_char_boundary(i))
        .find(|&i| rest[i..].starts_with(SEPARATOR) && i + SEPARATOR.len() < rest.len());

    match split {
        Some(i) => Ok(RoleIdentity {
            mount: rest[..i].to_string(),
            role_name: rest[i + SEPARATOR.len()..].to_string(),
        }),
        None => Err(PathFormatError::new(
            path,
            "expected a non-empty mount and role name around \"/role/\"",
        )),
    }
}

/// Path of the RoleID sub-resource for a role path
pub fn role_id_path(path: &str) -> String {
    format!("{}{}", path, ROLE_ID_SUFFIX)
}
