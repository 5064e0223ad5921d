//! In-process stand-in for Vault's AppRole backend
//!
//! Behaves like the real backend where the controller can observe it:
//! - role writes merge into the stored role and fill server defaults
//! - a new role gets a generated RoleID
//! - `<role>/role-id` reads and writes the RoleID
//! - deleting a role removes its RoleID too
//!
//! Every call is recorded so tests can assert on ordering and payloads.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::path;
use crate::remote::{Payload, RemoteApi, RemoteError};

const ROLE_ID_SUFFIX: &str = "/role-id";

/// A recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Write { path: String, data: Payload },
    Read { path: String },
    Delete { path: String },
}

#[derive(Default)]
struct Inner {
    roles: BTreeMap<String, Payload>,
    role_ids: BTreeMap<String, String>,
    calls: Vec<RemoteCall>,
    failing_writes: HashSet<String>,
    failing_reads: HashSet<String>,
}

/// AppRole backend held in memory
#[derive(Default)]
pub struct InMemoryRemote {
    inner: Mutex<Inner>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a role as if it had been created out of band
    pub fn insert_role(&self, path: &str, data: Payload) {
        let mut inner = self.inner.lock();
        let mut role = server_defaults();
        role.extend(data);
        inner.roles.insert(path.to_string(), role);
        inner
            .role_ids
            .entry(path.to_string())
            .or_insert_with(|| uuid::Uuid::new_v4().to_string());
    }

    /// Remove a role behind the controller's back
    pub fn remove_role(&self, path: &str) {
        let mut inner = self.inner.lock();
        inner.roles.remove(path);
        inner.role_ids.remove(path);
    }

    /// Stored role fields, without the RoleID
    pub fn role(&self, path: &str) -> Option<Payload> {
        self.inner.lock().roles.get(path).cloned()
    }

    pub fn role_id(&self, path: &str) -> Option<String> {
        self.inner.lock().role_ids.get(path).cloned()
    }

    /// Make every write to `path` fail with a 500 until cleared
    pub fn fail_writes_to(&self, path: &str) {
        self.inner.lock().failing_writes.insert(path.to_string());
    }

    /// Make every read of `path` fail with a 500 until cleared
    pub fn fail_reads_of(&self, path: &str) {
        self.inner.lock().failing_reads.insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failing_writes.clear();
        inner.failing_reads.clear();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }
}

fn server_defaults() -> Payload {
    let defaults = json!({
        "bind_secret_id": true,
        "secret_id_bound_cidrs": null,
        "secret_id_num_uses": 0,
        "secret_id_ttl": 0,
        "local_secret_ids": false,
        "token_ttl": 0,
        "token_max_ttl": 0,
        "token_explicit_max_ttl": 0,
        "token_period": 0,
        "token_num_uses": 0,
        "token_policies": [],
        "token_bound_cidrs": [],
        "token_no_default_policy": false,
        "token_type": "default",
        "policies": [],
        "period": 0,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// (modern key, legacy key) pairs the backend treats as one field
const ALIASES: [(&str, &str); 3] = [
    ("secret_id_bound_cidrs", "bound_cidr_list"),
    ("token_policies", "policies"),
    ("token_period", "period"),
];

/// Fold legacy keys into their modern field. The modern key wins when a write
/// carries both. `policies` and `period` are still reported, mirroring the
/// token values; `bound_cidr_list` is not.
fn apply_aliases(role: &mut Payload, data: &Payload) {
    for (modern, legacy) in ALIASES {
        if let Some(v) = data.get(modern).or_else(|| data.get(legacy)) {
            role.insert(modern.to_string(), v.clone());
        }
    }
    role.remove("bound_cidr_list");
    for (modern, legacy) in &ALIASES[1..] {
        if let Some(v) = role.get(*modern).cloned() {
            role.insert(legacy.to_string(), v);
        }
    }
}

#[async_trait]
impl RemoteApi for InMemoryRemote {
    async fn write(&self, path: &str, data: Payload) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RemoteCall::Write {
            path: path.to_string(),
            data: data.clone(),
        });

        if inner.failing_writes.contains(path) {
            return Err(RemoteError::Status {
                status: 500,
                body: format!("injected write failure for {}", path),
            });
        }

        if let Some(role_path) = path.strip_suffix(ROLE_ID_SUFFIX) {
            if !inner.roles.contains_key(role_path) {
                return Err(RemoteError::Status {
                    status: 400,
                    body: format!("role {} does not exist", role_path),
                });
            }
            let role_id = data
                .get("role_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| RemoteError::Status {
                    status: 400,
                    body: "missing role_id".to_string(),
                })?;
            inner.role_ids.insert(role_path.to_string(), role_id.to_string());
            return Ok(());
        }

        if path::decode(path).is_err() {
            return Err(RemoteError::Status {
                status: 405,
                body: format!("unsupported path {}", path),
            });
        }

        let mut role = inner
            .roles
            .remove(path)
            .unwrap_or_else(server_defaults);
        role.extend(data.clone());
        apply_aliases(&mut role, &data);
        inner.roles.insert(path.to_string(), role);
        inner
            .role_ids
            .entry(path.to_string())
            .or_insert_with(|| uuid::Uuid::new_v4().to_string());
        debug!(path = %path, "Stored role in memory");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Payload>, RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RemoteCall::Read {
            path: path.to_string(),
        });

        if inner.failing_reads.contains(path) {
            return Err(RemoteError::Status {
                status: 500,
                body: format!("injected read failure for {}", path),
            });
        }

        if let Some(role_path) = path.strip_suffix(ROLE_ID_SUFFIX) {
            return Ok(inner.role_ids.get(role_path).map(|id| {
                let mut data = Payload::new();
                data.insert("role_id".to_string(), Value::String(id.clone()));
                data
            }));
        }

        Ok(inner.roles.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RemoteCall::Delete {
            path: path.to_string(),
        });

        match inner.roles.remove(path) {
            Some(_) => {
                inner.role_ids.remove(path);
                Ok(())
            }
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
