//! Lifecycle of one AppRole role
//!
//! State machine:
//!
//! ```text
//! Unmanaged --create/import--> Synced --update--> Synced --delete--> Unmanaged
//!                                 \--read finds role gone--> Unmanaged
//! ```
//!
//! Remote calls within an operation are awaited strictly in order. Nothing is
//! retried here: every role write is an upsert, so callers re-run the whole
//! operation after a transient failure. Local state only ever holds values
//! that reached the server, so a re-run computes the same change set.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Operation, RoleError};
use crate::field::{ChangeSet, RoleField};
use crate::path::{self, RoleIdentity};
use crate::projector;
use crate::remote::{Payload, RemoteApi};
use crate::role::{changed_fields, RoleConfig};
use crate::token::{StandardTokenFields, TokenFieldAdapter};

/// Result of refreshing local state from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Synced(RoleConfig),
    /// The role no longer exists; local state has been cleared
    Removed,
}

/// Reconciles one role identity against the remote API
pub struct RoleController {
    remote: Arc<dyn RemoteApi>,
    tokens: Arc<dyn TokenFieldAdapter>,
    id: Option<String>,
    state: RoleConfig,
}

impl RoleController {
    /// An unmanaged controller using the standard token fields
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self::with_token_adapter(remote, Arc::new(StandardTokenFields))
    }

    pub fn with_token_adapter(
        remote: Arc<dyn RemoteApi>,
        tokens: Arc<dyn TokenFieldAdapter>,
    ) -> Self {
        Self {
            remote,
            tokens,
            id: None,
            state: RoleConfig::default(),
        }
    }

    /// Resume managing a role from previously persisted state
    pub fn adopt(remote: Arc<dyn RemoteApi>, id: impl Into<String>, state: RoleConfig) -> Self {
        let mut controller = Self::new(remote);
        controller.id = Some(id.into());
        controller.state = state;
        controller
    }

    /// Stored role path, if a role is managed
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> &RoleConfig {
        &self.state
    }

    pub fn is_managed(&self) -> bool {
        self.id.is_some()
    }

    /// Write a new role (or overwrite one already at the path), then read it back.
    ///
    /// Role and RoleID are two separate writes. If the RoleID write fails the
    /// role keeps a server-generated RoleID, the controller stays managed
    /// without a pinned RoleID and the error is returned; a later read reports
    /// the server's value.
    pub async fn create(&mut self, config: RoleConfig) -> Result<RoleIdentity, RoleError> {
        let path = config.path();
        let identity = path::decode(&path)?;

        debug!(path = %path, backend = self.remote.name(), "Writing AppRole auth backend role");
        let payload = projector::project_for_create(&config, self.tokens.as_ref());
        self.write(Operation::Create, &path, payload).await?;
        self.id = Some(path.clone());
        self.state = RoleConfig {
            role_id: None,
            ..config.clone()
        };
        debug!(path = %path, "Wrote AppRole auth backend role");

        if let Some(role_id) = config.role_id.as_deref() {
            self.write_role_id(Operation::Create, &path, role_id).await?;
        }

        match self.refresh(Operation::Create, config).await? {
            ReadOutcome::Synced(_) => {
                info!(path = %path, "Created AppRole auth backend role");
                Ok(identity)
            }
            ReadOutcome::Removed => Err(RoleError::Vanished(path)),
        }
    }

    /// Refresh local state from the server
    pub async fn read(&mut self) -> Result<ReadOutcome, RoleError> {
        let basis = self.state.clone();
        self.refresh(Operation::Read, basis).await
    }

    /// Write the fields in `changed` from `desired`, then read the role back.
    /// Identity fields always come from the stored path.
    ///
    /// Local state is left at the last-synced values until the read-back
    /// succeeds, so a failed update can be re-run with the same change set.
    pub async fn update(
        &mut self,
        desired: RoleConfig,
        changed: &ChangeSet,
    ) -> Result<RoleConfig, RoleError> {
        let path = self.id.clone().ok_or(RoleError::Unmanaged)?;
        let identity = path::decode(&path)?;

        let mut desired = desired;
        desired.mount = identity.mount;
        desired.role_name = identity.role_name;

        debug!(path = %path, changed = changed.len(), "Updating AppRole auth backend role");
        let payload = projector::project_for_update(&desired, changed, self.tokens.as_ref());
        self.write(Operation::Update, &path, payload).await?;
        debug!(path = %path, "Updated AppRole auth backend role");

        if changed.contains(&RoleField::RoleId) {
            if let Some(role_id) = desired.role_id.as_deref() {
                self.write_role_id(Operation::Update, &path, role_id).await?;
            }
        }

        match self.refresh(Operation::Update, desired).await? {
            ReadOutcome::Synced(config) => Ok(config),
            ReadOutcome::Removed => Err(RoleError::Vanished(path)),
        }
    }

    /// Update with the fields that differ between local state and `desired`
    pub async fn update_to(&mut self, desired: RoleConfig) -> Result<RoleConfig, RoleError> {
        let changed = changed_fields(&self.state, &desired);
        self.update(desired, &changed).await
    }

    /// Delete the role. A role that is already gone counts as deleted.
    pub async fn delete(&mut self) -> Result<(), RoleError> {
        let path = self.id.clone().ok_or(RoleError::Unmanaged)?;

        debug!(path = %path, backend = self.remote.name(), "Deleting AppRole auth backend role");
        match self.remote.delete(&path).await {
            Ok(()) => info!(path = %path, "Deleted AppRole auth backend role"),
            Err(e) if e.is_not_found() => {
                debug!(path = %path, "AppRole auth backend role not found, removing from state");
            }
            Err(source) => {
                return Err(RoleError::RemoteDelete {
                    op: Operation::Delete,
                    path,
                    source,
                })
            }
        }

        self.forget();
        Ok(())
    }

    /// Whether the role exists on the server. An unmanaged controller has
    /// nothing to look for.
    pub async fn exists(&self) -> Result<bool, RoleError> {
        let Some(path) = self.id.as_deref() else {
            return Ok(false);
        };

        debug!(path = %path, "Checking if AppRole auth backend role exists");
        match self.remote.read(path).await {
            Ok(response) => Ok(response.is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(source) => Err(RoleError::RemoteRead {
                op: Operation::Exists,
                path: path.to_string(),
                source,
            }),
        }
    }

    /// Start managing the role at `raw_path`, taken verbatim as the id
    pub async fn import(&mut self, raw_path: &str) -> Result<RoleIdentity, RoleError> {
        let identity = path::decode(raw_path)?;

        self.id = Some(raw_path.to_string());
        self.state = RoleConfig::new(identity.mount.clone(), identity.role_name.clone());

        let basis = self.state.clone();
        match self.refresh(Operation::Import, basis).await {
            Ok(ReadOutcome::Synced(_)) => {
                info!(path = %raw_path, "Imported AppRole auth backend role");
                Ok(identity)
            }
            Ok(ReadOutcome::Removed) => Err(RoleError::ImportTargetMissing(raw_path.to_string())),
            Err(e) => {
                self.forget();
                Err(e)
            }
        }
    }

    /// Read the role back and commit the result as local state. `basis` is
    /// the config the server was last told about; it decides which half of
    /// each legacy/modern pair is authoritative.
    async fn refresh(
        &mut self,
        op: Operation,
        basis: RoleConfig,
    ) -> Result<ReadOutcome, RoleError> {
        let path = self.id.clone().ok_or(RoleError::Unmanaged)?;
        let identity = path::decode(&path)?;

        debug!(path = %path, backend = self.remote.name(), "Reading AppRole auth backend role");
        let response = self
            .remote
            .read(&path)
            .await
            .map_err(|source| RoleError::RemoteRead {
                op,
                path: path.clone(),
                source,
            })?;
        debug!(path = %path, "Read AppRole auth backend role");

        let Some(response) = response else {
            warn!(path = %path, "AppRole auth backend role not found, removing from state");
            self.forget();
            return Ok(ReadOutcome::Removed);
        };

        let mut config = basis.clone();
        config.mount = identity.mount;
        config.role_name = identity.role_name;
        self.tokens.read_fields(&mut config.token, &response);
        projector::resolve_on_read(&basis, &mut config, &response);

        let role_id_path = path::role_id_path(&path);
        debug!(path = %path, "Reading AppRole auth backend role RoleID");
        let role_id = self
            .remote
            .read(&role_id_path)
            .await
            .map_err(|source| RoleError::RemoteRead {
                op,
                path: role_id_path.clone(),
                source,
            })?;
        if let Some(id) = role_id
            .as_ref()
            .and_then(|data| data.get(RoleField::RoleId.key()))
            .and_then(Value::as_str)
        {
            config.role_id = Some(id.to_string());
        }

        self.state = config;
        Ok(ReadOutcome::Synced(self.state.clone()))
    }

    async fn write(&self, op: Operation, path: &str, payload: Payload) -> Result<(), RoleError> {
        self.remote
            .write(path, payload)
            .await
            .map_err(|source| RoleError::RemoteWrite {
                op,
                path: path.to_string(),
                source,
            })
    }

    async fn write_role_id(
        &self,
        op: Operation,
        path: &str,
        role_id: &str,
    ) -> Result<(), RoleError> {
        let role_id_path = path::role_id_path(path);
        debug!(path = %path, "Writing AppRole auth backend role RoleID");

        let mut payload = Payload::new();
        payload.insert(RoleField::RoleId.key().to_string(), Value::String(role_id.to_string()));
        self.write(op, &role_id_path, payload).await?;

        debug!(path = %path, "Wrote AppRole auth backend role RoleID");
        Ok(())
    }

    fn forget(&mut self) {
        self.id = None;
        self.state = RoleConfig::default();
    }
}
