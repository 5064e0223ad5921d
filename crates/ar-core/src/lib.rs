//! AppRole Role Reconciliation
//!
//! Keeps a locally declared AppRole role in sync with Vault's AppRole auth
//! backend:
//! - Path codec for `auth/<mount>/role/<role_name>` identities
//! - Field projection into create/update payloads, with legacy/modern
//!   field resolution on read
//! - A lifecycle controller (create, read, update, delete, exists, import)
//!
//! The remote side is abstracted behind [`RemoteApi`]. [`InMemoryRemote`]
//! mirrors the backend's observable behavior for tests and dry runs.

pub mod controller;
pub mod error;
pub mod field;
pub mod memory;
pub mod migration;
pub mod path;
pub mod projector;
pub mod remote;
pub mod role;
pub mod state;
pub mod token;

pub use controller::{ReadOutcome, RoleController};
pub use error::{Operation, RoleError};
pub use field::{ChangeSet, RoleField, TokenField, UnknownField};
pub use memory::{InMemoryRemote, RemoteCall};
pub use migration::{FieldMigration, ReadPolicy};
pub use path::{PathFormatError, RoleIdentity};
pub use remote::{Payload, RemoteApi, RemoteError};
pub use role::{changed_fields, RoleConfig, DEFAULT_MOUNT};
pub use state::{ResourceState, StateError, StateStore};
pub use token::{Projection, StandardTokenFields, TokenFieldAdapter, TokenFields};
