//! Legacy/modern field pairs
//!
//! Vault 1.2 moved several role fields into the shared token block
//! (`policies` → `token_policies`, `period` → `token_period`) and renamed
//! `bound_cidr_list` to `secret_id_bound_cidrs`. Both generations remain
//! writable, so a read has to decide which local field receives the value.
//! Whichever one the caller populated wins; the other stays empty.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::field::{as_int, as_string_set, RoleField, TokenField};
use crate::remote::Payload;
use crate::role::RoleConfig;

/// Where a legacy-authoritative field takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Only the legacy key is consulted
    LegacyKeyOnly,
    /// The legacy key, or the modern key when the server no longer reports
    /// the legacy one
    LegacyKeyThenModern,
}

/// Accessors for one field of a [`RoleConfig`]
pub struct Slot<T> {
    pub field: RoleField,
    get: fn(&RoleConfig) -> &Option<T>,
    get_mut: fn(&mut RoleConfig) -> &mut Option<T>,
}

macro_rules! slot {
    ($field:expr, $ty:ty, $($path:ident).+) => {{
        fn get(c: &RoleConfig) -> &Option<$ty> {
            &c.$($path).+
        }
        fn get_mut(c: &mut RoleConfig) -> &mut Option<$ty> {
            &mut c.$($path).+
        }
        Slot { field: $field, get, get_mut }
    }};
}

/// One deprecated field and its replacement
pub struct FieldMigration<T> {
    pub legacy: Slot<T>,
    pub modern: Slot<T>,
    pub policy: ReadPolicy,
    decode: fn(&Value) -> Option<T>,
}

impl<T> FieldMigration<T> {
    /// Whether the legacy field is the one the caller manages
    pub fn legacy_in_use(&self, snapshot: &RoleConfig) -> bool {
        (self.legacy.get)(snapshot).is_some()
    }

    /// Apply a read response to `config`, using `snapshot` (the local state
    /// before the read) to pick the authoritative field.
    pub fn resolve(&self, snapshot: &RoleConfig, config: &mut RoleConfig, response: &Payload) {
        let legacy_key = self.legacy.field.key();
        let modern_key = self.modern.field.key();

        if self.legacy_in_use(snapshot) {
            let value = match self.policy {
                ReadPolicy::LegacyKeyOnly => response.get(legacy_key),
                ReadPolicy::LegacyKeyThenModern => response
                    .get(legacy_key)
                    .or_else(|| response.get(modern_key)),
            };
            if let Some(value) = value.and_then(self.decode) {
                *(self.legacy.get_mut)(config) = Some(value);
            }
            *(self.modern.get_mut)(config) = None;
        } else if let Some(value) = response.get(modern_key).and_then(self.decode) {
            *(self.modern.get_mut)(config) = Some(value);
        }
    }
}

/// `bound_cidr_list` ↔ `secret_id_bound_cidrs`.
///
/// Servers that migrated the key only report `secret_id_bound_cidrs`, hence
/// the modern-key fallback. The policy and period pairs do not have one.
pub const BOUND_CIDRS: FieldMigration<BTreeSet<String>> = FieldMigration {
    legacy: slot!(RoleField::BoundCidrList, BTreeSet<String>, bound_cidr_list),
    modern: slot!(RoleField::SecretIdBoundCidrs, BTreeSet<String>, secret_id_bound_cidrs),
    policy: ReadPolicy::LegacyKeyThenModern,
    decode: as_string_set,
};

/// `policies` ↔ `token_policies`
pub const POLICIES: FieldMigration<BTreeSet<String>> = FieldMigration {
    legacy: slot!(RoleField::Policies, BTreeSet<String>, policies),
    modern: slot!(RoleField::Token(TokenField::Policies), BTreeSet<String>, token.token_policies),
    policy: ReadPolicy::LegacyKeyOnly,
    decode: as_string_set,
};

/// `period` ↔ `token_period`
pub const PERIOD: FieldMigration<i64> = FieldMigration {
    legacy: slot!(RoleField::Period, i64, period),
    modern: slot!(RoleField::Token(TokenField::Period), i64, token.token_period),
    policy: ReadPolicy::LegacyKeyOnly,
    decode: as_int,
};
