//! The AppRole role record

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::field::{ChangeSet, RoleField, TokenField};
use crate::path::{self, RoleIdentity};
use crate::token::TokenFields;

pub const DEFAULT_MOUNT: &str = "approle";

fn default_mount() -> String {
    DEFAULT_MOUNT.to_string()
}

/// Local configuration of one AppRole role.
///
/// `None` means the caller never set the field; `Some(false)` and `Some(0)`
/// are real values and are sent to Vault as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default = "default_mount")]
    pub mount: String,
    #[serde(default)]
    pub role_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_secret_id: Option<bool>,
    /// Deprecated in favour of `secret_id_bound_cidrs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_cidr_list: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id_bound_cidrs: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id_num_uses: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id_ttl: Option<i64>,
    /// Deprecated in favour of `token.token_policies`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<BTreeSet<String>>,
    /// Deprecated in favour of `token.token_period`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
    #[serde(default)]
    pub token: TokenFields,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            mount: default_mount(),
            role_name: String::new(),
            role_id: None,
            bind_secret_id: None,
            bound_cidr_list: None,
            secret_id_bound_cidrs: None,
            secret_id_num_uses: None,
            secret_id_ttl: None,
            policies: None,
            period: None,
            token: TokenFields::default(),
        }
    }
}

impl RoleConfig {
    pub fn new(mount: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            role_name: role_name.into(),
            ..Default::default()
        }
    }

    pub fn identity(&self) -> RoleIdentity {
        RoleIdentity::new(
            self.mount.trim_matches('/'),
            self.role_name.trim_matches('/'),
        )
    }

    pub fn path(&self) -> String {
        path::encode(&self.mount, &self.role_name)
    }

    /// Legacy/modern pairs that are both populated
    pub fn conflicts(&self) -> Vec<(RoleField, RoleField)> {
        let mut found = Vec::new();
        if self.bound_cidr_list.is_some() && self.secret_id_bound_cidrs.is_some() {
            found.push((RoleField::BoundCidrList, RoleField::SecretIdBoundCidrs));
        }
        if self.policies.is_some() && self.token.token_policies.is_some() {
            found.push((RoleField::Policies, RoleField::Token(TokenField::Policies)));
        }
        if self.period.is_some() && self.token.token_period.is_some() {
            found.push((RoleField::Period, RoleField::Token(TokenField::Period)));
        }
        found
    }

    /// Value of `field` with the schema default substituted for `None`
    fn effective(&self, field: RoleField) -> Effective<'_> {
        let set = Effective::set;
        let int = Effective::int;
        let t = &self.token;
        match field {
            RoleField::RoleId => Effective::Text(self.role_id.as_deref().unwrap_or("")),
            RoleField::BindSecretId => Effective::Bool(self.bind_secret_id.unwrap_or(true)),
            RoleField::BoundCidrList => set(&self.bound_cidr_list),
            RoleField::SecretIdBoundCidrs => set(&self.secret_id_bound_cidrs),
            RoleField::SecretIdNumUses => int(self.secret_id_num_uses),
            RoleField::SecretIdTtl => int(self.secret_id_ttl),
            RoleField::Policies => set(&self.policies),
            RoleField::Period => int(self.period),
            RoleField::Token(field) => match field {
                TokenField::Ttl => int(t.token_ttl),
                TokenField::MaxTtl => int(t.token_max_ttl),
                TokenField::ExplicitMaxTtl => int(t.token_explicit_max_ttl),
                TokenField::Period => int(t.token_period),
                TokenField::NumUses => int(t.token_num_uses),
                TokenField::Policies => set(&t.token_policies),
                TokenField::BoundCidrs => set(&t.token_bound_cidrs),
                TokenField::NoDefaultPolicy => {
                    Effective::Bool(t.token_no_default_policy.unwrap_or(false))
                }
                TokenField::Type => Effective::Text(t.token_type.as_deref().unwrap_or("default")),
            },
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Effective<'a> {
    Bool(bool),
    Int(i64),
    Text(&'a str),
    Set(BTreeSet<&'a String>),
}

impl<'a> Effective<'a> {
    fn set(value: &'a Option<BTreeSet<String>>) -> Self {
        Effective::Set(value.iter().flatten().collect())
    }

    fn int(value: Option<i64>) -> Self {
        Effective::Int(value.unwrap_or(0))
    }
}

/// Fields whose effective value differs between the last-synced state and the
/// desired config. RoleID is server-computed, so it only counts as changed
/// when the desired config pins a different value.
pub fn changed_fields(prior: &RoleConfig, desired: &RoleConfig) -> ChangeSet {
    RoleField::all()
        .filter(|&field| match field {
            RoleField::RoleId => desired
                .role_id
                .as_ref()
                .is_some_and(|id| prior.role_id.as_ref() != Some(id)),
            _ => prior.effective(field) != desired.effective(field),
        })
        .collect()
}
