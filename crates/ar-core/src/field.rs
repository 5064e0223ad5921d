//! Field names and value conversion for role payloads

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Set of fields that differ from the last-synced state
pub type ChangeSet = BTreeSet<RoleField>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role field: {0}")]
pub struct UnknownField(pub String);

/// Fields of the shared token block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenField {
    Ttl,
    MaxTtl,
    ExplicitMaxTtl,
    Period,
    NumUses,
    Policies,
    BoundCidrs,
    NoDefaultPolicy,
    Type,
}

impl TokenField {
    pub const ALL: [TokenField; 9] = [
        TokenField::Ttl,
        TokenField::MaxTtl,
        TokenField::ExplicitMaxTtl,
        TokenField::Period,
        TokenField::NumUses,
        TokenField::Policies,
        TokenField::BoundCidrs,
        TokenField::NoDefaultPolicy,
        TokenField::Type,
    ];

    /// Wire key used by Vault
    pub fn key(self) -> &'static str {
        match self {
            TokenField::Ttl => "token_ttl",
            TokenField::MaxTtl => "token_max_ttl",
            TokenField::ExplicitMaxTtl => "token_explicit_max_ttl",
            TokenField::Period => "token_period",
            TokenField::NumUses => "token_num_uses",
            TokenField::Policies => "token_policies",
            TokenField::BoundCidrs => "token_bound_cidrs",
            TokenField::NoDefaultPolicy => "token_no_default_policy",
            TokenField::Type => "token_type",
        }
    }
}

/// Every field of a role that can be written to Vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleField {
    RoleId,
    BindSecretId,
    BoundCidrList,
    SecretIdBoundCidrs,
    SecretIdNumUses,
    SecretIdTtl,
    Policies,
    Period,
    Token(TokenField),
}

impl RoleField {
    /// Fields owned by the role itself, in payload order
    pub const ROLE: [RoleField; 8] = [
        RoleField::RoleId,
        RoleField::BindSecretId,
        RoleField::BoundCidrList,
        RoleField::SecretIdBoundCidrs,
        RoleField::SecretIdNumUses,
        RoleField::SecretIdTtl,
        RoleField::Policies,
        RoleField::Period,
    ];

    pub fn all() -> impl Iterator<Item = RoleField> {
        Self::ROLE
            .into_iter()
            .chain(TokenField::ALL.into_iter().map(RoleField::Token))
    }

    pub fn key(self) -> &'static str {
        match self {
            RoleField::RoleId => "role_id",
            RoleField::BindSecretId => "bind_secret_id",
            RoleField::BoundCidrList => "bound_cidr_list",
            RoleField::SecretIdBoundCidrs => "secret_id_bound_cidrs",
            RoleField::SecretIdNumUses => "secret_id_num_uses",
            RoleField::SecretIdTtl => "secret_id_ttl",
            RoleField::Policies => "policies",
            RoleField::Period => "period",
            RoleField::Token(field) => field.key(),
        }
    }

    /// Whether the field is deprecated in favour of a newer one
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            RoleField::BoundCidrList | RoleField::Policies | RoleField::Period
        )
    }
}

impl fmt::Display for RoleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RoleField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        RoleField::all()
            .find(|field| field.key() == key)
            .ok_or_else(|| UnknownField(key.to_string()))
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Vault reports durations as integer seconds, occasionally as numeric strings
pub(crate) fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Lists come back as JSON arrays; `null` means an empty set and older
/// servers may send a comma separated string.
pub(crate) fn as_string_set(value: &Value) -> Option<BTreeSet<String>> {
    match value {
        Value::Null => Some(BTreeSet::new()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

pub(crate) fn set_value(set: &BTreeSet<String>) -> Value {
    Value::Array(set.iter().cloned().map(Value::String).collect())
}
