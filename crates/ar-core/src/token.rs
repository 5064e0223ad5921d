//! Shared `token_*` field block
//!
//! Every Vault auth role type (AppRole, JWT, Kubernetes, ...) carries the same
//! set of token fields. They are modelled separately from the role so the
//! controller only has to call two hooks on an adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::field::{
    as_bool, as_int, as_string, as_string_set, set_value, ChangeSet, RoleField, TokenField,
};
use crate::remote::Payload;

/// Token settings applied to tokens issued by a role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_max_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_explicit_max_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_num_uses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_policies: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_bound_cidrs: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_no_default_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Which write is being built
#[derive(Debug, Clone, Copy)]
pub enum Projection<'a> {
    /// Initial write: every explicitly set field
    Create,
    /// Partial write: only the listed fields
    Update(&'a ChangeSet),
}

impl Projection<'_> {
    /// Whether `field` belongs in the payload given its local value is set or not
    pub fn includes(&self, field: RoleField, is_set: bool) -> bool {
        match self {
            Projection::Create => is_set,
            Projection::Update(changed) => changed.contains(&field),
        }
    }
}

/// Hooks for the token block, reused by every role-like resource
pub trait TokenFieldAdapter: Send + Sync {
    /// Refresh token fields from a role read response
    fn read_fields(&self, fields: &mut TokenFields, response: &Payload);

    /// Add token fields to a write payload
    fn project_fields(
        &self,
        fields: &TokenFields,
        projection: Projection<'_>,
        payload: &mut Payload,
    );
}

/// The token block as served by Vault 1.2 and later
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTokenFields;

impl TokenFieldAdapter for StandardTokenFields {
    fn read_fields(&self, fields: &mut TokenFields, response: &Payload) {
        for field in TokenField::ALL {
            let value = response.get(field.key());
            match field {
                TokenField::Ttl => fields.token_ttl = value.and_then(as_int),
                TokenField::MaxTtl => fields.token_max_ttl = value.and_then(as_int),
                TokenField::ExplicitMaxTtl => {
                    fields.token_explicit_max_ttl = value.and_then(as_int)
                }
                TokenField::Period => fields.token_period = value.and_then(as_int),
                TokenField::NumUses => fields.token_num_uses = value.and_then(as_int),
                TokenField::Policies => fields.token_policies = value.and_then(as_string_set),
                TokenField::BoundCidrs => fields.token_bound_cidrs = value.and_then(as_string_set),
                TokenField::NoDefaultPolicy => {
                    fields.token_no_default_policy = value.and_then(as_bool)
                }
                TokenField::Type => fields.token_type = value.and_then(as_string),
            }
        }
    }

    fn project_fields(
        &self,
        fields: &TokenFields,
        projection: Projection<'_>,
        payload: &mut Payload,
    ) {
        for field in TokenField::ALL {
            let value: Option<serde_json::Value> = match field {
                TokenField::Ttl => fields.token_ttl.map(Into::into),
                TokenField::MaxTtl => fields.token_max_ttl.map(Into::into),
                TokenField::ExplicitMaxTtl => fields.token_explicit_max_ttl.map(Into::into),
                TokenField::Period => fields.token_period.map(Into::into),
                TokenField::NumUses => fields.token_num_uses.map(Into::into),
                TokenField::Policies => fields.token_policies.as_ref().map(set_value),
                TokenField::BoundCidrs => fields.token_bound_cidrs.as_ref().map(set_value),
                TokenField::NoDefaultPolicy => fields.token_no_default_policy.map(Into::into),
                TokenField::Type => fields.token_type.clone().map(Into::into),
            };
            if projection.includes(RoleField::Token(field), value.is_some()) {
                payload.insert(
                    field.key().to_string(),
                    value.unwrap_or_else(|| token_default(field)),
                );
            }
        }
    }
}

/// Value written when a changed field has been removed from the local config
pub(crate) fn token_default(field: TokenField) -> serde_json::Value {
    match field {
        TokenField::Policies | TokenField::BoundCidrs => serde_json::Value::Array(Vec::new()),
        TokenField::NoDefaultPolicy => false.into(),
        TokenField::Type => "default".into(),
        _ => 0.into(),
    }
}
