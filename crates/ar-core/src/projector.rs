//! Translation between a local [`RoleConfig`] and Vault payloads
//!
//! Writes:
//! - create: every field the caller set, including `false` and `0`
//! - update: only changed fields, so remote values the caller does not
//!   manage are never reset
//!
//! RoleID is never part of the role payload; it has its own path.

use serde_json::Value;

use crate::field::{as_bool, as_int, set_value, ChangeSet, RoleField};
use crate::migration::{BOUND_CIDRS, PERIOD, POLICIES};
use crate::remote::Payload;
use crate::role::RoleConfig;
use crate::token::{Projection, TokenFieldAdapter};

/// Payload for the initial write of a role
pub fn project_for_create(config: &RoleConfig, tokens: &dyn TokenFieldAdapter) -> Payload {
    project(config, Projection::Create, tokens)
}

/// Payload for a partial update carrying only `changed` fields. A changed
/// field with no local value is written as its default.
pub fn project_for_update(
    config: &RoleConfig,
    changed: &ChangeSet,
    tokens: &dyn TokenFieldAdapter,
) -> Payload {
    project(config, Projection::Update(changed), tokens)
}

fn project(
    config: &RoleConfig,
    projection: Projection<'_>,
    tokens: &dyn TokenFieldAdapter,
) -> Payload {
    let mut payload = Payload::new();
    tokens.project_fields(&config.token, projection, &mut payload);

    let empty = || Value::Array(Vec::new());
    let fields = [
        (RoleField::BindSecretId, config.bind_secret_id.map(Value::Bool), Value::Bool(true)),
        (RoleField::SecretIdNumUses, config.secret_id_num_uses.map(Value::from), Value::from(0)),
        (RoleField::SecretIdTtl, config.secret_id_ttl.map(Value::from), Value::from(0)),
        (
            RoleField::SecretIdBoundCidrs,
            config.secret_id_bound_cidrs.as_ref().map(set_value),
            empty(),
        ),
        (RoleField::Period, config.period.map(Value::from), Value::from(0)),
        (RoleField::Policies, config.policies.as_ref().map(set_value), empty()),
        (RoleField::BoundCidrList, config.bound_cidr_list.as_ref().map(set_value), empty()),
    ];

    for (field, value, default) in fields {
        if projection.includes(field, value.is_some()) {
            payload.insert(field.key().to_string(), value.unwrap_or(default));
        }
    }

    payload
}

/// Refresh `config` from a role read response.
///
/// `snapshot` is the local state before the read and decides, per
/// legacy/modern pair, which field is authoritative. Token fields must
/// already have been refreshed by the token adapter: a legacy-authoritative
/// pair clears its modern token field afterwards.
pub fn resolve_on_read(snapshot: &RoleConfig, config: &mut RoleConfig, response: &Payload) {
    config.bind_secret_id = response.get(RoleField::BindSecretId.key()).and_then(as_bool);
    config.secret_id_num_uses = response.get(RoleField::SecretIdNumUses.key()).and_then(as_int);
    config.secret_id_ttl = response.get(RoleField::SecretIdTtl.key()).and_then(as_int);

    BOUND_CIDRS.resolve(snapshot, config, response);
    POLICIES.resolve(snapshot, config, response);
    PERIOD.resolve(snapshot, config, response);
}
