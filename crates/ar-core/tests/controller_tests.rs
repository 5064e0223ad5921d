//! Controller lifecycle tests against the in-memory AppRole backend

use ar_core::{
    ChangeSet, InMemoryRemote, Operation, Payload, ReadOutcome, RemoteApi, RemoteCall, RemoteError,
    RoleConfig, RoleController, RoleError, RoleField, RoleIdentity, TokenFields,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

const PATH: &str = "auth/approle/role/r1";
const ROLE_ID_PATH: &str = "auth/approle/role/r1/role-id";

fn setup() -> (Arc<InMemoryRemote>, RoleController) {
    let remote = Arc::new(InMemoryRemote::new());
    let controller = RoleController::new(remote.clone());
    (remote, controller)
}

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

fn set(items: &[&str]) -> Option<BTreeSet<String>> {
    Some(items.iter().map(|s| s.to_string()).collect())
}

fn synced(outcome: ReadOutcome) -> RoleConfig {
    match outcome {
        ReadOutcome::Synced(config) => config,
        ReadOutcome::Removed => panic!("expected role to be present"),
    }
}

#[tokio::test]
async fn test_create_read_update_end_to_end() {
    let (remote, mut controller) = setup();

    let config = RoleConfig {
        bind_secret_id: Some(true),
        secret_id_num_uses: Some(5),
        ..RoleConfig::new("approle", "r1")
    };
    let identity = controller.create(config).await.unwrap();
    assert_eq!(identity, RoleIdentity::new("approle", "r1"));
    assert_eq!(controller.id(), Some(PATH));

    let state = synced(controller.read().await.unwrap());
    assert_eq!(state.bind_secret_id, Some(true));
    assert_eq!(state.secret_id_num_uses, Some(5));
    let role_id = state.role_id.clone().unwrap();
    assert!(!role_id.is_empty());
    assert_eq!(remote.role_id(PATH), Some(role_id));

    let desired = RoleConfig {
        secret_id_ttl: Some(3600),
        ..state
    };
    let changed: ChangeSet = [RoleField::SecretIdTtl].into();
    let updated = controller.update(desired, &changed).await.unwrap();

    assert_eq!(updated.secret_id_ttl, Some(3600));
    assert_eq!(updated.secret_id_num_uses, Some(5));
    assert_eq!(controller.state(), &updated);
}

#[tokio::test]
async fn test_create_payload_respects_unset_and_zero() {
    let (remote, mut controller) = setup();

    let config = RoleConfig {
        bind_secret_id: Some(false),
        secret_id_ttl: Some(0),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let RemoteCall::Write { path, data } = &remote.calls()[0] else {
        panic!("first call should be the role write");
    };
    assert_eq!(path, PATH);
    assert_eq!(data.get("bind_secret_id"), Some(&json!(false)));
    assert_eq!(data.get("secret_id_ttl"), Some(&json!(0)));
    assert!(!data.contains_key("secret_id_num_uses"));
    assert!(!data.contains_key("role_id"));
}

#[tokio::test]
async fn test_create_call_order_with_role_id() {
    let (remote, mut controller) = setup();

    let config = RoleConfig {
        role_id: Some("pinned-role-id".into()),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let calls = remote.calls();
    assert_eq!(calls.len(), 4);
    assert!(matches!(&calls[0], RemoteCall::Write { path, .. } if path == PATH));
    assert_eq!(
        calls[1],
        RemoteCall::Write {
            path: ROLE_ID_PATH.into(),
            data: payload(json!({"role_id": "pinned-role-id"})),
        }
    );
    assert_eq!(calls[2], RemoteCall::Read { path: PATH.into() });
    assert_eq!(calls[3], RemoteCall::Read { path: ROLE_ID_PATH.into() });
    assert_eq!(controller.state().role_id.as_deref(), Some("pinned-role-id"));
}

#[tokio::test]
async fn test_create_rejects_malformed_identity_without_calls() {
    let (remote, mut controller) = setup();

    let err = controller
        .create(RoleConfig::new("approle", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, RoleError::InvalidPath(_)));
    assert!(remote.calls().is_empty());
    assert!(!controller.is_managed());
}

#[tokio::test]
async fn test_role_id_write_failure_keeps_server_generated_id() {
    let (remote, mut controller) = setup();
    remote.fail_writes_to(ROLE_ID_PATH);

    let config = RoleConfig {
        role_id: Some("pinned-role-id".into()),
        ..RoleConfig::new("approle", "r1")
    };
    let err = controller.create(config).await.unwrap_err();

    match err {
        RoleError::RemoteWrite { op, path, .. } => {
            assert_eq!(op, Operation::Create);
            assert_eq!(path, ROLE_ID_PATH);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(controller.is_managed());

    remote.clear_failures();
    let state = synced(controller.read().await.unwrap());
    let role_id = state.role_id.unwrap();
    assert_ne!(role_id, "pinned-role-id");
    assert_eq!(remote.role_id(PATH), Some(role_id));
}

#[tokio::test]
async fn test_legacy_cidrs_read_back_from_modern_key() {
    let (remote, mut controller) = setup();

    let config = RoleConfig {
        bound_cidr_list: set(&["10.0.0.0/8"]),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    // The backend only reports the migrated key
    assert!(!remote.role(PATH).unwrap().contains_key("bound_cidr_list"));

    let state = controller.state();
    assert_eq!(state.bound_cidr_list, set(&["10.0.0.0/8"]));
    assert_eq!(state.secret_id_bound_cidrs, None);
}

#[tokio::test]
async fn test_legacy_policies_clear_token_policies() {
    let (_remote, mut controller) = setup();

    let config = RoleConfig {
        policies: set(&["dev"]),
        period: Some(300),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let state = controller.state();
    assert_eq!(state.policies, set(&["dev"]));
    assert_eq!(state.token.token_policies, None);
    assert_eq!(state.period, Some(300));
    assert_eq!(state.token.token_period, None);
}

#[tokio::test]
async fn test_modern_token_fields_read_back() {
    let (_remote, mut controller) = setup();

    let config = RoleConfig {
        token: TokenFields {
            token_policies: set(&["dev", "ops"]),
            token_ttl: Some(600),
            ..Default::default()
        },
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let state = controller.state();
    assert_eq!(state.token.token_policies, set(&["dev", "ops"]));
    assert_eq!(state.token.token_ttl, Some(600));
    assert_eq!(state.policies, None);
}

#[tokio::test]
async fn test_update_to_sends_only_differences() {
    let (remote, mut controller) = setup();

    let config = RoleConfig {
        secret_id_num_uses: Some(5),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();
    remote.clear_calls();

    let desired = RoleConfig {
        secret_id_num_uses: Some(5),
        secret_id_ttl: Some(3600),
        ..RoleConfig::new("approle", "r1")
    };
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(
        remote.calls()[0],
        RemoteCall::Write {
            path: PATH.into(),
            data: payload(json!({"secret_id_ttl": 3600})),
        }
    );
    assert_eq!(updated.secret_id_ttl, Some(3600));
    assert_eq!(updated.secret_id_num_uses, Some(5));
}

#[tokio::test]
async fn test_update_writes_role_id_only_when_changed() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();
    remote.clear_calls();

    let desired = RoleConfig {
        role_id: Some("rotated".into()),
        ..controller.state().clone()
    };
    let changed: ChangeSet = [RoleField::RoleId].into();
    let updated = controller.update(desired, &changed).await.unwrap();

    let calls = remote.calls();
    assert_eq!(calls[0], RemoteCall::Write { path: PATH.into(), data: Payload::new() });
    assert!(matches!(&calls[1], RemoteCall::Write { path, .. } if path == ROLE_ID_PATH));
    assert_eq!(updated.role_id.as_deref(), Some("rotated"));
}

#[tokio::test]
async fn test_read_removes_vanished_role() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();

    remote.remove_role(PATH);
    let outcome = controller.read().await.unwrap();

    assert_eq!(outcome, ReadOutcome::Removed);
    assert!(!controller.is_managed());
    assert_eq!(controller.state(), &RoleConfig::default());
}

#[tokio::test]
async fn test_read_with_corrupted_id_leaves_state() {
    let remote = Arc::new(InMemoryRemote::new());
    let config = RoleConfig::new("approle", "r1");
    let mut controller = RoleController::adopt(remote.clone(), "auth/role/bar", config.clone());

    let err = controller.read().await.unwrap_err();

    assert!(matches!(err, RoleError::InvalidPath(_)));
    assert_eq!(controller.id(), Some("auth/role/bar"));
    assert_eq!(controller.state(), &config);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_read_failure_is_annotated() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();
    let before = controller.state().clone();

    remote.fail_reads_of(PATH);
    let err = controller.read().await.unwrap_err();

    assert!(matches!(err, RoleError::RemoteRead { op: Operation::Read, .. }));
    assert_eq!(controller.state(), &before);
}

#[tokio::test]
async fn test_delete_absent_role_succeeds() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();

    remote.remove_role(PATH);
    controller.delete().await.unwrap();

    assert!(!controller.is_managed());
    assert!(!controller.exists().await.unwrap());
}

#[tokio::test]
async fn test_delete_then_exists() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();
    assert!(controller.exists().await.unwrap());

    controller.delete().await.unwrap();

    assert!(remote.role(PATH).is_none());
    assert!(remote.role_id(PATH).is_none());
    assert!(!controller.exists().await.unwrap());
}

#[tokio::test]
async fn test_unmanaged_controller() {
    let (remote, mut controller) = setup();

    assert!(!controller.exists().await.unwrap());
    assert!(matches!(controller.delete().await, Err(RoleError::Unmanaged)));
    assert!(matches!(controller.read().await, Err(RoleError::Unmanaged)));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_import_existing_role() {
    let (remote, mut controller) = setup();
    remote.insert_role(
        "auth/my/approle/role/web",
        payload(json!({"secret_id_num_uses": 3, "token_policies": ["web"]})),
    );

    let identity = controller.import("auth/my/approle/role/web").await.unwrap();

    assert_eq!(identity, RoleIdentity::new("my/approle", "web"));
    let state = controller.state();
    assert_eq!(state.mount, "my/approle");
    assert_eq!(state.role_name, "web");
    assert_eq!(state.secret_id_num_uses, Some(3));
    assert_eq!(state.token.token_policies, set(&["web"]));
    assert!(state.role_id.is_some());
}

#[tokio::test]
async fn test_import_missing_role() {
    let (_remote, mut controller) = setup();

    let err = controller.import(PATH).await.unwrap_err();

    assert!(matches!(err, RoleError::ImportTargetMissing(ref p) if p == PATH));
    assert!(!controller.is_managed());
}

#[tokio::test]
async fn test_import_malformed_path() {
    let (remote, mut controller) = setup();

    let err = controller.import("auth/role/bar").await.unwrap_err();

    assert!(matches!(err, RoleError::InvalidPath(_)));
    assert!(!controller.is_managed());
    assert!(remote.calls().is_empty());
}

/// Accepts writes but never finds anything on read
struct BlackHole;

#[async_trait]
impl RemoteApi for BlackHole {
    async fn write(&self, _path: &str, _data: Payload) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn read(&self, _path: &str) -> Result<Option<Payload>, RemoteError> {
        Ok(None)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotFound(path.to_string()))
    }

    fn name(&self) -> &str {
        "black-hole"
    }
}

#[tokio::test]
async fn test_create_reports_vanished_role() {
    let mut controller = RoleController::new(Arc::new(BlackHole));

    let err = controller
        .create(RoleConfig::new("approle", "r1"))
        .await
        .unwrap_err();

    assert!(matches!(err, RoleError::Vanished(ref p) if p == PATH));
    assert!(!controller.is_managed());
}

#[tokio::test]
async fn test_failed_update_is_retried_with_same_changes() {
    let (remote, mut controller) = setup();
    let config = RoleConfig {
        secret_id_num_uses: Some(5),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config.clone()).await.unwrap();
    let synced = controller.state().clone();

    let desired = RoleConfig {
        secret_id_ttl: Some(3600),
        ..config
    };
    remote.fail_writes_to(PATH);
    let err = controller.update_to(desired.clone()).await.unwrap_err();

    assert!(matches!(err, RoleError::RemoteWrite { op: Operation::Update, .. }));
    assert_eq!(controller.state(), &synced);

    remote.clear_failures();
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(updated.secret_id_ttl, Some(3600));
    assert_eq!(remote.role(PATH).unwrap()["secret_id_ttl"], json!(3600));
}

#[tokio::test]
async fn test_failed_role_id_update_is_retried() {
    let (remote, mut controller) = setup();
    controller.create(RoleConfig::new("approle", "r1")).await.unwrap();
    let generated = controller.state().role_id.clone();

    let desired = RoleConfig {
        role_id: Some("rotated".into()),
        ..RoleConfig::new("approle", "r1")
    };
    remote.fail_writes_to(ROLE_ID_PATH);
    controller.update_to(desired.clone()).await.unwrap_err();

    assert_eq!(controller.state().role_id, generated);

    remote.clear_failures();
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(updated.role_id.as_deref(), Some("rotated"));
    assert_eq!(remote.role_id(PATH).as_deref(), Some("rotated"));
}

#[tokio::test]
async fn test_failed_create_leaves_controller_unmanaged() {
    let (remote, mut controller) = setup();
    remote.fail_writes_to(PATH);

    let config = RoleConfig {
        secret_id_num_uses: Some(5),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap_err();

    assert!(!controller.is_managed());
    assert_eq!(controller.state(), &RoleConfig::default());
}

#[tokio::test]
async fn test_role_id_failure_on_create_does_not_pin_role_id() {
    let (remote, mut controller) = setup();
    remote.fail_writes_to(ROLE_ID_PATH);

    let config = RoleConfig {
        role_id: Some("pinned-role-id".into()),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config.clone()).await.unwrap_err();
    assert_eq!(controller.state().role_id, None);

    remote.clear_failures();
    let updated = controller.update_to(config).await.unwrap();

    assert_eq!(updated.role_id.as_deref(), Some("pinned-role-id"));
    assert_eq!(remote.role_id(PATH).as_deref(), Some("pinned-role-id"));
}

#[tokio::test]
async fn test_switch_policies_from_legacy_to_modern() {
    let (remote, mut controller) = setup();
    let config = RoleConfig {
        policies: set(&["dev"]),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let desired = RoleConfig {
        token: TokenFields {
            token_policies: set(&["prod"]),
            ..Default::default()
        },
        ..RoleConfig::new("approle", "r1")
    };
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(updated.token.token_policies, set(&["prod"]));
    assert_eq!(updated.policies, None);
    assert_eq!(remote.role(PATH).unwrap()["token_policies"], json!(["prod"]));
}

#[tokio::test]
async fn test_switch_cidrs_from_legacy_to_modern() {
    let (remote, mut controller) = setup();
    let config = RoleConfig {
        bound_cidr_list: set(&["10.0.0.0/8"]),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let desired = RoleConfig {
        secret_id_bound_cidrs: set(&["127.0.0.1/32"]),
        ..RoleConfig::new("approle", "r1")
    };
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(updated.secret_id_bound_cidrs, set(&["127.0.0.1/32"]));
    assert_eq!(updated.bound_cidr_list, None);
    assert_eq!(
        remote.role(PATH).unwrap()["secret_id_bound_cidrs"],
        json!(["127.0.0.1/32"])
    );
}

#[tokio::test]
async fn test_switch_period_from_legacy_to_modern() {
    let (_remote, mut controller) = setup();
    let config = RoleConfig {
        period: Some(300),
        ..RoleConfig::new("approle", "r1")
    };
    controller.create(config).await.unwrap();

    let desired = RoleConfig {
        token: TokenFields {
            token_period: Some(600),
            ..Default::default()
        },
        ..RoleConfig::new("approle", "r1")
    };
    let updated = controller.update_to(desired).await.unwrap();

    assert_eq!(updated.token.token_period, Some(600));
    assert_eq!(updated.period, None);
}
