//! 角色构建与权限登记测试

use platform_security::{
    error::SecurityError,
    models::{AccessOperation, Permission, PermissionType, Permissions, RoleType},
    services::RoleBuilder,
};

mod common;

#[test]
fn test_same_value_twice_keeps_one_entry() {
    let mut ledger = Permissions::screen();
    ledger.add_value("sec$User.browse", 1);
    ledger.add_value("sec$User.browse", 1);

    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.permission_value("sec$User.browse"), Some(1));
}

#[test]
fn test_higher_value_wins_regardless_of_order() {
    let mut ledger = Permissions::specific();
    ledger.add_value("cuba.restApi.enabled", 1);
    ledger.add_value("cuba.restApi.enabled", 0);
    assert_eq!(ledger.permission_value("cuba.restApi.enabled"), Some(1));

    let mut ledger = Permissions::specific();
    ledger.add_value("cuba.restApi.enabled", 0);
    ledger.add_value("cuba.restApi.enabled", 1);
    assert_eq!(ledger.permission_value("cuba.restApi.enabled"), Some(1));
}

#[test]
fn test_wrong_permission_type_never_mutates_ledger() {
    let mut ledger = Permissions::screen();
    ledger.add_value("mainWindow", 1);

    let batch = vec![
        Permission::new(PermissionType::Screen, "settings", 1),
        Permission::new(PermissionType::Specific, "cuba.gui.loginToClient", 1),
    ];
    let result = ledger.add_permissions(&batch);

    assert!(matches!(result, Err(SecurityError::InvalidArgument(_))));
    assert_eq!(ledger.len(), 1);
    assert!(ledger.permission_value("settings").is_none());

    assert!(ledger
        .add_permission(&Permission::new(PermissionType::EntityOp, "sec$User:read", 1))
        .is_err());
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_join_is_order_independent_for_values() {
    let a = RoleBuilder::create_role()
        .with_name("a")
        .with_screen_permission("sec$User.browse", AccessOperation::Deny)
        .with_specific_permission("cuba.restApi.enabled", AccessOperation::Allow)
        .build();
    let b = RoleBuilder::create_role()
        .with_name("b")
        .with_screen_permission("sec$User.browse", AccessOperation::Allow)
        .with_specific_permission("cuba.restApi.enabled", AccessOperation::Deny)
        .build();

    let ab = RoleBuilder::create_role().join(&a).join(&b).with_name("joined").build();
    let ba = RoleBuilder::create_role().join(&b).join(&a).with_name("joined").build();

    for permission_type in PermissionType::ALL {
        assert_eq!(ab.permissions(permission_type), ba.permissions(permission_type));
    }
    assert_eq!(ab.screen.permission_value("sec$User.browse"), Some(1));
    assert_eq!(ab.specific.permission_value("cuba.restApi.enabled"), Some(1));
}

#[test]
fn test_explicit_setters_are_last_write_wins() {
    let role = RoleBuilder::create_role()
        .with_name("first")
        .with_role_type(RoleType::Readonly)
        .with_name("second")
        .with_role_type(RoleType::Denying)
        .build();

    assert_eq!(role.name, "second");
    assert_eq!(role.role_type, RoleType::Denying);
}

#[test]
fn test_allow_beats_deny_for_same_screen() {
    let role = RoleBuilder::create_role()
        .with_screen_permission("X.browse", AccessOperation::Allow)
        .with_screen_permission("X.browse", AccessOperation::Allow)
        .with_screen_permission("X.browse", AccessOperation::Deny)
        .build();

    assert_eq!(role.screen.len(), 1);
    assert_eq!(role.screen.permission_value("X.browse"), Some(AccessOperation::Allow.id()));
}
