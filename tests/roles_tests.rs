//! 角色仓库与权限检查测试

use std::sync::Arc;

use platform_security::{
    error::SecurityError,
    models::{
        declaration::{DeclaredMethod, RoleAnnotation, RoleDefinition},
        AccessOperation, EntityAttrAccess, EntityOp, Permission, PermissionType, Role, RoleType, UserRole,
    },
    repository::{InMemoryRoleStore, RoleIndex, RolesRepository},
    services::{predefined, AnnotationRoleDefBuilder, PermissionService, RolesService},
};
use uuid::Uuid;

mod common;
use common::{create_test_config, create_test_metadata, screen_access, specific_access, UserReaderRole};

struct ReportsRole;

impl RoleDefinition for ReportsRole {
    fn owner(&self) -> &str {
        "ReportsRole"
    }

    fn annotation(&self) -> Option<RoleAnnotation> {
        Some(RoleAnnotation::new("reports"))
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        vec![
            DeclaredMethod::new("screen_access").with_annotation(screen_access(&["report$Report.run"])),
            DeclaredMethod::new("specific_permissions")
                .with_annotation(specific_access("report.export", AccessOperation::Allow)),
        ]
    }
}

fn index() -> Arc<RoleIndex> {
    let compiler = AnnotationRoleDefBuilder::new(create_test_metadata());
    let builder = predefined::register_predefined_roles(RoleIndex::builder(), &compiler).unwrap();
    Arc::new(
        builder
            .register(compiler.build_role_def(&UserReaderRole).unwrap())
            .register(compiler.build_role_def(&ReportsRole).unwrap())
            .build(),
    )
}

fn db_role(name: &str, role_type: RoleType) -> Role {
    let mut role = Role::new(name, role_type);
    role.permissions = vec![Permission::new(PermissionType::Screen, "sec$Group.browse", 1)];
    role
}

#[test]
fn test_effective_permissions_across_code_and_db_roles() {
    let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &create_test_config("mixed"));
    let service = PermissionService::new(create_test_metadata(), &create_test_config("mixed"));

    let user_id = Uuid::new_v4();
    let mut user_roles = vec![
        UserRole::by_name(user_id, "user-reader"),
        UserRole::by_role(user_id, db_role("group-viewer", RoleType::Standard)),
    ];
    let roles = repository.role_defs(&mut user_roles);
    assert_eq!(roles.len(), 2);

    assert!(service.is_entity_op_permitted(&roles, "sec$User", EntityOp::Read));
    assert!(!service.is_entity_op_permitted(&roles, "sec$User", EntityOp::Delete));
    assert!(service.is_screen_permitted(&roles, "sec$Group.browse"));
    assert!(!service.is_screen_permitted(&roles, "sec$User.edit"));
    assert!(service.is_entity_attr_permitted(&roles, "sec$User", "login", EntityAttrAccess::View));
    assert!(!service.is_entity_attr_permitted(&roles, "sec$User", "login", EntityAttrAccess::Modify));
}

#[test]
fn test_role_type_override_applies_before_ledger() {
    let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &create_test_config("mixed"));
    let service = PermissionService::new(create_test_metadata(), &create_test_config("mixed"));
    let user_id = Uuid::new_v4();

    let mut denying = vec![UserRole::by_role(user_id, db_role("deny-all", RoleType::Denying))];
    let roles = repository.role_defs(&mut denying);
    assert!(!service.is_screen_permitted(&roles, "sec$Group.browse"));

    let mut full = vec![UserRole::by_name(user_id, predefined::FULL_ACCESS_ROLE_NAME)];
    let roles = repository.role_defs(&mut full);
    assert!(service.is_entity_op_permitted(&roles, "app$Order", EntityOp::Delete));
    assert!(service.is_specific_permitted(&roles, "anything"));
}

#[test]
fn test_require_permission_reports_denied_target() {
    let repository = RolesRepository::new(index(), InMemoryRoleStore::default(), &create_test_config("mixed"));
    let service = PermissionService::new(create_test_metadata(), &create_test_config("mixed"));
    let mut user_roles = vec![UserRole::by_name(Uuid::new_v4(), "reports")];
    let roles = repository.role_defs(&mut user_roles);

    assert!(service
        .require_permission(&roles, PermissionType::Specific, "report.export", AccessOperation::Allow.id())
        .is_ok());

    match service.require_permission(&roles, PermissionType::Screen, "sec$User.browse", AccessOperation::Allow.id()) {
        Err(SecurityError::AccessDenied { target, .. }) => assert_eq!(target, "sec$User.browse"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_roles_service_lists_code_then_db_roles() {
    let store = InMemoryRoleStore::new(vec![
        db_role("zz-db", RoleType::Standard),
        db_role("aa-db", RoleType::Readonly),
    ]);
    let repository = RolesRepository::new(index(), store, &create_test_config("mixed"));
    let service = RolesService::new(Arc::new(repository));

    let names: Vec<String> = service.all_roles().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec![
            "reports",
            predefined::FULL_ACCESS_ROLE_NAME,
            predefined::MINIMAL_ROLE_NAME,
            "user-reader",
            "aa-db",
            "zz-db"
        ]
    );

    let reader = service.role_by_name("user-reader").await.unwrap().unwrap();
    assert!(reader.predefined);
    assert!(!reader.permissions.is_empty());

    let db = service.role_by_name("aa-db").await.unwrap().unwrap();
    assert!(!db.predefined);
    assert!(service.role_by_name("missing").await.unwrap().is_none());

    assert_eq!(service.permissions("reports", PermissionType::Screen).len(), 1);
}

#[tokio::test]
async fn test_database_only_mode_hides_code_roles() {
    let store = InMemoryRoleStore::new(vec![db_role("db-only", RoleType::Standard)]);
    let repository = RolesRepository::new(index(), store, &create_test_config("database"));
    let service = RolesService::new(Arc::new(repository));

    assert!(service.is_database_mode_available());
    assert!(!service.is_predefined_roles_mode_available());

    let roles = service.all_roles().await.unwrap();
    assert_eq!(roles.len(), 1);
    assert!(service.role_by_name("user-reader").await.unwrap().is_none());
}
