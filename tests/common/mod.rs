//! 测试公共模块
//! 提供元数据、角色与访问组夹具

#![allow(dead_code)]

use std::sync::Arc;

use platform_security::{
    config::SecurityConfig,
    models::{
        declaration::{Annotation, DeclaredMethod, GroupAnnotation, GroupDefinition, RoleAnnotation, RoleDefinition},
        AccessOperation, Entity, EntityOp, MetaClass, MetaProperty, Metadata,
    },
};

/// 创建测试元数据
pub fn create_test_metadata() -> Arc<Metadata> {
    Arc::new(
        Metadata::new()
            .with_class(
                MetaClass::new("sec$User")
                    .with_property(MetaProperty::datatype("login"))
                    .with_property(MetaProperty::datatype("active"))
                    .with_property(MetaProperty::reference("group")),
            )
            .with_class(
                MetaClass::new("sec$Group")
                    .with_property(MetaProperty::datatype("name"))
                    .with_property(MetaProperty::list("users")),
            )
            .with_class(MetaClass::new("sec$Role").with_property(MetaProperty::datatype("name")))
            .with_class(
                MetaClass::new("app$Order")
                    .versioned()
                    .with_property(MetaProperty::datatype("number"))
                    .with_property(MetaProperty::list("lines")),
            )
            .with_class(MetaClass::new("app$Line").with_property(MetaProperty::datatype("qty"))),
    )
}

/// 创建测试配置
pub fn create_test_config(mode: &str) -> SecurityConfig {
    SecurityConfig {
        roles_storage_mode: mode.to_string(),
        ..SecurityConfig::default()
    }
}

/// Role granting read access to users and their browse screen.
pub struct UserReaderRole;

impl RoleDefinition for UserReaderRole {
    fn owner(&self) -> &str {
        "UserReaderRole"
    }

    fn annotation(&self) -> Option<RoleAnnotation> {
        Some(RoleAnnotation::new("user-reader").with_description("Reads users"))
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        vec![
            DeclaredMethod::new("entity_access").with_annotation(Annotation::EntityAccess {
                target: "sec$User".to_string(),
                allow: vec![EntityOp::Read],
                deny: vec![EntityOp::Delete],
            }),
            DeclaredMethod::new("attribute_access").with_annotation(Annotation::EntityAttributeAccess {
                target: "sec$User".to_string(),
                allow: Vec::new(),
                read_only: vec!["login".to_string()],
                deny: Vec::new(),
            }),
            DeclaredMethod::new("screen_access").with_annotation(Annotation::ScreenAccess {
                allow: vec!["sec$User.browse".to_string()],
                deny: vec!["sec$User.edit".to_string()],
            }),
        ]
    }
}

fn is_active(entity: &Entity) -> bool {
    entity.value("active").and_then(|v| v.as_bool()) == Some(true)
}

/// Root group restricting users to active ones.
pub struct CompanyGroup;

impl GroupDefinition for CompanyGroup {
    fn owner(&self) -> &str {
        "CompanyGroup"
    }

    fn annotation(&self) -> Option<GroupAnnotation> {
        Some(GroupAnnotation::new("Company"))
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        vec![
            DeclaredMethod::new("user_constraint")
                .with_parameter("sec$User")
                .with_annotation(Annotation::jpql("{E}.active = true")),
            DeclaredMethod::new("session_attributes")
                .with_annotation(Annotation::session_attribute("region", "EU", "string"))
                .with_annotation(Annotation::session_attribute("maxAmount", "100", "int")),
        ]
    }
}

/// Child of [`CompanyGroup`] with an in-memory user check.
pub struct SalesGroup;

impl GroupDefinition for SalesGroup {
    fn owner(&self) -> &str {
        "SalesGroup"
    }

    fn annotation(&self) -> Option<GroupAnnotation> {
        Some(GroupAnnotation::new("Sales").with_parent(Arc::new(CompanyGroup)))
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        vec![
            DeclaredMethod::new("active_users")
                .with_parameter("sec$User")
                .with_annotation(Annotation::constraint(&[EntityOp::Update]))
                .with_body(is_active),
            DeclaredMethod::new("session_attributes")
                .with_annotation(Annotation::session_attribute("maxAmount", "500", "int")),
        ]
    }
}

pub fn screen_access(allow: &[&str]) -> Annotation {
    Annotation::ScreenAccess {
        allow: allow.iter().map(|s| s.to_string()).collect(),
        deny: Vec::new(),
    }
}

pub fn specific_access(target: &str, access: AccessOperation) -> Annotation {
    Annotation::SpecificAccess {
        target: target.to_string(),
        access,
    }
}
