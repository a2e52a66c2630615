//! 内置角色

use std::sync::Arc;

use crate::error::Result;
use crate::models::declaration::{Annotation, DeclaredMethod, RoleAnnotation, RoleDefinition};
use crate::models::permission::AccessOperation;
use crate::models::role::RoleType;
use crate::repository::roles_repository::RoleIndexBuilder;
use crate::services::annotation_role_builder::AnnotationRoleDefBuilder;

pub const FULL_ACCESS_ROLE_NAME: &str = "system-full-access";
pub const MINIMAL_ROLE_NAME: &str = "system-minimal";

/// Unrestricted access through the SUPER role type.
pub struct FullAccessRole;

impl RoleDefinition for FullAccessRole {
    fn owner(&self) -> &str {
        "FullAccessRole"
    }

    fn annotation(&self) -> Option<RoleAnnotation> {
        Some(
            RoleAnnotation::new(FULL_ACCESS_ROLE_NAME)
                .with_role_type(RoleType::Super)
                .with_description("Full access role"),
        )
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        Vec::new()
    }
}

/// Permissions every user needs to log in and manage their own session.
pub struct MinimalRole;

impl RoleDefinition for MinimalRole {
    fn owner(&self) -> &str {
        "MinimalRole"
    }

    fn annotation(&self) -> Option<RoleAnnotation> {
        Some(
            RoleAnnotation::new(MINIMAL_ROLE_NAME)
                .with_description("Minimal permissions to log in")
                .default_role(),
        )
    }

    fn methods(&self) -> Vec<DeclaredMethod> {
        vec![
            DeclaredMethod::new("specific_permissions").with_annotation(Annotation::SpecificAccess {
                target: "cuba.gui.loginToClient".to_string(),
                access: AccessOperation::Allow,
            }),
            DeclaredMethod::new("screen_access").with_annotation(Annotation::ScreenAccess {
                allow: vec![
                    "mainWindow".to_string(),
                    "settings".to_string(),
                    "sec$User.changePassword".to_string(),
                ],
                deny: Vec::new(),
            }),
        ]
    }
}

pub fn predefined_roles() -> Vec<Arc<dyn RoleDefinition>> {
    vec![Arc::new(FullAccessRole), Arc::new(MinimalRole)]
}

/// Compiles the built-in roles into the index being built.
pub fn register_predefined_roles(
    mut builder: RoleIndexBuilder,
    compiler: &AnnotationRoleDefBuilder,
) -> Result<RoleIndexBuilder> {
    for role in predefined_roles() {
        builder = builder.register(compiler.build_role_def(role.as_ref())?);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::Metadata;
    use crate::repository::roles_repository::RoleIndex;

    #[test]
    fn test_predefined_roles_compile() {
        let compiler = AnnotationRoleDefBuilder::new(Arc::new(Metadata::new()));
        let index = register_predefined_roles(RoleIndex::builder(), &compiler)
            .unwrap()
            .build();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(FULL_ACCESS_ROLE_NAME).unwrap().role_type, RoleType::Super);

        let minimal = index.get(MINIMAL_ROLE_NAME).unwrap();
        assert!(minimal.is_default);
        assert_eq!(minimal.specific.permission_value("cuba.gui.loginToClient"), Some(1));
        assert_eq!(minimal.screen.len(), 3);
    }
}
