//! 注解角色编译器
//! 将声明式角色的访问注解编译为角色定义

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SecurityError};
use crate::models::declaration::{Annotation, AnnotationKind, RoleAnnotation, RoleDefinition};
use crate::models::metadata::Metadata;
use crate::models::permission::{AccessOperation, EntityAttrAccess, PermissionType};
use crate::models::permissions::Permissions;
use crate::models::role::{RoleDef, RoleType};
use crate::services::role_builder::RoleBuilder;

type PermissionProcessor = fn(&AnnotationRoleDefBuilder, &Annotation, RoleBuilder) -> Result<RoleBuilder>;

pub struct AnnotationRoleDefBuilder {
    metadata: Arc<Metadata>,
    processors: HashMap<AnnotationKind, PermissionProcessor>,
}

impl AnnotationRoleDefBuilder {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        let mut processors: HashMap<AnnotationKind, PermissionProcessor> = HashMap::new();
        processors.insert(AnnotationKind::EntityAccess, process_entity_access);
        processors.insert(AnnotationKind::EntityAttributeAccess, process_entity_attribute_access);
        processors.insert(AnnotationKind::SpecificAccess, process_specific_access);
        processors.insert(AnnotationKind::ScreenAccess, process_screen_access);
        processors.insert(AnnotationKind::ScreenElementAccess, process_screen_element_access);
        Self { metadata, processors }
    }

    pub fn name_from_annotation(&self, role: &dyn RoleDefinition) -> Result<String> {
        Ok(role_annotation_nn(role)?.name)
    }

    pub fn type_from_annotation(&self, role: &dyn RoleDefinition) -> Result<RoleType> {
        Ok(role_annotation_nn(role)?.role_type)
    }

    pub fn description_from_annotation(&self, role: &dyn RoleDefinition) -> Result<String> {
        Ok(role_annotation_nn(role)?.description)
    }

    pub fn is_default_from_annotation(&self, role: &dyn RoleDefinition) -> Result<bool> {
        Ok(role_annotation_nn(role)?.is_default)
    }

    pub fn build_role_def(&self, role: &dyn RoleDefinition) -> Result<RoleDef> {
        let annotation = role_annotation_nn(role)?;
        let mut builder = RoleBuilder::create_role_with_type(annotation.role_type)
            .with_name(&annotation.name)
            .with_description(&annotation.description)
            .with_default(annotation.is_default);

        for method in role.methods() {
            for annotation in &method.annotations {
                if let Some(process) = self.processors.get(&annotation.kind()) {
                    builder = process(self, annotation, builder)?;
                }
            }
        }

        tracing::debug!(role = %annotation.name, owner = %role.owner(), "Compiled role definition");
        Ok(builder.build())
    }

    /// One compiled ledger of the role.
    pub fn build_permissions(&self, role: &dyn RoleDefinition, permission_type: PermissionType) -> Result<Permissions> {
        Ok(self.build_role_def(role)?.permissions(permission_type).clone())
    }
}

fn role_annotation_nn(role: &dyn RoleDefinition) -> Result<RoleAnnotation> {
    role.annotation()
        .ok_or_else(|| SecurityError::IllegalState("The class must have @Role annotation.".to_string()))
}

fn process_entity_access(
    compiler: &AnnotationRoleDefBuilder,
    annotation: &Annotation,
    mut builder: RoleBuilder,
) -> Result<RoleBuilder> {
    if let Annotation::EntityAccess { target, allow, deny } = annotation {
        let meta_class = compiler.metadata.class_nn(target)?;
        for operation in allow {
            builder = builder.with_entity_access_permission(meta_class, *operation, AccessOperation::Allow);
        }
        for operation in deny {
            builder = builder.with_entity_access_permission(meta_class, *operation, AccessOperation::Deny);
        }
    }
    Ok(builder)
}

fn process_entity_attribute_access(
    compiler: &AnnotationRoleDefBuilder,
    annotation: &Annotation,
    mut builder: RoleBuilder,
) -> Result<RoleBuilder> {
    if let Annotation::EntityAttributeAccess {
        target,
        allow,
        read_only,
        deny,
    } = annotation
    {
        let meta_class = compiler.metadata.class_nn(target)?;
        let grants = [
            (allow, EntityAttrAccess::Modify),
            (read_only, EntityAttrAccess::View),
            (deny, EntityAttrAccess::Deny),
        ];
        for (properties, access) in grants {
            for property in properties {
                builder = builder.with_entity_attr_access_permission(meta_class, property, access);
            }
        }
    }
    Ok(builder)
}

fn process_specific_access(
    _compiler: &AnnotationRoleDefBuilder,
    annotation: &Annotation,
    builder: RoleBuilder,
) -> Result<RoleBuilder> {
    match annotation {
        Annotation::SpecificAccess { target, access } => Ok(builder.with_specific_permission(target, *access)),
        _ => Ok(builder),
    }
}

fn process_screen_access(
    _compiler: &AnnotationRoleDefBuilder,
    annotation: &Annotation,
    mut builder: RoleBuilder,
) -> Result<RoleBuilder> {
    if let Annotation::ScreenAccess { allow, deny } = annotation {
        for screen in allow {
            builder = builder.with_screen_permission(screen, AccessOperation::Allow);
        }
        for screen in deny {
            builder = builder.with_screen_permission(screen, AccessOperation::Deny);
        }
    }
    Ok(builder)
}

fn process_screen_element_access(
    _compiler: &AnnotationRoleDefBuilder,
    annotation: &Annotation,
    mut builder: RoleBuilder,
) -> Result<RoleBuilder> {
    if let Annotation::ScreenElementAccess { screen, allow, deny } = annotation {
        for component in allow {
            builder = builder.with_screen_element_permission(screen, component, AccessOperation::Allow);
        }
        for component in deny {
            builder = builder.with_screen_element_permission(screen, component, AccessOperation::Deny);
        }
    }
    Ok(builder)
}
