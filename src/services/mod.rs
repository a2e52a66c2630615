//! Security services layer

pub mod access_constraints_builder;
pub mod annotation_group_builder;
pub mod annotation_role_builder;
pub mod group_def_builder;
pub mod permission_service;
pub mod predefined;
pub mod role_builder;
pub mod roles_service;

pub use access_constraints_builder::AccessConstraintsBuilder;
pub use annotation_group_builder::AnnotationGroupDefBuilder;
pub use annotation_role_builder::AnnotationRoleDefBuilder;
pub use group_def_builder::GroupDefBuilder;
pub use permission_service::PermissionService;
pub use role_builder::RoleBuilder;
pub use roles_service::RolesService;
