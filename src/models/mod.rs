//! 数据模型模块
//! 权限、角色、访问组、实体元数据与动态实体

pub mod datatype;
pub mod declaration;
pub mod entity;
pub mod group;
pub mod metadata;
pub mod permission;
pub mod permissions;
pub mod role;

pub use datatype::{AttributeValue, DatatypeRegistry};
pub use entity::{Entity, EntityGraph, EntityId, EntityKey, Value};
pub use group::{EntityConstraint, GroupDef, GroupIdentifier, SetOfEntityConstraints};
pub use metadata::{MetaClass, MetaProperty, Metadata};
pub use permission::{AccessOperation, EntityAttrAccess, EntityOp, Permission, PermissionType};
pub use permissions::Permissions;
pub use role::{Role, RoleDef, RoleType, UserRole};
