//! Role and group repository layer

pub mod group_store;
pub mod groups_repository;
pub mod role_store;
pub mod roles_repository;

pub use group_store::{GroupStore, InMemoryGroupStore, PgGroupStore};
pub use groups_repository::{BasicGroupsRepository, GroupRegistry};
pub use role_store::{InMemoryRoleStore, PgRoleStore, RoleStore};
pub use roles_repository::{RoleIndex, RoleIndexBuilder, RolesRepository};
