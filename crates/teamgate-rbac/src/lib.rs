//! # Teamgate RBAC (Role-Based Access Control)
//!
//! This crate provides the static half of tenant access control: the roles a
//! principal can hold, the permissions those roles grant, and the hierarchy that
//! decides who may manage whom.
//!
//! ## Overview
//!
//! The teamgate-rbac crate handles:
//! - **Roles**: One global role (`SuperAdmin`) and the tenant-scoped roles
//!   `Admin`, `Marketer`, `Analyst` and `User`
//! - **Permissions**: Fine-grained capabilities such as `tenant:create_users`
//! - **Permission Sets**: Collections of permissions granted to a role
//! - **Role Catalog**: The immutable role table consulted by the authorization engine
//!
//! ## Architecture
//!
//! ```text
//! RoleCatalog (built once, shared by Arc)
//!   ├─ Role → PermissionSet
//!   └─ Role → hierarchy level
//!
//! Levels: user 0 < tenant_analyst 1 < tenant_marketer 2 < tenant_admin 3 < superadmin 10
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use teamgate_rbac::{Permission, Role, RoleCatalog};
//!
//! let catalog = RoleCatalog::standard();
//!
//! assert!(catalog.has_permission(Role::Admin, Permission::TenantCreateUsers));
//! assert!(!catalog.has_permission(Role::Analyst, Permission::TenantCreateUsers));
//!
//! // Management authority is strictly downward
//! assert!(catalog.can_manage(Role::Admin, Role::Marketer));
//! assert!(!catalog.can_manage(Role::Admin, Role::Admin));
//! ```
//!
//! ## Default Deny
//!
//! A role missing from the catalog grants nothing and has no level, so it can
//! neither hold a permission nor manage another role.

pub mod catalog;
pub mod permissions;
pub mod role;

// Re-export main types for convenience
pub use catalog::{RoleCatalog, RoleCatalogBuilder};
pub use permissions::{Permission, PermissionSet};
pub use role::Role;
