//! Authorization module - roles, policy registry and evaluator
//!
//! This module implements project-scoped RBAC:
//! - A closed set of project roles
//! - A declarative (resource kind, operation) -> permitted roles table
//! - Membership lookup as the single source of a caller's role
//! - Deny-by-default evaluation, recomputed on every request

mod evaluator;
mod membership;
mod principal;
mod registry;

pub use evaluator::{decide, MembershipEvaluator, PermissionEvaluator};
#[cfg(test)]
pub use membership::InMemoryMembershipStore;
pub use membership::MembershipStore;
pub use principal::Identity;
pub use registry::{RoleRegistry, RoleSet};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Role a user holds inside one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(rename = "project_admin")]
    Admin,
    #[serde(rename = "annotation_approver")]
    Approver,
    Annotator,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Approver, Role::Annotator]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "project_admin",
            Role::Approver => "annotation_approver",
            Role::Annotator => "annotator",
        }
    }

    /// Parses a role name read back from storage. An unknown name there is a
    /// data fault, not a client error.
    pub fn from_stored(value: &str) -> Result<Role, AppError> {
        value
            .parse::<Role>()
            .map_err(|_| AppError::internal(format!("stored membership has unknown role '{value}'")))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| AppError::bad_request(format!("unknown role: {value}")))
    }
}

/// Kinds of project-owned resources guarded by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Project,
    Member,
    Tag,
}

impl ResourceKind {
    pub fn all() -> &'static [ResourceKind] {
        &[ResourceKind::Project, ResourceKind::Member, ResourceKind::Tag]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Member => "member",
            ResourceKind::Tag => "tag",
        }
    }

    /// Operations each kind exposes; the registry must declare every one.
    pub fn operations(&self) -> &'static [Operation] {
        match self {
            ResourceKind::Project => &[Operation::Retrieve, Operation::Delete],
            ResourceKind::Member => &[
                Operation::List,
                Operation::Create,
                Operation::Update,
                Operation::Delete,
            ],
            ResourceKind::Tag => &[
                Operation::List,
                Operation::Retrieve,
                Operation::Create,
                Operation::Delete,
            ],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Retrieve => "retrieve",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a permission check. There is no partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}
