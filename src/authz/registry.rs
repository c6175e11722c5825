use std::collections::{BTreeMap, BTreeSet};

use super::{Operation, ResourceKind, Role};
use crate::errors::AppError;

pub type RoleSet = BTreeSet<Role>;

/// Declarative policy table: which roles may perform each operation on each
/// resource kind. Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    policies: BTreeMap<(ResourceKind, Operation), RoleSet>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        use Operation::*;
        use ResourceKind::*;

        let any_member = [Role::Admin, Role::Approver, Role::Annotator];
        let admin_only = [Role::Admin];

        Self::empty()
            .declare(Project, Retrieve, any_member)
            .declare(Project, Delete, admin_only)
            .declare(Member, List, any_member)
            .declare(Member, Create, admin_only)
            .declare(Member, Update, admin_only)
            .declare(Member, Delete, admin_only)
            .declare(Tag, List, any_member)
            .declare(Tag, Retrieve, any_member)
            .declare(Tag, Create, admin_only)
            .declare(Tag, Delete, admin_only)
    }
}

impl RoleRegistry {
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    pub fn declare(
        mut self,
        kind: ResourceKind,
        operation: Operation,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        self.policies.insert((kind, operation), roles.into_iter().collect());
        self
    }

    /// Default policy with `AUTHZ_<KIND>_<OPERATION>_ROLES` overrides from the
    /// process environment, validated for completeness.
    pub fn from_env() -> Result<Self, AppError> {
        let registry = Self::default().with_overrides(std::env::vars())?;
        registry.ensure_complete()?;
        Ok(registry)
    }

    /// Applies overrides from `(key, value)` pairs. Keys that do not start with
    /// `AUTHZ_` and end with `_ROLES` are ignored.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(pair) = key
                .strip_prefix("AUTHZ_")
                .and_then(|rest| rest.strip_suffix("_ROLES"))
            else {
                continue;
            };

            let (kind, operation) = Self::parse_pair(pair)
                .ok_or_else(|| AppError::configuration(format!("{key} names an undeclared operation")))?;

            let roles = value
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| {
                    name.parse::<Role>()
                        .map_err(|_| AppError::configuration(format!("{key}: unknown role '{name}'")))
                })
                .collect::<Result<RoleSet, _>>()?;

            if roles.is_empty() {
                return Err(AppError::configuration(format!("{key} must name at least one role")));
            }

            tracing::info!(%kind, %operation, roles = ?roles, "policy override applied");
            self.policies.insert((kind, operation), roles);
        }

        Ok(self)
    }

    fn parse_pair(pair: &str) -> Option<(ResourceKind, Operation)> {
        ResourceKind::all().iter().find_map(|kind| {
            kind.operations()
                .iter()
                .find(|op| {
                    pair.eq_ignore_ascii_case(&format!("{}_{}", kind.as_str(), op.as_str()))
                })
                .map(|op| (*kind, *op))
        })
    }

    /// Permitted roles for `(kind, operation)`. An undeclared pair is a
    /// programming fault, reported as `Configuration`.
    pub fn permitted_roles(&self, kind: ResourceKind, operation: Operation) -> Result<&RoleSet, AppError> {
        self.policies.get(&(kind, operation)).ok_or_else(|| {
            AppError::configuration(format!("no policy declared for {kind}.{operation}"))
        })
    }

    /// Fails if any operation a resource kind exposes has no declared policy.
    pub fn ensure_complete(&self) -> Result<(), AppError> {
        for kind in ResourceKind::all() {
            for operation in kind.operations() {
                self.permitted_roles(*kind, *operation)?;
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, Operation, &RoleSet)> {
        self.policies.iter().map(|((kind, op), roles)| (*kind, *op, roles))
    }
}
