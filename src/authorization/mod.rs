/*
 * This file is part of the Taskflow backend.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */
use tracing::Level;
use uuid::Uuid;

use crate::common::context::RequestContext;
use crate::common::error::{ErrorCode, FriendlyError};

/// The built-in roles and the permissions each one carries by default.
/// `SYSTEM_ADMIN` is the only role granted the wildcard `*`; everyone else
/// gets an explicit, enumerable list. This table is the single source of
/// truth -- nothing elsewhere hardcodes a role's permissions.
pub fn default_permissions_for_role(role: &str) -> &'static [&'static str] {
    match role {
        "SYSTEM_ADMIN" => &["*"],
        "TENANT_ADMIN" => &[
            "tasks.read",
            "tasks.create",
            "tasks.update",
            "tasks.delete",
            "tasks.assign",
            "users.manage",
            "reports.view",
            "tenant.configure",
        ],
        "PROJECT_MANAGER" => &["tasks.read", "tasks.create", "tasks.update", "tasks.assign", "reports.view"],
        "MEMBER" => &["tasks.read", "tasks.create", "tasks.update.self"],
        "GUEST" => &["tasks.read"],
        _ => &[],
    }
}

/// Three AND-composed gates: does the caller hold the role, do they hold
/// the permission, and (for resource-scoped actions) do they own or
/// otherwise have standing over the specific resource. Every failure here
/// returns the same `Forbidden` shape regardless of which gate tripped, so
/// a caller probing permissions can't learn whether a resource exists.
pub struct Authorizer;

impl Authorizer {
    fn forbidden(loc: &'static str) -> FriendlyError {
        FriendlyError::user_facing(Level::DEBUG, ErrorCode::Forbidden, loc, "you do not have permission to perform this action")
    }

    pub fn require_role(ctx: &RequestContext, role: &str) -> Result<(), FriendlyError> {
        if ctx.has_role(role) {
            Ok(())
        } else {
            Err(Self::forbidden("authorization::role"))
        }
    }

    /// A role's wildcard permission (`*`) satisfies any check; otherwise the
    /// exact permission string must be present.
    pub fn require_permission(ctx: &RequestContext, permission: &str) -> Result<(), FriendlyError> {
        if ctx.permissions.contains("*") || ctx.has_permission(permission) {
            Ok(())
        } else {
            Err(Self::forbidden("authorization::permission"))
        }
    }

    /// A resource gate layered on top of the permission gate: the caller
    /// holds the unscoped permission, holds a tenant-wide admin role, or
    /// holds the `.self` variant and has standing over the resource --
    /// `standing_ids` is every identity that counts as "self" for this
    /// resource (e.g. a task's creator and its assignee), not just one.
    pub fn require_resource_access(
        ctx: &RequestContext,
        permission: &str,
        self_permission: &str,
        standing_ids: &[Option<Uuid>],
    ) -> Result<(), FriendlyError> {
        if ctx.permissions.contains("*") || ctx.has_permission(permission) {
            return Ok(());
        }
        if ctx.has_role("TENANT_ADMIN") || ctx.has_role("SYSTEM_ADMIN") {
            return Ok(());
        }
        if ctx.has_permission(self_permission) && ctx.user_id.is_some() && standing_ids.contains(&ctx.user_id) {
            return Ok(());
        }
        Err(Self::forbidden("authorization::resource"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ctx_with(roles: &[&str], permissions: &[&str], user_id: Uuid) -> RequestContext {
        RequestContext::new(Uuid::new_v4()).with_user(
            user_id,
            roles.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            permissions.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        )
    }

    #[test]
    fn wildcard_permission_satisfies_any_check() {
        let ctx = ctx_with(&["SYSTEM_ADMIN"], &["*"], Uuid::new_v4());
        assert!(Authorizer::require_permission(&ctx, "tasks.delete").is_ok());
    }

    #[test]
    fn self_permission_requires_ownership() {
        let user_id = Uuid::new_v4();
        let ctx = ctx_with(&["MEMBER"], &["tasks.update.self"], user_id);
        assert!(Authorizer::require_resource_access(&ctx, "tasks.update", "tasks.update.self", &[Some(user_id), None]).is_ok());
        assert!(Authorizer::require_resource_access(&ctx, "tasks.update", "tasks.update.self", &[Some(Uuid::new_v4()), None]).is_err());
    }

    #[test]
    fn self_permission_is_satisfied_by_any_standing_id() {
        let user_id = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let ctx = ctx_with(&["MEMBER"], &["tasks.update.self"], user_id);
        assert!(Authorizer::require_resource_access(&ctx, "tasks.update", "tasks.update.self", &[Some(creator), Some(user_id)]).is_ok());
    }

    #[test]
    fn tenant_admin_bypasses_the_self_check() {
        let ctx = ctx_with(&["TENANT_ADMIN"], &["tasks.read"], Uuid::new_v4());
        assert!(Authorizer::require_resource_access(&ctx, "tasks.update", "tasks.update.self", &[Some(Uuid::new_v4()), None]).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let ctx = ctx_with(&["GUEST"], &["tasks.read"], Uuid::new_v4());
        assert!(Authorizer::require_permission(&ctx, "tasks.delete").is_err());
    }
}
