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
use std::collections::HashSet;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::error::FriendlyError;

/// Per-request carrier of everything downstream code needs to know about
/// who is asking and which tenant they're asking on behalf of. Built by the
/// middleware pipeline (tenant resolution, then authentication) and never
/// constructed directly by a handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub roles: HashSet<String>,
    pub permissions: HashSet<String>,
    pub request_started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id: None,
            correlation_id: Uuid::new_v4(),
            roles: HashSet::new(),
            permissions: HashSet::new(),
            request_started_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid, roles: HashSet<String>, permissions: HashSet<String>) -> Self {
        self.user_id = Some(user_id);
        self.roles = roles;
        self.permissions = permissions;
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or_else(|| {
            FriendlyError::internal("common::context", "handler ran without a resolved request context").into_response()
        })
    }
}
