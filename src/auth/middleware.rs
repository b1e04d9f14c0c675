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
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use tracing::Level;

use crate::auth::AuthModule;
use crate::auth::dto::claims::Claims;
use crate::common::context::RequestContext;
use crate::common::error::{ErrorCode, FriendlyError};

/// Verifies the bearer access token and merges its claims into the
/// `RequestContext` built by tenant resolution. Runs after the tenant
/// resolver in the pipeline; rejects if the token's `tenant_id` doesn't
/// match the tenant the request was already resolved against.
pub async fn require_auth(
    State(auth_module): State<Arc<AuthModule>>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let claims = auth_module.access_tokens.verify(bearer.token()).map_err(|_| {
        FriendlyError::user_facing(
            Level::DEBUG,
            ErrorCode::InvalidToken,
            "auth::middleware",
            "Invalid or expired access token",
        )
        .into_response()
    })?;

    let ctx = req.extensions().get::<RequestContext>().cloned().ok_or_else(|| {
        FriendlyError::internal("auth::middleware", "tenant resolver did not run before auth").into_response()
    })?;

    if ctx.tenant_id != claims.tenant_id {
        return Err(FriendlyError::user_facing(
            Level::WARN,
            ErrorCode::TenantMismatch,
            "auth::middleware",
            "Token does not belong to this tenant",
        )
        .into_response());
    }

    let roles: HashSet<String> = claims.roles.iter().cloned().collect();
    let permissions: HashSet<String> = claims.permissions.iter().cloned().collect();
    let ctx = ctx.with_user(claims.sub, roles, permissions);

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

pub struct AuthenticatedUser(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::Unauthenticated,
                    "auth::middleware",
                    "Missing authentication",
                )
                .into_response()
            })
    }
}
