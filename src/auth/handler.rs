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
use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use crate::auth::AuthModule;
use crate::auth::dto::login::{
    LoginRequest, LogoutRequest, MfaVerifyRequest, RefreshRequest, RegisterRequest,
};
use crate::auth::middleware::AuthenticatedUser;
use crate::common::context::RequestContext;
use crate::common::dto::{ApiOkResponse, SimpleMessageResponse};
use crate::common::error::FriendlyError;
use crate::common::extractors::ValidJson;

pub async fn register(
    State(auth_module): State<Arc<AuthModule>>,
    ctx: RequestContext,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let user = auth_module
        .service
        .register(ctx.tenant_id, payload.email.as_str(), payload.password.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOkResponse::new(user, Utc::now()))))
}

pub async fn login(
    State(auth_module): State<Arc<AuthModule>>,
    ctx: RequestContext,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let resp = auth_module
        .service
        .login(
            ctx.tenant_id,
            payload.email.as_str(),
            &payload.password,
            payload.mfa_code.as_deref(),
        )
        .await?;
    Ok(Json(ApiOkResponse::new(resp, Utc::now())))
}

pub async fn refresh(
    State(auth_module): State<Arc<AuthModule>>,
    ValidJson(payload): ValidJson<RefreshRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let resp = auth_module.service.refresh(&payload.refresh_token).await?;
    Ok(Json(ApiOkResponse::new(resp, Utc::now())))
}

pub async fn logout(
    State(auth_module): State<Arc<AuthModule>>,
    ValidJson(payload): ValidJson<LogoutRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    auth_module.service.logout(&payload.refresh_token).await?;
    Ok(Json(ApiOkResponse::new(
        SimpleMessageResponse {
            message: "Logged out".to_string(),
        },
        Utc::now(),
    )))
}

pub async fn mfa_enroll(
    State(auth_module): State<Arc<AuthModule>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<impl IntoResponse, FriendlyError> {
    let resp = auth_module
        .service
        .mfa_enroll(claims.tenant_id, claims.sub)
        .await?;
    Ok(Json(ApiOkResponse::new(resp, Utc::now())))
}

pub async fn mfa_verify(
    State(auth_module): State<Arc<AuthModule>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidJson(payload): ValidJson<MfaVerifyRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    auth_module
        .service
        .mfa_verify_and_enable(claims.tenant_id, claims.sub, &payload.code)
        .await?;
    Ok(Json(ApiOkResponse::new(
        SimpleMessageResponse {
            message: "MFA enabled".to_string(),
        },
        Utc::now(),
    )))
}
