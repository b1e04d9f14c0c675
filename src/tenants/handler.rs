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

use crate::common::context::RequestContext;
use crate::common::dto::ApiOkResponse;
use crate::common::error::FriendlyError;
use crate::common::extractors::ValidJson;
use crate::tenants::TenantsModule;
use crate::tenants::dto::{CreateTenantRequest, UpdateTenantSettingsRequest};

pub async fn create(
    State(tenants): State<Arc<TenantsModule>>,
    ValidJson(payload): ValidJson<CreateTenantRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let tenant = tenants
        .service
        .create(&payload.name, &payload.subdomain, payload.max_users)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOkResponse::new(tenant, Utc::now()))))
}

pub async fn current(
    State(tenants): State<Arc<TenantsModule>>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, FriendlyError> {
    let tenant = tenants.service.get(ctx.tenant_id).await?;
    Ok(Json(ApiOkResponse::new(tenant, Utc::now())))
}

pub async fn update_settings(
    State(tenants): State<Arc<TenantsModule>>,
    ctx: RequestContext,
    ValidJson(payload): ValidJson<UpdateTenantSettingsRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    if !ctx.has_permission("tenant.configure") {
        return Err(crate::common::error::FriendlyError::user_facing(
            tracing::Level::DEBUG,
            crate::common::error::ErrorCode::Forbidden,
            "tenants::handler",
            "missing tenant.configure permission",
        ));
    }
    let tenant = tenants.service.update_settings(ctx.tenant_id, payload.settings).await?;
    Ok(Json(ApiOkResponse::new(tenant, Utc::now())))
}
