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
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Level;
use uuid::Uuid;

use crate::auth::token_service::AccessTokenService;
use crate::common::cache::{Cache, subdomain_key};
use crate::common::context::RequestContext;
use crate::common::error::{ErrorCode, FriendlyError};
use crate::tenants::repository::TenantRepository;

const SUBDOMAIN_CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolves which tenant a request belongs to from up to three signals: the
/// `X-Tenant-ID` header, the request host's subdomain, and (if a bearer
/// token is present and verifies) the access token's `tenant_id` claim.
///
/// Precedence when exactly one signal is present: header, then subdomain,
/// then claim. When more than one is present they must all agree, or the
/// request is rejected -- this runs before authentication, so a forged
/// header can't be used to smuggle a request into a different tenant than
/// the one its token was minted for.
pub struct TenantResolver {
    repository: Arc<dyn TenantRepository>,
    cache: Arc<dyn Cache>,
    access_tokens: Arc<AccessTokenService>,
    apex_host: String,
}

impl TenantResolver {
    pub fn new(
        repository: Arc<dyn TenantRepository>,
        cache: Arc<dyn Cache>,
        access_tokens: Arc<AccessTokenService>,
        apex_host: String,
    ) -> Self {
        Self {
            repository,
            cache,
            access_tokens,
            apex_host,
        }
    }

    fn header_signal(&self, headers: &HeaderMap) -> Option<Uuid> {
        headers
            .get("X-Tenant-ID")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    fn subdomain_of(&self, headers: &HeaderMap) -> Option<String> {
        let host = headers.get(axum::http::header::HOST)?.to_str().ok()?;
        let host = host.split(':').next().unwrap_or(host);
        let suffix = format!(".{}", self.apex_host);
        host.strip_suffix(&suffix).map(|s| s.to_string())
    }

    async fn subdomain_signal(&self, headers: &HeaderMap) -> RepositoryResultOption {
        let Some(subdomain) = self.subdomain_of(headers) else {
            return Ok(None);
        };
        let key = subdomain_key(&subdomain);
        if let Some(cached) = self.cache.get(&key).await
            && let Ok(id) = Uuid::parse_str(&cached)
        {
            return Ok(Some(id));
        }
        let tenant = self.repository.find_by_subdomain(&subdomain).await?;
        if let Some(tenant) = &tenant {
            self.cache.set(&key, tenant.id.to_string(), SUBDOMAIN_CACHE_TTL).await;
        }
        Ok(tenant.map(|t| t.id))
    }

    fn claim_signal(&self, headers: &HeaderMap) -> Option<Uuid> {
        let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.access_tokens.verify(token).ok().map(|claims| claims.tenant_id)
    }
}

type RepositoryResultOption = crate::common::error::RepositoryResult<Option<Uuid>>;

pub async fn resolve_tenant(
    State(resolver): State<Arc<TenantResolver>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let headers = req.headers().clone();

    let header_tid = resolver.header_signal(&headers);
    let subdomain_tid = resolver.subdomain_signal(&headers).await.map_err(|e| {
        FriendlyError::internal("tenants::resolver", format!("subdomain lookup failed: {e}")).into_response()
    })?;
    let claim_tid = resolver.claim_signal(&headers);

    let signals: Vec<Uuid> = [header_tid, subdomain_tid, claim_tid].into_iter().flatten().collect();

    let tenant_id = match signals.as_slice() {
        [] => {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::ValidationError,
                "tenants::resolver",
                "no tenant could be identified for this request",
            )
            .into_response());
        }
        [single] => *single,
        multiple => {
            if multiple.iter().all(|id| id == &multiple[0]) {
                multiple[0]
            } else {
                return Err(FriendlyError::user_facing(
                    Level::WARN,
                    ErrorCode::TenantMismatch,
                    "tenants::resolver",
                    "conflicting tenant signals on request",
                )
                .into_response());
            }
        }
    };

    let tenant = resolver
        .repository
        .find_by_id(tenant_id)
        .await
        .map_err(|e| FriendlyError::internal("tenants::resolver", format!("tenant lookup failed: {e}")).into_response())?;

    match tenant {
        Some(tenant) if tenant.is_active => {
            req.extensions_mut().insert(RequestContext::new(tenant.id));
            Ok(next.run(req).await)
        }
        Some(_) => Err(FriendlyError::user_facing(Level::DEBUG, ErrorCode::Forbidden, "tenants::resolver", "tenant is suspended").into_response()),
        None => Err(FriendlyError::user_facing(Level::DEBUG, ErrorCode::NotFound, "tenants::resolver", "unknown tenant").into_response()),
    }
}
