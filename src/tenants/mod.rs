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

use crate::auth::token_service::AccessTokenService;
use crate::common::cache::Cache;
use crate::tenants::repository::{PgTenantRepository, TenantRepository};
use crate::tenants::resolver::TenantResolver;
use crate::tenants::service::TenantService;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod resolver;
pub mod routes;
pub mod service;

pub struct TenantsModule {
    pub service: Arc<TenantService>,
    pub resolver: Arc<TenantResolver>,
}

impl TenantsModule {
    pub fn new(
        pool: sqlx::PgPool,
        cache: Arc<dyn Cache>,
        access_tokens: Arc<AccessTokenService>,
        apex_host: String,
    ) -> Self {
        let repository: Arc<dyn TenantRepository> = Arc::new(PgTenantRepository::new(pool));
        let service = Arc::new(TenantService::new(repository.clone()));
        let resolver = Arc::new(TenantResolver::new(repository, cache, access_tokens, apex_host));
        Self { service, resolver }
    }
}
