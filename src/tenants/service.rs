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

use tracing::Level;
use uuid::Uuid;

use crate::common::error::{ErrorCode, FriendlyError};
use crate::tenants::model::Tenant;
use crate::tenants::repository::TenantRepository;

pub struct TenantService {
    repository: Arc<dyn TenantRepository>,
}

impl TenantService {
    pub fn new(repository: Arc<dyn TenantRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, name: &str, subdomain: &str, max_users: i32) -> Result<Tenant, FriendlyError> {
        if self.repository.find_by_subdomain(subdomain).await?.is_some() {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::Conflict,
                "tenants::service",
                "subdomain is already taken",
            ));
        }
        Ok(self.repository.create(name, subdomain, max_users).await?)
    }

    pub async fn get(&self, tenant_id: Uuid) -> Result<Tenant, FriendlyError> {
        self.repository
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| FriendlyError::user_facing(Level::DEBUG, ErrorCode::NotFound, "tenants::service", "tenant not found"))
    }

    pub async fn update_settings(&self, tenant_id: Uuid, settings: serde_json::Value) -> Result<Tenant, FriendlyError> {
        Ok(self.repository.update_settings(tenant_id, settings).await?)
    }
}
