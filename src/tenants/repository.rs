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
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::RepositoryResult;
use crate::tenants::model::Tenant;

/// Tenants are looked up by subdomain (unauthenticated, during resolution)
/// and by id (everywhere else); there is no tenant-scoped `WHERE` clause
/// here because a tenant row has no owning tenant of its own.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid) -> RepositoryResult<Option<Tenant>>;
    async fn find_by_subdomain(&self, subdomain: &str) -> RepositoryResult<Option<Tenant>>;
    async fn create(
        &self,
        name: &str,
        subdomain: &str,
        max_users: i32,
    ) -> RepositoryResult<Tenant>;
    async fn update_settings(&self, tenant_id: Uuid, settings: serde_json::Value) -> RepositoryResult<Tenant>;
}

pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, tenant_id: Uuid) -> RepositoryResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> RepositoryResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE subdomain = $1")
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn create(&self, name: &str, subdomain: &str, max_users: i32) -> RepositoryResult<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, subdomain, subscription_plan, max_users, is_active, settings)
             VALUES (gen_random_uuid(), $1, $2, 'BASIC', $3, true, '{}'::jsonb)
             RETURNING *",
        )
        .bind(name)
        .bind(subdomain)
        .bind(max_users)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn update_settings(&self, tenant_id: Uuid, settings: serde_json::Value) -> RepositoryResult<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE tenants SET settings = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(tenant_id)
        .bind(settings)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }
}
