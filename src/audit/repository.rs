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

use crate::audit::model::AuditLogEntry;
use crate::common::error::RepositoryResult;
use crate::events::DomainEvent;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Keyed on the event's own `id`, so recording the same event twice (a
    /// worker restart replaying an undelivered outbox row) is a no-op the
    /// second time.
    async fn record_from_event(&self, event: &DomainEvent) -> RepositoryResult<()>;
    async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> RepositoryResult<Vec<AuditLogEntry>>;
}

pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn record_from_event(&self, event: &DomainEvent) -> RepositoryResult<()> {
        let actor_user_id = event
            .payload
            .get("actor_user_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let action = serde_json::to_value(event.event_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".to_string());

        sqlx::query(
            "INSERT INTO audit_log (id, tenant_id, actor_user_id, action, target_type, target_id, changes, created_at)
             VALUES ($1, $2, $3, $4, 'task', $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id)
        .bind(event.tenant_id)
        .bind(actor_user_id)
        .bind(action)
        .bind(event.aggregate_id)
        .bind(&event.payload)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> RepositoryResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM audit_log WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
