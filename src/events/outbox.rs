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

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use chrono::{DateTime, Utc};
use sqlx::prelude::FromRow;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, warn};
use uuid::Uuid;

use crate::audit::repository::AuditRepository;
use crate::common::error::RepositoryResult;
use crate::events::{DomainEvent, EventBus, EventType};

const MAX_ATTEMPTS: i32 = 10;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct NewOutboxEvent {
    pub event_type: EventType,
    pub aggregate_id: Uuid,
    pub tenant_id: Uuid,
    pub payload: serde_json::Value,
}

#[derive(FromRow, Debug, Clone)]
pub struct OutboxRow {
    pub id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub tenant_id: Uuid,
    pub payload: serde_json::Value,
    pub version: i32,
    pub occurred_at: DateTime<Utc>,
    pub attempts: i32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub dead_lettered: bool,
    pub next_attempt_at: DateTime<Utc>,
}

impl OutboxRow {
    fn event_type(&self) -> Option<EventType> {
        serde_json::from_value(serde_json::Value::String(self.event_type.clone())).ok()
    }

    pub fn into_domain_event(&self) -> Option<DomainEvent> {
        Some(DomainEvent {
            id: self.id,
            event_type: self.event_type()?,
            aggregate_id: self.aggregate_id,
            tenant_id: self.tenant_id,
            payload: self.payload.clone(),
            version: self.version,
            occurred_at: self.occurred_at,
        })
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn insert_in_tx(&self, tx: &mut Transaction<'_, Postgres>, event: NewOutboxEvent) -> RepositoryResult<()>;
    /// Rows ready to retry, ordered by `occurred_at` within each aggregate so
    /// a subscriber never sees e.g. `TaskStatusChanged` before `TaskCreated`.
    async fn fetch_pending(&self, limit: i64) -> RepositoryResult<Vec<OutboxRow>>;
    async fn mark_delivered(&self, id: Uuid) -> RepositoryResult<()>;
    async fn mark_failed(&self, id: Uuid, next_attempt_at: DateTime<Utc>, dead_letter: bool) -> RepositoryResult<()>;
}

pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn insert_in_tx(&self, tx: &mut Transaction<'_, Postgres>, event: NewOutboxEvent) -> RepositoryResult<()> {
        let event_type = serde_json::to_value(event.event_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        sqlx::query(
            "INSERT INTO outbox (
                id, event_type, aggregate_id, tenant_id, payload, version, occurred_at,
                attempts, delivered_at, dead_lettered, next_attempt_at
             )
             VALUES (gen_random_uuid(), $1, $2, $3, $4, 1, now(), 0, NULL, false, now())",
        )
        .bind(event_type)
        .bind(event.aggregate_id)
        .bind(event.tenant_id)
        .bind(event.payload)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> RepositoryResult<Vec<OutboxRow>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT * FROM outbox
             WHERE delivered_at IS NULL AND dead_lettered = false AND next_attempt_at <= now()
             ORDER BY aggregate_id, occurred_at
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_delivered(&self, id: Uuid) -> RepositoryResult<()> {
        sqlx::query("UPDATE outbox SET delivered_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, next_attempt_at: DateTime<Utc>, dead_letter: bool) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, next_attempt_at = $2, dead_lettered = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(dead_letter)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn backoff_for(attempts: i32) -> Duration {
    let exp = attempts.clamp(0, 6) as u32;
    (BASE_BACKOFF * 2u32.pow(exp)).min(MAX_BACKOFF)
}

/// Polls the outbox table and delivers anything due for (re)delivery. A row
/// only counts as delivered once the durable subscriber (the audit log) has
/// actually accepted it; the in-process bus publish, by contrast, is
/// best-effort fan-out for cache invalidation and never gates delivery. A
/// row that fails `MAX_ATTEMPTS` times is dead-lettered rather than retried
/// forever, so a permanently-broken subscriber can't wedge the poller on one
/// event.
pub struct OutboxWorker {
    repository: Arc<dyn OutboxRepository>,
    event_bus: Arc<dyn EventBus>,
    audit: Arc<dyn AuditRepository>,
    poll_interval: Duration,
    batch_size: i64,
}

impl OutboxWorker {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        event_bus: Arc<dyn EventBus>,
        audit: Arc<dyn AuditRepository>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            repository,
            event_bus,
            audit,
            poll_interval,
            batch_size: 100,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!("outbox poll failed: {e}");
            }
        }
    }

    /// A row is marked delivered only after [`AuditRepository::record_from_event`]
    /// actually succeeds. A failure there (or a row that can't be decoded)
    /// takes the same backoff/dead-letter path, so a broken audit sink
    /// retries and eventually dead-letters instead of silently losing rows.
    pub async fn poll_once(&self) -> RepositoryResult<()> {
        for row in self.repository.fetch_pending(self.batch_size).await? {
            let Some(event) = row.into_domain_event() else {
                if row.attempts + 1 >= MAX_ATTEMPTS {
                    warn!(outbox_id = %row.id, "dead-lettering outbox row after exhausting retries");
                    self.repository.mark_failed(row.id, Utc::now(), true).await?;
                } else {
                    warn!(outbox_id = %row.id, attempts = row.attempts + 1, "could not decode outbox row, scheduling retry");
                    self.repository.mark_failed(row.id, retry_delay(row.attempts), false).await?;
                }
                continue;
            };

            if let Err(e) = self.audit.record_from_event(&event).await {
                if row.attempts + 1 >= MAX_ATTEMPTS {
                    warn!(outbox_id = %row.id, error = %e, "dead-lettering outbox row after exhausting retries");
                    self.repository.mark_failed(row.id, Utc::now(), true).await?;
                } else {
                    warn!(outbox_id = %row.id, attempts = row.attempts + 1, error = %e, "audit subscriber failed, scheduling retry");
                    self.repository.mark_failed(row.id, retry_delay(row.attempts), false).await?;
                }
                continue;
            }

            self.event_bus.publish(event);
            self.repository.mark_delivered(row.id).await?;
        }
        Ok(())
    }
}

fn retry_delay(attempts: i32) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(backoff_for(attempts)).unwrap_or(chrono::Duration::seconds(60))
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::audit::repository::MockAuditRepository;
    use crate::common::error::RepositoryError;

    struct NoopEventBus;
    impl EventBus for NoopEventBus {
        fn publish(&self, _event: DomainEvent) {}
        fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DomainEvent> {
            tokio::sync::broadcast::channel(1).1
        }
    }

    fn sample_row() -> OutboxRow {
        OutboxRow {
            id: Uuid::new_v4(),
            event_type: "TaskCreated".to_string(),
            aggregate_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            payload: serde_json::json!({}),
            version: 1,
            occurred_at: Utc::now(),
            attempts: 0,
            delivered_at: None,
            dead_lettered: false,
            next_attempt_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn marks_delivered_only_after_the_audit_write_succeeds() {
        let row = sample_row();
        let row_id = row.id;

        let mut repository = MockOutboxRepository::new();
        repository.expect_fetch_pending().returning(move |_| Ok(vec![row.clone()]));
        repository.expect_mark_delivered().with(eq(row_id)).times(1).returning(|_| Ok(()));

        let mut audit = MockAuditRepository::new();
        audit.expect_record_from_event().times(1).returning(|_| Ok(()));

        let worker = OutboxWorker::new(Arc::new(repository), Arc::new(NoopEventBus), Arc::new(audit), Duration::from_secs(1));
        worker.poll_once().await.unwrap();
    }

    #[tokio::test]
    async fn schedules_a_retry_instead_of_delivering_when_the_audit_write_fails() {
        let row = sample_row();
        let row_id = row.id;

        let mut repository = MockOutboxRepository::new();
        repository.expect_fetch_pending().returning(move |_| Ok(vec![row.clone()]));
        repository
            .expect_mark_failed()
            .withf(move |id: &Uuid, _next_attempt_at: &DateTime<Utc>, dead_letter: &bool| *id == row_id && !*dead_letter)
            .times(1)
            .returning(|_, _, _| Ok(()));
        repository.expect_mark_delivered().times(0);

        let mut audit = MockAuditRepository::new();
        audit
            .expect_record_from_event()
            .times(1)
            .returning(|_| Err(RepositoryError::Custom("audit sink down".to_string())));

        let worker = OutboxWorker::new(Arc::new(repository), Arc::new(NoopEventBus), Arc::new(audit), Duration::from_secs(1));
        worker.poll_once().await.unwrap();
    }
}
