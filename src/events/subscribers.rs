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

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::common::cache::{Cache, tenant_key};
use crate::events::{DomainEvent, EventBus, EventType};

/// Invalidates the response cache for whatever the event touched. Keyed on
/// `tenant:{tenant_id}:task:{aggregate_id}*` so a stale read can never
/// outlive the write that caused it by more than one cache TTL window.
pub struct CacheInvalidationSubscriber {
    cache: Arc<dyn Cache>,
}

impl CacheInvalidationSubscriber {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    async fn handle(&self, event: &DomainEvent) {
        match event.event_type {
            EventType::TaskCreated | EventType::TaskUpdated | EventType::TaskAssigned | EventType::TaskStatusChanged | EventType::TaskDeleted | EventType::TaskCommentAdded => {
                let prefix = tenant_key(event.tenant_id, &format!("task:{}", event.aggregate_id));
                self.cache.delete_by_pattern(&prefix).await;
            }
            EventType::TenantSettingsUpdated => {
                self.cache.delete_by_pattern(&tenant_key(event.tenant_id, "")).await;
            }
            _ => {}
        }
    }
}

/// Drives the best-effort subscribers off the bus for as long as the process
/// runs. A lagged receiver (subscriber fell behind the ring buffer) just logs
/// and resumes from the next available event -- the outbox only publishes
/// here once the durable audit write has already succeeded, so nothing on
/// this bus is load-bearing for delivery. A lagged or missed cache
/// invalidation just means a read serves a stale cached entry until its TTL
/// expires, never a torn write.
pub async fn run_subscribers(event_bus: Arc<dyn EventBus>, cache: Arc<dyn Cache>) {
    let cache_subscriber = CacheInvalidationSubscriber::new(cache);
    let mut receiver = event_bus.subscribe();

    loop {
        match receiver.recv().await {
            Ok(event) => {
                debug!(event_id = %event.id, event_type = ?event.event_type, "dispatching event to subscribers");
                cache_subscriber.handle(&event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("event subscriber lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
