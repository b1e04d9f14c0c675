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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod outbox;
pub mod subscribers;

/// The canonical set of things that happen in this system. A subscriber
/// that only cares about task activity matches on the `Task*` variants and
/// ignores the rest; the outbox worker doesn't need to know this list at
/// all, it only moves `DomainEvent` payloads around as opaque JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    UserRegistered,
    UserLoggedIn,
    PasswordChanged,
    MfaEnabled,
    TenantCreated,
    TenantSettingsUpdated,
    TaskCreated,
    TaskUpdated,
    TaskAssigned,
    TaskStatusChanged,
    TaskDeleted,
    TaskCommentAdded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub aggregate_id: Uuid,
    pub tenant_id: Uuid,
    pub payload: serde_json::Value,
    pub version: i32,
    pub occurred_at: DateTime<Utc>,
}

/// The in-process side of event delivery. Cheap, synchronous, at-most-once:
/// a subscriber that's slow or down at publish time simply misses the
/// event. Cross-process/durable delivery is the outbox's job, not this
/// bus's -- the outbox worker publishes onto this same bus once a row is
/// picked up, so in-process subscribers see events from both paths
/// uniformly.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: DomainEvent);
    fn subscribe(&self) -> broadcast::Receiver<DomainEvent>;
}

pub struct InProcessEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl InProcessEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for InProcessEventBus {
    fn publish(&self, event: DomainEvent) {
        // No active subscribers is a normal steady state, not an error.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}
