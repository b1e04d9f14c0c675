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
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache as MokaSyncCache;
use tracing::warn;

use crate::app::config::CacheConfig;

/// Namespaced key-value store with TTL and prefix invalidation. Every key a
/// caller passes in is already namespaced (`tenant:{tenant_id}:...`); this
/// trait does not add the prefix itself, it only stores and expires it.
///
/// A cache miss or write failure here must never fail the request: this is
/// explicitly not on the correctness-critical path (isolation and
/// authorization never rely on it).
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    async fn delete_by_pattern(&self, prefix: &str);
    /// Atomically increments the counter at `key`, creating it with a fresh
    /// `ttl` if absent, and returns the post-increment value. Used by the
    /// rate limiter's sliding-window counters.
    async fn incr(&self, key: &str, ttl: Duration) -> i64;
}

struct Entry {
    value: String,
    counter: Option<Arc<AtomicI64>>,
}

pub struct MokaCache {
    inner: MokaSyncCache<String, Entry>,
}

impl MokaCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: MokaSyncCache::builder()
                .max_capacity(config.max_capacity())
                .build(),
        }
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|e| e.value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                counter: None,
            },
        );
        let inner = self.inner.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            inner.invalidate(&key);
        });
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key);
    }

    async fn delete_by_pattern(&self, prefix: &str) {
        let prefix = prefix.to_string();
        for key in self.inner.iter().map(|(k, _)| k) {
            if key.starts_with(prefix.as_str()) {
                self.inner.invalidate(&key);
            }
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> i64 {
        let counter = match self.inner.get(key) {
            Some(entry) if entry.counter.is_some() => entry.counter.unwrap(),
            _ => {
                let counter = Arc::new(AtomicI64::new(0));
                self.inner.insert(
                    key.to_string(),
                    Entry {
                        value: String::new(),
                        counter: Some(counter.clone()),
                    },
                );
                let inner = self.inner.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(ttl).await;
                    inner.invalidate(&key);
                });
                counter
            }
        };
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Used when no cache backend is configured; every read is a miss and every
/// write is dropped. Matches the documented "cache must never be on a
/// correctness-critical path" behavior by construction.
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) {
        warn!("cache write dropped: no cache backend configured");
    }

    async fn delete(&self, _key: &str) {}

    async fn delete_by_pattern(&self, _prefix: &str) {}

    async fn incr(&self, _key: &str, _ttl: Duration) -> i64 {
        1
    }
}

pub fn tenant_key(tenant_id: uuid::Uuid, rest: &str) -> String {
    format!("tenant:{tenant_id}:{rest}")
}

pub fn subdomain_key(subdomain: &str) -> String {
    format!("tenant:subdomain:{subdomain}")
}
