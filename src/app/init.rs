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

use axum::{Router, extract::State, http::StatusCode, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::app::config::AppConfig;
use crate::app::database::{DatabaseMigrator, PgPoolManager};
use crate::audit::repository::{AuditRepository, PgAuditRepository};
use crate::auth::AuthModule;
use crate::auth::middleware::require_auth;
use crate::common::cache::{Cache, MokaCache};
use crate::events::outbox::{OutboxRepository, OutboxWorker, PgOutboxRepository};
use crate::events::subscribers::run_subscribers;
use crate::events::{EventBus, InProcessEventBus};
use crate::mediator::Mediator;
use crate::middleware::{RateLimiter, ResponseCache, correlation_id, cors_layer, not_found, performance_monitor, rate_limit, response_cache, security_headers};
use crate::tasks::TasksModule;
use crate::tenants::TenantsModule;
use crate::tenants::resolver::resolve_tenant;

/// Installs the global `tracing` subscriber. Must run once, before the first
/// tracing event -- call it at the very top of `main`.
pub fn init_subscriber() {
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(Level::INFO).finish())
        .expect("setting default subscriber failed");
}

pub struct Application {
    pub config: Arc<AppConfig>,
    pub router: Router,
}

/// Wires every module together, runs migrations, spawns the outbox worker
/// and event subscribers, and assembles the HTTP router with its ordered
/// middleware pipeline: `TraceLayer -> SecurityHeaders -> CORS ->
/// TenantResolver -> CorrelationId -> Authentication -> RateLimit ->
/// ResponseCache -> PerformanceMonitor -> Router`.
pub async fn init_default_app() -> anyhow::Result<Application> {
    let config = Arc::new(AppConfig::from_env()?);
    let pool_manager = Arc::new(PgPoolManager::new(config.database()).await?);
    pool_manager.migrate().await?;

    let pool = pool_manager.pool();
    let cache: Arc<dyn Cache> = Arc::new(MokaCache::new(config.cache()));

    let auth_module = Arc::new(AuthModule::new(&config, pool.clone())?);
    let tenants_module = Arc::new(TenantsModule::new(
        pool.clone(),
        cache.clone(),
        auth_module.access_tokens.clone(),
        config.server().apex_host().to_string(),
    ));

    let outbox: Arc<dyn OutboxRepository> = Arc::new(PgOutboxRepository::new(pool.clone()));
    let mediator = Arc::new(Mediator::new(pool.clone(), outbox.clone()));
    let tasks_module = Arc::new(TasksModule::new(pool.clone(), mediator));

    let event_bus: Arc<dyn EventBus> = Arc::new(InProcessEventBus::default());
    let audit: Arc<dyn AuditRepository> = Arc::new(PgAuditRepository::new(pool.clone()));

    tokio::spawn({
        let outbox = outbox.clone();
        let event_bus = event_bus.clone();
        let audit = audit.clone();
        async move {
            OutboxWorker::new(outbox, event_bus, audit, Duration::from_secs(2)).run().await;
        }
    });
    tokio::spawn({
        let event_bus = event_bus.clone();
        let cache = cache.clone();
        async move {
            run_subscribers(event_bus, cache).await;
        }
    });

    let rate_limiter = RateLimiter::new(cache.clone(), config.rate_limit().clone());
    let response_cache_layer = ResponseCache::new(cache.clone(), config.cache());

    let authenticated = Router::new()
        .merge(crate::tasks::routes::routes(tasks_module))
        .merge(crate::tenants::routes::routes(tenants_module.clone()))
        .route_layer(axum_middleware::from_fn(performance_monitor))
        .route_layer(axum_middleware::from_fn_with_state(response_cache_layer, response_cache))
        .route_layer(axum_middleware::from_fn_with_state(rate_limiter, rate_limit))
        .route_layer(axum_middleware::from_fn_with_state(auth_module.clone(), require_auth));

    let api_v1 = Router::new()
        .merge(crate::auth::routes::routes(auth_module))
        .merge(authenticated)
        .route_layer(axum_middleware::from_fn(correlation_id))
        .route_layer(axum_middleware::from_fn_with_state(tenants_module.resolver.clone(), resolve_tenant));

    let router = Router::new()
        .nest("/api/v1", api_v1)
        .route("/health", get(health))
        .route("/live", get(live))
        .route("/ready", get(ready))
        .fallback(not_found)
        .with_state(pool_manager)
        .layer(cors_layer(config.cors()))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http());

    info!(port = config.server().port(), "taskflow backend initialized");
    Ok(Application { config, router })
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn live() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(pool_manager): State<Arc<PgPoolManager>>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&pool_manager.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
