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
//! The ordered middleware pipeline applied in `app::init`:
//! `TraceLayer -> SecurityHeaders -> CORS -> TenantResolver -> CorrelationId ->
//! Authentication -> RateLimit -> ResponseCache -> PerformanceMonitor -> Router`.
//! CORS sits outermost, ahead of tenant resolution and auth, so a preflight
//! `OPTIONS` request (no `Authorization` header, no tenant signal) is
//! answered without ever reaching those gates. Tenant resolution and
//! authentication live in `tenants::resolver` and `auth::middleware`; this
//! module carries the rest of the ambient stack.
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{Level, warn};

use crate::app::config::{CacheConfig, CorsConfig, RateLimitConfig};
use crate::common::cache::Cache;
use crate::common::context::RequestContext;
use crate::common::error::{ErrorCode, FriendlyError};

/// Response body size above which `ResponseCache` gives up buffering it.
const MAX_CACHEABLE_BODY_BYTES: usize = 64 * 1024;

/// Adds the fixed set of defensive headers every response carries,
/// regardless of route or outcome.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert("content-security-policy", HeaderValue::from_static("default-src 'self'"));
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    res
}

/// Stamps every response with `x-correlation-id` from the request's
/// [`RequestContext`], and rewrites an error response's `metadata.correlation_id`
/// to match it. `FriendlyError::into_response` has no access to the request
/// it's answering and mints its own id as a placeholder; this is the one
/// place a client's `x-correlation-id` is guaranteed to match what ends up
/// correlated against server logs for that request. A no-op when the
/// request never resolved a tenant (no `RequestContext` to correlate to).
pub async fn correlation_id(req: Request, next: Next) -> Response {
    let Some(correlation_id) = req.extensions().get::<RequestContext>().map(|ctx| ctx.correlation_id) else {
        return next.run(req).await;
    };
    let mut res = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
        res.headers_mut().insert("x-correlation-id", header_value);
    }

    if res.status().is_success() {
        return res;
    }

    let (parts, body) = res.into_parts();
    let bytes = match to_bytes(body, MAX_CACHEABLE_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };
    let rewritten = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut json) => {
            if let Some(metadata) = json.get_mut("metadata").and_then(|m| m.as_object_mut()) {
                metadata.insert("correlation_id".to_string(), serde_json::Value::String(correlation_id.to_string()));
            }
            serde_json::to_vec(&json).unwrap_or_else(|_| bytes.to_vec())
        }
        Err(_) => bytes.to_vec(),
    };
    Response::from_parts(parts, Body::from(rewritten))
}

pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>, config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self { cache, config })
    }
}

/// Sliding-window counter keyed on tenant, route, and caller identity (the
/// authenticated user if the request made it past `require_auth`, else the
/// peer address). Every request that doesn't resolve a tenant yet (the
/// pre-tenant-resolution health checks, for instance) is exempt.
pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Result<Response, Response> {
    let Some(ctx) = req.extensions().get::<RequestContext>().cloned() else {
        return Ok(next.run(req).await);
    };
    let identity = ctx.user_id.map(|id| id.to_string()).unwrap_or_else(|| "anonymous".to_string());
    let key = format!("rl:{}:{}:{}", ctx.tenant_id, req.uri().path(), identity);
    let count = limiter.cache.incr(&key, Duration::from_secs(limiter.config.window_secs())).await;

    if count > limiter.config.max_requests() {
        warn!(tenant_id = %ctx.tenant_id, path = req.uri().path(), "rate limit exceeded");
        return Err(FriendlyError::user_facing(
            Level::WARN,
            ErrorCode::RateLimited,
            "middleware::rate_limit",
            "too many requests, slow down",
        )
        .into_response());
    }
    Ok(next.run(req).await)
}

pub struct ResponseCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(cache: Arc<dyn Cache>, config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            cache,
            ttl: Duration::from_secs(config.default_ttl_secs()),
        })
    }

    fn key(tenant_id: uuid::Uuid, req: &Request) -> String {
        format!("respcache:{tenant_id}:{}:{}", req.uri().path(), req.uri().query().unwrap_or(""))
    }
}

/// Caches whole `GET` response bodies per tenant. Never consulted for
/// anything but `GET`: mutating requests always run the handler, and a
/// cache miss or a body over [`MAX_CACHEABLE_BODY_BYTES`] just skips caching
/// rather than failing the request -- this is explicitly not on the
/// correctness-critical path.
pub async fn response_cache(State(rc): State<Arc<ResponseCache>>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<RequestContext>().cloned() else {
        return next.run(req).await;
    };
    if req.method() != Method::GET {
        return next.run(req).await;
    }
    let key = ResponseCache::key(ctx.tenant_id, &req);

    if let Some(cached) = rc.cache.get(&key).await {
        return Response::builder()
            .status(200)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-cache", "HIT")
            .body(Body::from(cached))
            .unwrap_or_else(|_| (axum::http::StatusCode::OK).into_response());
    }

    let res = next.run(req).await;
    if res.status().is_success() {
        let (parts, body) = res.into_parts();
        let bytes = match to_bytes(body, MAX_CACHEABLE_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => return Response::from_parts(parts, Body::empty()),
        };
        if let Ok(text) = std::str::from_utf8(&bytes) {
            rc.cache.set(&key, text.to_string(), rc.ttl).await;
        }
        Response::from_parts(parts, Body::from(bytes))
    } else {
        res
    }
}

/// Stamps every response with `x-response-time-ms` and logs requests slower
/// than 500ms at WARN so a regression shows up without a metrics backend.
pub async fn performance_monitor(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;
    let elapsed = started.elapsed();
    if elapsed > Duration::from_millis(500) {
        warn!(%method, %path, elapsed_ms = elapsed.as_millis() as u64, "slow request");
    }
    if let Ok(value) = HeaderValue::from_str(&elapsed.as_millis().to_string()) {
        res.headers_mut().insert("x-response-time-ms", value);
    }
    res
}

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, "x-tenant-id".parse().unwrap()])
        .allow_credentials(true)
}

/// Catch-all fallback for requests that don't match any route.
pub async fn not_found() -> Response {
    FriendlyError::user_facing(Level::DEBUG, ErrorCode::NotFound, "middleware", "no such route").into_response()
}
