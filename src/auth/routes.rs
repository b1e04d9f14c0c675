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

use axum::{Router, middleware as axum_middleware, routing::post};

use super::handler::{login, logout, mfa_enroll, mfa_verify, refresh, register};
use super::middleware::require_auth;
use crate::auth::AuthModule;

pub fn routes(auth_module: Arc<AuthModule>) -> Router {
    let authenticated = Router::new()
        .route("/mfa/enroll", post(mfa_enroll))
        .route("/mfa/verify", post(mfa_verify))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_module.clone(),
            require_auth,
        ));

    Router::new().nest(
        "/auth",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/refresh", post(refresh))
            .route("/logout", post(logout))
            .merge(authenticated)
            .with_state(auth_module),
    )
}
