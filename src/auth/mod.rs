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

use crate::app::config::AppConfig;
use crate::auth::password_service::{BreachOracleClient, PasswordHasherService};
use crate::auth::repository::{PgRefreshTokenRepository, PgUserRepository};
use crate::auth::service::AuthService;
use crate::auth::token_service::{AccessTokenService, RefreshTokenService};

pub mod dto;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod password_service;
pub mod repository;
pub mod routes;
pub mod service;
pub mod token_service;

/// Everything the auth HTTP surface needs, built once at startup and shared
/// behind an `Arc` as axum `State`.
pub struct AuthModule {
    pub service: Arc<AuthService>,
    pub access_tokens: Arc<AccessTokenService>,
}

impl AuthModule {
    pub fn new(config: &AppConfig, pool: sqlx::PgPool) -> anyhow::Result<Self> {
        let access_tokens = Arc::new(AccessTokenService::from_config(config.auth())?);
        let refresh_token_service = Arc::new(RefreshTokenService::new(
            config.auth().refresh_token_pepper().to_string(),
            config.auth().refresh_ttl_days(),
        ));
        let users = Arc::new(PgUserRepository::new(pool.clone()));
        let refresh_tokens = Arc::new(PgRefreshTokenRepository::new(pool));
        let hasher = Arc::new(PasswordHasherService::default());
        let breach_oracle = Arc::new(BreachOracleClient::new(config.breach_oracle()));

        let service = Arc::new(AuthService::new(
            users,
            refresh_tokens,
            access_tokens.clone(),
            refresh_token_service,
            hasher,
            breach_oracle,
            config.auth().mfa_issuer().to_string(),
        ));

        Ok(Self { service, access_tokens })
    }
}
