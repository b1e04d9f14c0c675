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
use crate::app::config::{DatabaseConfig, DatabasePoolSizeProvider, DatabaseUrlProvider};
use crate::common::error::RepositoryError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

/// Owns the single shared connection pool all tenants' data lives behind.
/// Tenant isolation is enforced at the query layer (`WHERE tenant_id = $1`
/// on every statement), not at the connection layer, so there is exactly one
/// pool for the whole process rather than one per tenant.
pub struct PgPoolManager {
    pool: PgPool,
}

impl PgPoolManager {
    pub async fn new(config: &DatabaseConfig) -> Result<PgPoolManager, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pool_size())
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url())
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionTester: Send + Sync {
    async fn test_connect(
        &self,
        config: &DatabaseConfig,
        ssl_mode: PgSslMode,
    ) -> sqlx::Result<PgPool, RepositoryError>;

    async fn is_empty_database(&self, pool: &PgPool) -> Result<(), RepositoryError>;
}

pub struct PgConnectionTester;

#[async_trait]
impl ConnectionTester for PgConnectionTester {
    async fn test_connect(
        &self,
        config: &DatabaseConfig,
        ssl_mode: PgSslMode,
    ) -> sqlx::Result<PgPool, RepositoryError> {
        let conn = PgConnectOptions::from_str(&config.url())?.ssl_mode(ssl_mode);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pool_size())
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(conn)
            .await?;
        Ok(pool)
    }

    async fn is_empty_database(&self, pool: &PgPool) -> Result<(), RepositoryError> {
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) as number_of_tables
                    FROM information_schema.tables
                    WHERE table_schema = 'public'",
        )
        .fetch_one(pool)
        .await?;
        if result == 0 {
            Ok(())
        } else {
            Err(RepositoryError::Custom("Database is not empty".to_string()))
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatabaseMigrator: Send + Sync {
    async fn migrate(&self) -> Result<(), RepositoryError>;
}

#[async_trait]
impl DatabaseMigrator for PgPoolManager {
    async fn migrate(&self) -> Result<(), RepositoryError> {
        Ok(sqlx::migrate!("./migrations").run(&self.pool).await?)
    }
}
