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

use crate::auth::model::{RefreshTokenRecord, User};
use crate::common::error::{RepositoryError, RepositoryResult};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> RepositoryResult<User>;
    async fn find_by_id(&self, tenant_id: Uuid, user_id: Uuid) -> RepositoryResult<User>;
    async fn insert(
        &self,
        tenant_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<User>;
    async fn set_mfa_secret(&self, user_id: Uuid, secret: Option<&str>) -> RepositoryResult<()>;
    async fn set_mfa_enabled(&self, user_id: Uuid, enabled: bool) -> RepositoryResult<()>;
    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> RepositoryResult<()>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND email = $2 AND is_active = true",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_by_id(&self, tenant_id: Uuid, user_id: Uuid) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn insert(
        &self,
        tenant_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, tenant_id, email, password_hash, roles, permissions, mfa_enabled, is_active)
             VALUES ($1, $2, $3, $4, '{}', '{}', false, true)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn set_mfa_secret(&self, user_id: Uuid, secret: Option<&str>) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET mfa_secret = $1, updated_at = now() WHERE id = $2")
            .bind(secret)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_mfa_enabled(&self, user_id: Uuid, enabled: bool) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET mfa_enabled = $1, updated_at = now() WHERE id = $2")
            .bind(enabled)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Outcome of an atomic [`RefreshTokenRepository::rotate`] call.
pub enum RotationOutcome {
    Rotated(RefreshTokenRecord),
    /// The presented token was already revoked -- a replay. The whole
    /// family has just been revoked as a side effect of detecting this.
    Reused { family_id: Uuid },
    Expired,
}

/// Persists the refresh-token rotation graph. Every replay of an already
/// `revoked` token is a signal of token theft: the caller must revoke the
/// entire `family_id`, not just the one token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        family_id: Uuid,
        parent_token_id: Option<Uuid>,
        token_digest: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> RepositoryResult<RefreshTokenRecord>;

    async fn find_by_digest(&self, token_digest: &str) -> RepositoryResult<RefreshTokenRecord>;

    async fn revoke(&self, token_id: Uuid, reason: &str) -> RepositoryResult<()>;

    async fn touch_last_used(&self, token_id: Uuid) -> RepositoryResult<()>;

    /// Atomically rotates the token identified by `old_digest` into a new
    /// descendant. Locks the row with `SELECT ... FOR UPDATE` for the
    /// lifetime of one transaction so two concurrent refreshes of the same
    /// token can't both observe `revoked = false` and both mint a
    /// descendant -- the loser blocks on the lock until the winner commits,
    /// then sees `revoked = true` and is turned away as a replay.
    async fn rotate(
        &self,
        old_digest: &str,
        new_token_id: Uuid,
        new_digest: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> RepositoryResult<RotationOutcome>;
}

pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        family_id: Uuid,
        parent_token_id: Option<Uuid>,
        token_digest: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> RepositoryResult<RefreshTokenRecord> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "INSERT INTO refresh_tokens
                (id, user_id, tenant_id, family_id, parent_token_id, token_digest, revoked, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, false, $7, now())
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(tenant_id)
        .bind(family_id)
        .bind(parent_token_id)
        .bind(token_digest)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_by_digest(&self, token_digest: &str) -> RepositoryResult<RefreshTokenRecord> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_tokens WHERE token_digest = $1",
        )
        .bind(token_digest)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn revoke(&self, token_id: Uuid, reason: &str) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked = true, revocation_reason = $2 WHERE id = $1",
        )
        .bind(token_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_used(&self, token_id: Uuid) -> RepositoryResult<()> {
        sqlx::query("UPDATE refresh_tokens SET last_used_at = now() WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate(
        &self,
        old_digest: &str,
        new_token_id: Uuid,
        new_digest: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> RepositoryResult<RotationOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, RefreshTokenRecord>("SELECT * FROM refresh_tokens WHERE token_digest = $1 FOR UPDATE")
            .bind(old_digest)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if existing.revoked {
            sqlx::query("UPDATE refresh_tokens SET revoked = true, revocation_reason = $2 WHERE family_id = $1 AND revoked = false")
                .bind(existing.family_id)
                .bind("reuse_detected")
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(RotationOutcome::Reused {
                family_id: existing.family_id,
            });
        }

        if existing.is_expired(chrono::Utc::now()) {
            tx.commit().await?;
            return Ok(RotationOutcome::Expired);
        }

        let new_record = sqlx::query_as::<_, RefreshTokenRecord>(
            "INSERT INTO refresh_tokens
                (id, user_id, tenant_id, family_id, parent_token_id, token_digest, revoked, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, false, $7, now())
             RETURNING *",
        )
        .bind(new_token_id)
        .bind(existing.user_id)
        .bind(existing.tenant_id)
        .bind(existing.family_id)
        .bind(existing.id)
        .bind(new_digest)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE refresh_tokens
             SET revoked = true, revocation_reason = 'rotated', replaced_by_token_id = $2
             WHERE id = $1",
        )
        .bind(existing.id)
        .bind(new_record.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RotationOutcome::Rotated(new_record))
    }
}
