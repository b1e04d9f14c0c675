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

use totp_rs::{Algorithm as TotpAlgorithm, Secret, TOTP};
use tracing::Level;
use uuid::Uuid;

use crate::auth::dto::login::{LoginResponse, MfaEnrollResponse, RefreshResponse, UserPublic};
use crate::auth::password_service::{BreachOracleClient, PasswordHasherService};
use crate::auth::repository::{RefreshTokenRepository, RotationOutcome, UserRepository};
use crate::auth::token_service::{AccessTokenService, RefreshTokenService};
use crate::common::error::{ErrorCode, FriendlyError};

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    access_tokens: Arc<AccessTokenService>,
    refresh_token_service: Arc<RefreshTokenService>,
    hasher: Arc<PasswordHasherService>,
    breach_oracle: Arc<BreachOracleClient>,
    mfa_issuer: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        access_tokens: Arc<AccessTokenService>,
        refresh_token_service: Arc<RefreshTokenService>,
        hasher: Arc<PasswordHasherService>,
        breach_oracle: Arc<BreachOracleClient>,
        mfa_issuer: String,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            access_tokens,
            refresh_token_service,
            hasher,
            breach_oracle,
            mfa_issuer,
        }
    }

    pub async fn register(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<UserPublic, FriendlyError> {
        if self.breach_oracle.is_breached(password).await {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::ValidationError,
                "auth::register",
                "This password has appeared in a known data breach. Choose another.",
            ));
        }

        let hash = self
            .hasher
            .hash(password)
            .map_err(|e| FriendlyError::internal("auth::register", e))?;

        let user = self
            .users
            .insert(tenant_id, email, &hash)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    FriendlyError::user_facing(
                        Level::DEBUG,
                        ErrorCode::Conflict,
                        "auth::register",
                        "An account with this email already exists",
                    )
                } else {
                    e.into()
                }
            })?;

        Ok((&user).into())
    }

    pub async fn login(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> Result<LoginResponse, FriendlyError> {
        let user = self
            .users
            .find_by_email(tenant_id, email)
            .await
            .map_err(|_| {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::Unauthenticated,
                    "auth::login",
                    "Invalid email or password",
                )
            })?;

        let (verified, rehash) = self
            .hasher
            .verify_and_rehash(password, &user.password_hash)
            .map_err(|_| {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::Unauthenticated,
                    "auth::login",
                    "Invalid email or password",
                )
            })?;
        if !verified {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::Unauthenticated,
                "auth::login",
                "Invalid email or password",
            ));
        }
        if let Some(new_hash) = rehash {
            self.users.set_password_hash(user.id, &new_hash).await?;
        }

        if user.mfa_enabled {
            let secret = user.mfa_secret.as_deref().ok_or_else(|| {
                FriendlyError::internal("auth::login", "mfa_enabled without a secret")
            })?;
            let code = mfa_code.ok_or_else(|| {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::MfaRequired,
                    "auth::login",
                    "MFA code required",
                )
            })?;
            if !self.verify_totp(secret, code)? {
                return Err(FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::Unauthenticated,
                    "auth::login",
                    "Invalid MFA code",
                ));
            }
        }

        let access_token = self
            .access_tokens
            .mint(&user)
            .map_err(|e| FriendlyError::internal("auth::login", e.to_string()))?;

        let family_id = Uuid::new_v4();
        let raw_refresh = self.refresh_token_service.generate_raw_token();
        let digest = self.refresh_token_service.digest(&raw_refresh);
        self.refresh_tokens
            .create(
                user.id,
                tenant_id,
                family_id,
                None,
                &digest,
                self.refresh_token_service.expires_at(),
            )
            .await?;

        Ok(LoginResponse {
            user: (&user).into(),
            access_token,
            refresh_token: raw_refresh,
        })
    }

    /// Rotates a refresh token. The whole read-check-insert-revoke sequence
    /// runs inside one transaction in [`RefreshTokenRepository::rotate`],
    /// row-locked on the old token, so two concurrent refreshes of the same
    /// token can't both succeed. Replaying a token that was already rotated
    /// (its `revoked` flag is already set) revokes the whole family: that is
    /// the signal that the token was stolen and used by two parties.
    pub async fn refresh(&self, raw_token: &str) -> Result<RefreshResponse, FriendlyError> {
        let digest = self.refresh_token_service.digest(raw_token);
        let new_raw = self.refresh_token_service.generate_raw_token();
        let new_digest = self.refresh_token_service.digest(&new_raw);

        let outcome = self
            .refresh_tokens
            .rotate(&digest, Uuid::new_v4(), &new_digest, self.refresh_token_service.expires_at())
            .await
            .map_err(|_| {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::InvalidToken,
                    "auth::refresh",
                    "Invalid refresh token",
                )
            })?;

        let new_record = match outcome {
            RotationOutcome::Rotated(record) => record,
            RotationOutcome::Reused { .. } => {
                return Err(FriendlyError::user_facing(
                    Level::WARN,
                    ErrorCode::InvalidToken,
                    "auth::refresh",
                    "Refresh token has already been used",
                ));
            }
            RotationOutcome::Expired => {
                return Err(FriendlyError::user_facing(
                    Level::DEBUG,
                    ErrorCode::InvalidToken,
                    "auth::refresh",
                    "Refresh token has expired",
                ));
            }
        };

        let user = self.users.find_by_id(new_record.tenant_id, new_record.user_id).await?;
        let access_token = self
            .access_tokens
            .mint(&user)
            .map_err(|e| FriendlyError::internal("auth::refresh", e.to_string()))?;

        Ok(RefreshResponse {
            access_token,
            refresh_token: new_raw,
        })
    }

    pub async fn logout(&self, raw_token: &str) -> Result<(), FriendlyError> {
        let digest = self.refresh_token_service.digest(raw_token);
        let record = self.refresh_tokens.find_by_digest(&digest).await?;
        self.refresh_tokens.revoke(record.id, "logout").await?;
        Ok(())
    }

    pub async fn mfa_enroll(&self, tenant_id: Uuid, user_id: Uuid) -> Result<MfaEnrollResponse, FriendlyError> {
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        let secret = Secret::generate_secret();
        let secret_b32 = secret.to_encoded().to_string();
        let totp = self
            .totp_for(&secret_b32, &user.email)
            .map_err(|e| FriendlyError::internal("auth::mfa_enroll", e))?;
        let otpauth_url = totp.get_url();

        self.users.set_mfa_secret(user.id, Some(&secret_b32)).await?;

        Ok(MfaEnrollResponse {
            secret: secret_b32,
            otpauth_url,
        })
    }

    pub async fn mfa_verify_and_enable(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        code: &str,
    ) -> Result<(), FriendlyError> {
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        let secret = user.mfa_secret.as_deref().ok_or_else(|| {
            FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::ValidationError,
                "auth::mfa_verify",
                "No MFA enrollment in progress",
            )
        })?;
        if !self.verify_totp(secret, code)? {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::Unauthenticated,
                "auth::mfa_verify",
                "Invalid MFA code",
            ));
        }
        self.users.set_mfa_enabled(user.id, true).await?;
        Ok(())
    }

    fn verify_totp(&self, secret_b32: &str, code: &str) -> Result<bool, FriendlyError> {
        let totp = self
            .totp_for(secret_b32, "")
            .map_err(|e| FriendlyError::internal("auth::totp", e))?;
        totp.check_current(code)
            .map_err(|e| FriendlyError::internal("auth::totp", e.to_string()))
    }

    fn totp_for(&self, secret_b32: &str, account_name: &str) -> Result<TOTP, String> {
        let secret = Secret::Encoded(secret_b32.to_string())
            .to_bytes()
            .map_err(|e| e.to_string())?;
        TOTP::new(
            TotpAlgorithm::SHA1,
            6,
            1,
            30,
            secret,
            Some(self.mfa_issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|e| e.to_string())
    }
}
