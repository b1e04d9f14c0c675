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
use std::collections::HashMap;
use std::fs;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app::config::AuthConfig;
use crate::auth::dto::claims::Claims;
use crate::auth::model::User;

/// Mints and verifies RS256 access tokens. Holds one signing key plus every
/// key still trusted for verification, keyed by `kid`, so a key can be
/// rotated by adding a new signing key ahead of the old one without
/// invalidating tokens issued under the old key until it's dropped.
pub struct AccessTokenService {
    signing_key: EncodingKey,
    signing_kid: String,
    verification_keys: HashMap<String, DecodingKey>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid,
    #[error("key material error: {0}")]
    KeyMaterial(String),
}

impl AccessTokenService {
    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let signing_pem = fs::read(config.signing_key_path())
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;
        let signing_key = EncodingKey::from_rsa_pem(&signing_pem)
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;

        let mut verification_keys = HashMap::new();
        for (kid, path) in config.verification_key_paths() {
            let pem = fs::read(path).map_err(|e| TokenError::KeyMaterial(e.to_string()))?;
            let key = DecodingKey::from_rsa_pem(&pem)
                .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;
            verification_keys.insert(kid.clone(), key);
        }

        Ok(Self {
            signing_key,
            signing_kid: config.signing_key_id().to_string(),
            verification_keys,
            issuer: config.jwt_issuer().to_string(),
            audience: config.jwt_audience().to_string(),
            ttl: Duration::minutes(config.access_ttl_mins()),
        })
    }

    pub fn mint(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            tenant_id: user.tenant_id,
            roles: user.roles.clone(),
            permissions: user.permissions.clone(),
            department_id: user.department_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.signing_kid.clone());

        encode(&header, &claims, &self.signing_key).map_err(|_| TokenError::Invalid)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Invalid)?;
        let kid = header.kid.ok_or(TokenError::Invalid)?;
        let key = self.verification_keys.get(&kid).ok_or(TokenError::Invalid)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

/// Opaque bearer refresh tokens. Only a salted digest is ever persisted; the
/// raw token is shown to the client exactly once, at mint time.
pub struct RefreshTokenService {
    pepper: String,
    ttl: Duration,
}

impl RefreshTokenService {
    pub fn new(pepper: String, ttl_days: i64) -> Self {
        Self {
            pepper,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Generates a fresh 256-bit opaque token, hex-encoded.
    pub fn generate_raw_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn digest(&self, raw_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.as_bytes());
        hasher.update(raw_token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn expires_at(&self) -> chrono::DateTime<Utc> {
        Utc::now() + self.ttl
    }
}
