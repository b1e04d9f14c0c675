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
use argon2::{
    Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::warn;

use crate::app::config::BreachOracleConfig;

/// Memory-hard Argon2id hashing matching the documented parameters: 64 MiB
/// memory, 3 iterations, 4 lanes of parallelism.
pub struct PasswordHasherService {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasherService {
    fn default() -> Self {
        let params = Params::new(65536, 3, 4, None).expect("valid argon2 params");
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl PasswordHasherService {
    pub fn hash(&self, password: &str) -> Result<String, String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| e.to_string())
    }

    /// Constant-time verification: `PasswordVerifier::verify_password` does
    /// not short-circuit on the first mismatched byte.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), String> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| e.to_string())?;
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|e| e.to_string())
    }

    /// Verifies `password` against `stored`, and if it checks out but
    /// `stored`'s embedded cost parameters no longer match this service's
    /// configured parameters (e.g. after an `m_cost`/`t_cost` upgrade),
    /// also returns a freshly computed hash under the current parameters
    /// so the caller can persist the upgrade. Returns `(false, None)` on a
    /// plain verification failure -- the rehash is never offered for a
    /// wrong password.
    pub fn verify_and_rehash(&self, password: &str, stored: &str) -> Result<(bool, Option<String>), String> {
        let parsed_hash = PasswordHash::new(stored).map_err(|e| e.to_string())?;
        if self.argon2.verify_password(password.as_bytes(), &parsed_hash).is_err() {
            return Ok((false, None));
        }

        let stored_params = Params::try_from(&parsed_hash).map_err(|e| e.to_string())?;
        let current_params = self.argon2.params();
        let drifted = stored_params.m_cost() != current_params.m_cost()
            || stored_params.t_cost() != current_params.t_cost()
            || stored_params.p_cost() != current_params.p_cost();

        if drifted {
            Ok((true, Some(self.hash(password)?)))
        } else {
            Ok((true, None))
        }
    }
}

/// k-anonymity lookup against a breach-password oracle (the public
/// "Have I Been Pwned" protocol): only the first 5 hex characters of the
/// SHA-1 digest ever leave the process. Fails open -- if the oracle can't be
/// reached within its timeout, the password is treated as not breached and
/// the failure is logged, never surfaced to the user.
pub struct BreachOracleClient {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
}

impl BreachOracleClient {
    pub fn new(config: &BreachOracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms()))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            base_url: config.base_url().to_string(),
            enabled: config.enabled(),
        }
    }

    pub async fn is_breached(&self, password: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let digest = format!("{:X}", Sha1::digest(password.as_bytes()));
        let (prefix, suffix) = digest.split_at(5);

        let url = format!("{}/range/{}", self.base_url, prefix);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(body) => body.lines().any(|line| {
                    line.split(':')
                        .next()
                        .map(|candidate| candidate.eq_ignore_ascii_case(suffix))
                        .unwrap_or(false)
                }),
                Err(e) => {
                    warn!("breach oracle response read failed: {e}");
                    false
                }
            },
            Err(e) => {
                warn!("breach oracle unreachable: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies_roundtrip() {
        let svc = PasswordHasherService::default();
        let hash = svc.hash("Tr0ub4dor&3!!").unwrap();
        assert!(svc.verify("Tr0ub4dor&3!!", &hash).is_ok());
        assert!(svc.verify("wrong-password", &hash).is_err());
    }

    #[test]
    fn verify_and_rehash_does_not_rehash_when_params_match() {
        let svc = PasswordHasherService::default();
        let hash = svc.hash("Tr0ub4dor&3!!").unwrap();
        let (ok, rehash) = svc.verify_and_rehash("Tr0ub4dor&3!!", &hash).unwrap();
        assert!(ok);
        assert!(rehash.is_none());
    }

    #[test]
    fn verify_and_rehash_rejects_wrong_password_without_rehashing() {
        let svc = PasswordHasherService::default();
        let hash = svc.hash("Tr0ub4dor&3!!").unwrap();
        let (ok, rehash) = svc.verify_and_rehash("wrong-password", &hash).unwrap();
        assert!(!ok);
        assert!(rehash.is_none());
    }

    #[test]
    fn verify_and_rehash_upgrades_a_hash_with_stale_params() {
        let weak_params = Params::new(8, 1, 1, None).unwrap();
        let weak = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, weak_params);
        let salt = SaltString::generate(&mut OsRng);
        let stale_hash = weak.hash_password(b"Tr0ub4dor&3!!", &salt).unwrap().to_string();

        let svc = PasswordHasherService::default();
        let (ok, rehash) = svc.verify_and_rehash("Tr0ub4dor&3!!", &stale_hash).unwrap();
        assert!(ok);
        let rehash = rehash.expect("stale params must trigger a rehash");
        assert!(svc.verify("Tr0ub4dor&3!!", &rehash).is_ok());
    }
}
