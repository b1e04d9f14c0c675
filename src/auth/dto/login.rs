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
use crate::common::types::email::Email;
use crate::common::types::password::Password;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Email,
    pub password: String,
    pub mfa_code: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Email,
    pub password: Password,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct MfaVerifyRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    pub mfa_enabled: bool,
}

impl From<&crate::auth::model::User> for UserPublic {
    fn from(user: &crate::auth::model::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            tenant_id: user.tenant_id,
            roles: user.roles.clone(),
            mfa_enabled: user.mfa_enabled,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: UserPublic,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct MfaEnrollResponse {
    pub secret: String,
    pub otpauth_url: String,
}
