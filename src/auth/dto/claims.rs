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
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The access token payload. Signed RS256, so `kid` in the header (not here)
/// tells the verifier which public key to use. `roles`/`permissions` and
/// `department_id` are snapshotted at mint time and only refreshed on the
/// next login or refresh -- a mid-session permission change takes effect on
/// the next token, not retroactively.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub department_id: Option<Uuid>,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}
