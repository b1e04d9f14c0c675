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

use axum::{
    Router,
    routing::{get, patch, post},
};

use super::handler::{create, current, update_settings};
use crate::tenants::TenantsModule;

pub fn routes(tenants: Arc<TenantsModule>) -> Router {
    Router::new().nest(
        "/tenants",
        Router::new()
            .route("/", post(create))
            .route("/current", get(current))
            .route("/current", patch(update_settings))
            .with_state(tenants),
    )
}
