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
    routing::{get, post},
};

use super::handler::{add_comment, change_status, create, delete as delete_task, get as get_task, list, list_comments, update};
use crate::tasks::TasksModule;

pub fn routes(tasks: Arc<TasksModule>) -> Router {
    Router::new().nest(
        "/tasks",
        Router::new()
            .route("/", post(create).get(list))
            .route("/{task_id}", get(get_task).patch(update).delete(delete_task))
            .route("/{task_id}/status", post(change_status))
            .route("/{task_id}/comments", get(list_comments).post(add_comment))
            .with_state(tasks),
    )
}
