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

use crate::mediator::Mediator;
use crate::tasks::repository::{PgTaskRepository, TaskRepository};
use crate::tasks::service::TaskService;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod routes;
pub mod service;

pub struct TasksModule {
    pub service: Arc<TaskService>,
}

impl TasksModule {
    pub fn new(pool: sqlx::PgPool, mediator: Arc<Mediator>) -> Self {
        let repository: Arc<dyn TaskRepository> = Arc::new(PgTaskRepository::new(pool));
        let service = Arc::new(TaskService::new(repository, mediator));
        Self { service }
    }
}
