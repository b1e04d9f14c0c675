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
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::tasks::model::TaskPriority;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub assigned_to_user_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assigned_to_user_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    /// Optimistic-concurrency token: must match the row's current `version`.
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: crate::tasks::model::TaskStatus,
    pub blocked_reason: Option<String>,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskListQuery {
    pub project_id: Option<Uuid>,
    pub status: Option<crate::tasks::model::TaskStatus>,
    pub assigned_to_user_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
