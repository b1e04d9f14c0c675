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
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::common::context::RequestContext;
use crate::common::dto::ApiOkResponse;
use crate::common::error::FriendlyError;
use crate::common::extractors::ValidJson;
use crate::tasks::TasksModule;
use crate::tasks::dto::{AddCommentRequest, ChangeStatusRequest, CreateTaskRequest, TaskListQuery, UpdateTaskRequest};
use crate::tasks::model::TaskPriority;
use crate::tasks::service::{
    AddCommentCommand, ChangeTaskStatusCommand, CreateTaskCommand, DeleteTaskCommand, GetTaskQuery, ListTasksQuery, UpdateTaskCommand,
};

pub async fn create(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    ValidJson(payload): ValidJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let task = tasks
        .service
        .create(
            &ctx,
            CreateTaskCommand {
                project_id: payload.project_id,
                title: payload.title,
                description: payload.description,
                priority: payload.priority.unwrap_or(TaskPriority::Medium),
                assigned_to_user_id: payload.assigned_to_user_id,
                tags: payload.tags,
                due_date: payload.due_date,
                estimated_hours: payload.estimated_hours,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOkResponse::new(task, Utc::now()))))
}

pub async fn list(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Query(filter): Query<TaskListQuery>,
) -> Result<impl IntoResponse, FriendlyError> {
    let result = tasks.service.list(&ctx, ListTasksQuery { filter }).await?;
    Ok(Json(ApiOkResponse::new(result, Utc::now())))
}

pub async fn get(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, FriendlyError> {
    let task = tasks.service.get(&ctx, GetTaskQuery { task_id }).await?;
    Ok(Json(ApiOkResponse::new(task, Utc::now())))
}

pub async fn update(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let task = tasks
        .service
        .update(
            &ctx,
            UpdateTaskCommand {
                task_id,
                expected_version: payload.version,
                title: payload.title,
                description: payload.description,
                priority: payload.priority,
                assigned_to_user_id: payload.assigned_to_user_id,
                tags: payload.tags,
                due_date: payload.due_date,
                estimated_hours: payload.estimated_hours,
                actual_hours: payload.actual_hours,
            },
        )
        .await?;
    Ok(Json(ApiOkResponse::new(task, Utc::now())))
}

pub async fn change_status(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
    ValidJson(payload): ValidJson<ChangeStatusRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let task = tasks
        .service
        .change_status(
            &ctx,
            ChangeTaskStatusCommand {
                task_id,
                expected_version: payload.version,
                status: payload.status,
                blocked_reason: payload.blocked_reason,
            },
        )
        .await?;
    Ok(Json(ApiOkResponse::new(task, Utc::now())))
}

pub async fn delete(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, FriendlyError> {
    tasks.service.delete(&ctx, DeleteTaskCommand { task_id }).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_comment(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
    ValidJson(payload): ValidJson<AddCommentRequest>,
) -> Result<impl IntoResponse, FriendlyError> {
    let comment = tasks
        .service
        .add_comment(&ctx, AddCommentCommand { task_id, body: payload.body })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOkResponse::new(comment, Utc::now()))))
}

pub async fn list_comments(
    State(tasks): State<Arc<TasksModule>>,
    ctx: RequestContext,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, FriendlyError> {
    let comments = tasks.service.list_comments(ctx.tenant_id, task_id).await?;
    Ok(Json(ApiOkResponse::new(comments, Utc::now())))
}
