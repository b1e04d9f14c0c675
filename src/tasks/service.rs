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

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::Level;
use uuid::Uuid;

use crate::authorization::Authorizer;
use crate::common::context::RequestContext;
use crate::common::error::{ErrorCode, FriendlyError, RepositoryError};
use crate::events::EventType;
use crate::events::outbox::NewOutboxEvent;
use crate::mediator::{Command, CommandHandler, Mediator, Query, QueryHandler};
use crate::tasks::dto::TaskListQuery;
use crate::tasks::model::{Comment, Task, TaskPriority, TaskStatus};
use crate::tasks::repository::TaskRepository;

pub struct CreateTaskCommand {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assigned_to_user_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub estimated_hours: Option<f64>,
}
impl Command for CreateTaskCommand {
    type Output = Task;
}

pub struct UpdateTaskCommand {
    pub task_id: Uuid,
    pub expected_version: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assigned_to_user_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}
impl Command for UpdateTaskCommand {
    type Output = Task;
}

pub struct ChangeTaskStatusCommand {
    pub task_id: Uuid,
    pub expected_version: i32,
    pub status: TaskStatus,
    pub blocked_reason: Option<String>,
}
impl Command for ChangeTaskStatusCommand {
    type Output = Task;
}

pub struct DeleteTaskCommand {
    pub task_id: Uuid,
}
impl Command for DeleteTaskCommand {
    type Output = ();
}

pub struct AddCommentCommand {
    pub task_id: Uuid,
    pub body: String,
}
impl Command for AddCommentCommand {
    type Output = Comment;
}

pub struct GetTaskQuery {
    pub task_id: Uuid,
}
impl Query for GetTaskQuery {
    type Output = Task;
}

pub struct ListTasksQuery {
    pub filter: TaskListQuery,
}
impl Query for ListTasksQuery {
    type Output = Vec<Task>;
}

fn task_event(event_type: EventType, task: &Task, actor_user_id: Uuid) -> NewOutboxEvent {
    NewOutboxEvent {
        event_type,
        aggregate_id: task.id,
        tenant_id: task.tenant_id,
        payload: serde_json::json!({
            "task_id": task.id,
            "status": task.status,
            "actor_user_id": actor_user_id,
        }),
    }
}

pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
    mediator: Arc<Mediator>,
}

impl TaskService {
    pub fn new(repository: Arc<dyn TaskRepository>, mediator: Arc<Mediator>) -> Self {
        Self { repository, mediator }
    }

    pub async fn create(&self, ctx: &RequestContext, cmd: CreateTaskCommand) -> Result<Task, FriendlyError> {
        self.mediator.dispatch(self, ctx, cmd).await
    }

    pub async fn update(&self, ctx: &RequestContext, cmd: UpdateTaskCommand) -> Result<Task, FriendlyError> {
        self.mediator.dispatch(self, ctx, cmd).await
    }

    pub async fn change_status(&self, ctx: &RequestContext, cmd: ChangeTaskStatusCommand) -> Result<Task, FriendlyError> {
        self.mediator.dispatch(self, ctx, cmd).await
    }

    pub async fn delete(&self, ctx: &RequestContext, cmd: DeleteTaskCommand) -> Result<(), FriendlyError> {
        self.mediator.dispatch(self, ctx, cmd).await
    }

    pub async fn add_comment(&self, ctx: &RequestContext, cmd: AddCommentCommand) -> Result<Comment, FriendlyError> {
        self.mediator.dispatch(self, ctx, cmd).await
    }

    pub async fn get(&self, ctx: &RequestContext, query: GetTaskQuery) -> Result<Task, FriendlyError> {
        self.mediator.query(self, ctx, query).await
    }

    pub async fn list(&self, ctx: &RequestContext, query: ListTasksQuery) -> Result<Vec<Task>, FriendlyError> {
        self.mediator.query(self, ctx, query).await
    }

    pub async fn list_comments(&self, tenant_id: Uuid, task_id: Uuid) -> Result<Vec<Comment>, FriendlyError> {
        Ok(self.repository.list_comments(tenant_id, task_id).await?)
    }

    async fn fetch_for_mutation(&self, tenant_id: Uuid, task_id: Uuid) -> Result<Task, FriendlyError> {
        self.repository
            .find_by_id(tenant_id, task_id)
            .await?
            .ok_or_else(|| FriendlyError::user_facing(Level::DEBUG, ErrorCode::NotFound, "tasks::service", "task not found"))
    }
}

#[async_trait]
impl CommandHandler<CreateTaskCommand> for TaskService {
    async fn authorize(&self, ctx: &RequestContext, _cmd: &CreateTaskCommand) -> Result<(), FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.create")
    }

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: CreateTaskCommand,
    ) -> Result<(Task, Vec<NewOutboxEvent>), FriendlyError> {
        let user_id = ctx
            .user_id
            .ok_or_else(|| FriendlyError::internal("tasks::service", "authenticated command without a user id"))?;
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (
                id, tenant_id, project_id, title, description, status, priority,
                assigned_to_user_id, created_by_user_id, watchers, tags, due_date,
                estimated_hours, actual_hours, blocked_reason, version, is_deleted
             )
             VALUES (
                gen_random_uuid(), $1, $2, $3, $4, 'TODO', $5,
                $6, $7, '{}', $8, $9,
                $10, NULL, NULL, 1, false
             )
             RETURNING *",
        )
        .bind(ctx.tenant_id)
        .bind(cmd.project_id)
        .bind(&cmd.title)
        .bind(&cmd.description)
        .bind(cmd.priority)
        .bind(cmd.assigned_to_user_id)
        .bind(user_id)
        .bind(&cmd.tags)
        .bind(cmd.due_date)
        .bind(cmd.estimated_hours)
        .fetch_one(&mut **tx)
        .await
        .map_err(RepositoryError::Database)?;
        let event = task_event(EventType::TaskCreated, &task, user_id);
        Ok((task, vec![event]))
    }
}

#[async_trait]
impl CommandHandler<UpdateTaskCommand> for TaskService {
    async fn authorize(&self, ctx: &RequestContext, _cmd: &UpdateTaskCommand) -> Result<(), FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.update").or_else(|_| Authorizer::require_permission(ctx, "tasks.update.self"))
    }

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: UpdateTaskCommand,
    ) -> Result<(Task, Vec<NewOutboxEvent>), FriendlyError> {
        let existing = self.fetch_for_mutation(ctx.tenant_id, cmd.task_id).await?;
        Authorizer::require_resource_access(
            ctx,
            "tasks.update",
            "tasks.update.self",
            &[Some(existing.created_by_user_id), existing.assigned_to_user_id],
        )?;

        let reassigned = cmd.assigned_to_user_id.is_some() && cmd.assigned_to_user_id != existing.assigned_to_user_id;
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                priority = COALESCE($6, priority),
                assigned_to_user_id = COALESCE($7, assigned_to_user_id),
                tags = COALESCE($8, tags),
                due_date = COALESCE($9, due_date),
                estimated_hours = COALESCE($10, estimated_hours),
                actual_hours = COALESCE($11, actual_hours),
                version = version + 1,
                updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND version = $3 AND is_deleted = false
             RETURNING *",
        )
        .bind(ctx.tenant_id)
        .bind(cmd.task_id)
        .bind(cmd.expected_version)
        .bind(&cmd.title)
        .bind(&cmd.description)
        .bind(cmd.priority)
        .bind(cmd.assigned_to_user_id)
        .bind(&cmd.tags)
        .bind(cmd.due_date)
        .bind(cmd.estimated_hours)
        .bind(cmd.actual_hours)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepositoryError::Database)?
        .ok_or(RepositoryError::VersionConflict)
        .map_err(map_version_conflict)?;

        let user_id = ctx.user_id.unwrap_or(existing.created_by_user_id);
        let mut events = vec![task_event(EventType::TaskUpdated, &task, user_id)];
        if reassigned {
            events.push(task_event(EventType::TaskAssigned, &task, user_id));
        }
        Ok((task, events))
    }
}

#[async_trait]
impl CommandHandler<ChangeTaskStatusCommand> for TaskService {
    async fn authorize(&self, ctx: &RequestContext, _cmd: &ChangeTaskStatusCommand) -> Result<(), FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.update").or_else(|_| Authorizer::require_permission(ctx, "tasks.update.self"))
    }

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: ChangeTaskStatusCommand,
    ) -> Result<(Task, Vec<NewOutboxEvent>), FriendlyError> {
        let existing = self.fetch_for_mutation(ctx.tenant_id, cmd.task_id).await?;
        Authorizer::require_resource_access(
            ctx,
            "tasks.update",
            "tasks.update.self",
            &[Some(existing.created_by_user_id), existing.assigned_to_user_id],
        )?;

        let is_admin = ctx.has_role("SYSTEM_ADMIN") || ctx.has_role("TENANT_ADMIN");
        if !Task::can_transition(existing.status, cmd.status, is_admin) {
            return Err(FriendlyError::user_facing(
                Level::DEBUG,
                ErrorCode::InvalidTransition,
                "tasks::service",
                format!("cannot move a task from {:?} to {:?}", existing.status, cmd.status),
            ));
        }
        Task::validate_transition_fields(cmd.status, existing.assigned_to_user_id, cmd.blocked_reason.as_deref())?;

        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET
                status = $4,
                blocked_reason = $5,
                version = version + 1,
                updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND version = $3 AND is_deleted = false
             RETURNING *",
        )
        .bind(ctx.tenant_id)
        .bind(cmd.task_id)
        .bind(cmd.expected_version)
        .bind(cmd.status)
        .bind(&cmd.blocked_reason)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepositoryError::Database)?
        .ok_or(RepositoryError::VersionConflict)
        .map_err(map_version_conflict)?;

        let user_id = ctx.user_id.unwrap_or(existing.created_by_user_id);
        Ok((task.clone(), vec![task_event(EventType::TaskStatusChanged, &task, user_id)]))
    }
}

#[async_trait]
impl CommandHandler<DeleteTaskCommand> for TaskService {
    async fn authorize(&self, ctx: &RequestContext, _cmd: &DeleteTaskCommand) -> Result<(), FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.delete")
    }

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: DeleteTaskCommand,
    ) -> Result<((), Vec<NewOutboxEvent>), FriendlyError> {
        let existing = self.fetch_for_mutation(ctx.tenant_id, cmd.task_id).await?;
        let result = sqlx::query("UPDATE tasks SET is_deleted = true, updated_at = now() WHERE tenant_id = $1 AND id = $2")
            .bind(ctx.tenant_id)
            .bind(cmd.task_id)
            .execute(&mut **tx)
            .await
            .map_err(RepositoryError::Database)?;
        if result.rows_affected() == 0 {
            return Err(map_version_conflict(RepositoryError::NotFound));
        }
        let user_id = ctx.user_id.unwrap_or(existing.created_by_user_id);
        let event = NewOutboxEvent {
            event_type: EventType::TaskDeleted,
            aggregate_id: existing.id,
            tenant_id: existing.tenant_id,
            payload: serde_json::json!({ "task_id": existing.id, "actor_user_id": user_id }),
        };
        Ok(((), vec![event]))
    }
}

#[async_trait]
impl CommandHandler<AddCommentCommand> for TaskService {
    async fn authorize(&self, ctx: &RequestContext, _cmd: &AddCommentCommand) -> Result<(), FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.read")
    }

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: AddCommentCommand,
    ) -> Result<(Comment, Vec<NewOutboxEvent>), FriendlyError> {
        let user_id = ctx
            .user_id
            .ok_or_else(|| FriendlyError::internal("tasks::service", "authenticated command without a user id"))?;
        let _ = self.fetch_for_mutation(ctx.tenant_id, cmd.task_id).await?;
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO task_comments (id, tenant_id, task_id, author_user_id, body)
             VALUES (gen_random_uuid(), $1, $2, $3, $4)
             RETURNING *",
        )
        .bind(ctx.tenant_id)
        .bind(cmd.task_id)
        .bind(user_id)
        .bind(&cmd.body)
        .fetch_one(&mut **tx)
        .await
        .map_err(RepositoryError::Database)?;
        let event = NewOutboxEvent {
            event_type: EventType::TaskCommentAdded,
            aggregate_id: cmd.task_id,
            tenant_id: ctx.tenant_id,
            payload: serde_json::json!({ "task_id": cmd.task_id, "comment_id": comment.id, "actor_user_id": user_id }),
        };
        Ok((comment, vec![event]))
    }
}

#[async_trait]
impl QueryHandler<GetTaskQuery> for TaskService {
    async fn execute(&self, ctx: &RequestContext, query: GetTaskQuery) -> Result<Task, FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.read")?;
        self.fetch_for_mutation(ctx.tenant_id, query.task_id).await
    }
}

#[async_trait]
impl QueryHandler<ListTasksQuery> for TaskService {
    async fn execute(&self, ctx: &RequestContext, query: ListTasksQuery) -> Result<Vec<Task>, FriendlyError> {
        Authorizer::require_permission(ctx, "tasks.read")?;
        Ok(self.repository.list(ctx.tenant_id, &query.filter).await?)
    }
}

fn map_version_conflict(err: RepositoryError) -> FriendlyError {
    err.into()
}
