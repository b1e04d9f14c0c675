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
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::RepositoryResult;
use crate::tasks::dto::TaskListQuery;
use crate::tasks::model::{Comment, Task};

/// Reads only. Writes run inside the mediator's transaction (see
/// `tasks::service`) so the row mutation and its outbox event commit
/// atomically; putting them on this pool-bound trait would split that into
/// two connections and reopen the gap the outbox pattern exists to close.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid, task_id: Uuid) -> RepositoryResult<Option<Task>>;
    async fn list(&self, tenant_id: Uuid, query: &TaskListQuery) -> RepositoryResult<Vec<Task>>;
    async fn list_comments(&self, tenant_id: Uuid, task_id: Uuid) -> RepositoryResult<Vec<Comment>>;
}

pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn find_by_id(&self, tenant_id: Uuid, task_id: Uuid) -> RepositoryResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2 AND is_deleted = false",
        )
        .bind(tenant_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn list(&self, tenant_id: Uuid, query: &TaskListQuery) -> RepositoryResult<Vec<Task>> {
        let page = query.page.unwrap_or(1).max(1) as i64;
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200) as i64;
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks
             WHERE tenant_id = $1
               AND is_deleted = false
               AND ($2::uuid IS NULL OR project_id = $2)
               AND ($3::text IS NULL OR status = $3)
               AND ($4::uuid IS NULL OR assigned_to_user_id = $4)
             ORDER BY created_at DESC
             LIMIT $5 OFFSET $6",
        )
        .bind(tenant_id)
        .bind(query.project_id)
        .bind(query.status)
        .bind(query.assigned_to_user_id)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn list_comments(&self, tenant_id: Uuid, task_id: Uuid) -> RepositoryResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM task_comments WHERE tenant_id = $1 AND task_id = $2 ORDER BY created_at ASC",
        )
        .bind(tenant_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}
