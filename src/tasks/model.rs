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
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::common::error::{ErrorCode, FriendlyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Blocked,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to_user_id: Option<Uuid>,
    pub created_by_user_id: Uuid,
    pub watchers: Vec<Uuid>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub blocked_reason: Option<String>,
    pub version: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The full transition table. Cancellation is admin-only from every
    /// status, not just `DONE` -- a non-admin can move a task forward
    /// through the normal states but can never cancel it themselves.
    pub fn can_transition(from: TaskStatus, to: TaskStatus, is_admin: bool) -> bool {
        use TaskStatus::*;
        if from == to {
            return true;
        }
        if to == Cancelled {
            return is_admin;
        }
        match from {
            Todo => matches!(to, InProgress),
            InProgress => matches!(to, InReview | Blocked | Todo),
            InReview => matches!(to, InProgress | Done),
            Blocked => matches!(to, InProgress | Todo),
            Done => false,
            Cancelled => false,
        }
    }

    /// Validates the fields a transition into `to` requires, independent of
    /// whether the transition itself is reachable from the current status.
    pub fn validate_transition_fields(
        to: TaskStatus,
        assigned_to_user_id: Option<Uuid>,
        blocked_reason: Option<&str>,
    ) -> Result<(), FriendlyError> {
        match to {
            TaskStatus::Blocked if blocked_reason.unwrap_or("").trim().is_empty() => Err(FriendlyError::user_facing(
                tracing::Level::DEBUG,
                ErrorCode::ValidationError,
                "tasks::model",
                "a blocked task requires a non-empty blocked_reason",
            )),
            TaskStatus::InReview if assigned_to_user_id.is_none() => Err(FriendlyError::user_facing(
                tracing::Level::DEBUG,
                ErrorCode::ValidationError,
                "tasks::model",
                "a task entering review must have an assignee",
            )),
            _ => Ok(()),
        }
    }
}

/// Append-only: comments are never edited or deleted, only added.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub task_id: Uuid,
    pub author_user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn done_is_terminal_for_non_admins() {
        assert!(!Task::can_transition(Done, InProgress, false));
        assert!(!Task::can_transition(Done, Cancelled, false));
    }

    #[test]
    fn admin_can_cancel_a_done_task() {
        assert!(Task::can_transition(Done, Cancelled, true));
    }

    #[test]
    fn cancelled_is_terminal_for_everyone() {
        assert!(!Task::can_transition(Cancelled, Todo, true));
    }

    #[test]
    fn only_an_admin_can_cancel_from_any_status() {
        for from in [Todo, InProgress, InReview, Blocked] {
            assert!(!Task::can_transition(from, Cancelled, false));
            assert!(Task::can_transition(from, Cancelled, true));
        }
    }

    #[test]
    fn blocked_requires_reason() {
        assert!(Task::validate_transition_fields(Blocked, None, Some("")).is_err());
        assert!(Task::validate_transition_fields(Blocked, None, Some("waiting on design sign-off")).is_ok());
    }

    #[test]
    fn review_requires_assignee() {
        assert!(Task::validate_transition_fields(InReview, None, None).is_err());
        assert!(Task::validate_transition_fields(InReview, Some(Uuid::new_v4()), None).is_ok());
    }
}
