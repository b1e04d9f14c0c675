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
use std::fmt::Display;
use thiserror::Error;

use crate::common::dto::{ApiErrorBody, ApiErrorResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sqlx::Error;
use sqlx::migrate::MigrateError;
use tracing::Level;
use tracing::event;
use uuid::Uuid;

/// The stable, machine-readable error codes every handler eventually maps
/// its failures onto. Clients match on these, never on `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Unauthenticated,
    InvalidToken,
    MfaRequired,
    Forbidden,
    NotFound,
    Conflict,
    InvalidTransition,
    RateLimited,
    TenantMismatch,
    Internal,
}

impl ErrorCode {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::MfaRequired => StatusCode::from_u16(423).expect("valid status"),
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InvalidTransition => StatusCode::CONFLICT,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::TenantMismatch => StatusCode::BAD_REQUEST,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A domain/application error that knows how to render itself as the
/// response envelope's error shape, and logs itself on construction.
///
/// `UserFacing` carries a stable `ErrorCode` plus a human message and
/// optional structured `details`; `Internal` never leaks its message to the
/// client, only to the logs.
#[derive(Debug, Error, Clone)]
pub enum FriendlyError {
    #[error("{message}")]
    UserFacing {
        code: ErrorCode,
        loc: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("internal error")]
    Internal { loc: &'static str, message: String },
}

impl FriendlyError {
    pub fn user_facing(severity: Level, code: ErrorCode, loc: &'static str, message: impl Into<String>) -> Self {
        Self::UserFacing {
            code,
            loc,
            message: message.into(),
            details: None,
        }
        .trace(severity)
    }

    pub fn user_facing_with_details(
        severity: Level,
        code: ErrorCode,
        loc: &'static str,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::UserFacing {
            code,
            loc,
            message: message.into(),
            details: Some(details),
        }
        .trace(severity)
    }

    pub fn internal(loc: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            loc,
            message: message.into(),
        }
        .trace(Level::ERROR)
    }

    fn trace(self, severity: Level) -> Self {
        match &self {
            FriendlyError::UserFacing { code, loc, message, .. } => match severity {
                Level::ERROR => event!(Level::ERROR, "user-facing error: code={code:?} location={loc} message={message}"),
                Level::WARN => event!(Level::WARN, "user-facing error: code={code:?} location={loc} message={message}"),
                Level::INFO => event!(Level::INFO, "user-facing error: code={code:?} location={loc} message={message}"),
                Level::DEBUG => event!(Level::DEBUG, "user-facing error: code={code:?} location={loc} message={message}"),
                Level::TRACE => event!(Level::TRACE, "user-facing error: code={code:?} location={loc} message={message}"),
            },
            FriendlyError::Internal { loc, message } => match severity {
                Level::ERROR => event!(Level::ERROR, "internal error: location={loc} message={message}"),
                Level::WARN => event!(Level::WARN, "internal error: location={loc} message={message}"),
                Level::INFO => event!(Level::INFO, "internal error: location={loc} message={message}"),
                Level::DEBUG => event!(Level::DEBUG, "internal error: location={loc} message={message}"),
                Level::TRACE => event!(Level::TRACE, "internal error: location={loc} message={message}"),
            },
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            FriendlyError::UserFacing { code, .. } => *code,
            FriendlyError::Internal { .. } => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for FriendlyError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4();
        match self {
            FriendlyError::UserFacing { code, message, details, .. } => ApiErrorResponse {
                success: false,
                error: ApiErrorBody {
                    code,
                    message,
                    details,
                },
                correlation_id,
            }
            .into_response(),
            FriendlyError::Internal { .. } => ApiErrorResponse {
                success: false,
                error: ApiErrorBody {
                    code: ErrorCode::Internal,
                    message: "An unexpected error occurred".to_string(),
                    details: None,
                },
                correlation_id,
            }
            .into_response(),
        }
    }
}

pub trait FormErrorResponse: Serialize + Display {
    fn global_message(&self) -> String {
        "Please check the fields that failed validation".to_string()
    }
    fn log_level(&self) -> Level {
        Level::DEBUG
    }
    fn get_error_response(&self) -> Response {
        FriendlyError::user_facing_with_details(
            self.log_level(),
            ErrorCode::ValidationError,
            "validation",
            self.global_message(),
            serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        )
        .into_response()
    }
}

/// Errors surfaced from the repository layer. `tenant_id` is always bound
/// into a `WHERE` clause by the caller; nothing here reaches across tenants.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrate error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("InvalidInput error: {0}")]
    InvalidInput(String),

    #[error("Custom error: {0}")]
    Custom(String),

    #[error("The selected record is inactive")]
    InactiveRecord,

    #[error("No row matched")]
    NotFound,

    #[error("Optimistic concurrency conflict")]
    VersionConflict,
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        if let RepositoryError::Database(sqlxe) = self
            && let Error::Database(database_error) = sqlxe
            && database_error.is_unique_violation()
        {
            return true;
        }
        false
    }
    pub fn is_inactive_record(&self) -> bool {
        matches!(self, RepositoryError::InactiveRecord)
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound)
            || matches!(self, RepositoryError::Database(sqlx::Error::RowNotFound))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for FriendlyError {
    fn from(err: RepositoryError) -> Self {
        if err.is_not_found() || err.is_inactive_record() {
            return FriendlyError::user_facing(Level::DEBUG, ErrorCode::NotFound, "repository", "Resource not found");
        }
        if matches!(err, RepositoryError::VersionConflict) {
            return FriendlyError::user_facing(Level::DEBUG, ErrorCode::Conflict, "repository", "Record was modified concurrently");
        }
        FriendlyError::internal("repository", err.to_string())
    }
}

#[derive(Debug, Error, Serialize)]
pub enum BuilderError {
    #[error("{0} is required")]
    MissingRequired(&'static str),
}

impl From<BuilderError> for FriendlyError {
    fn from(err: BuilderError) -> Self {
        FriendlyError::internal("builder", err.to_string())
    }
}

pub type BuilderResult<T> = Result<T, BuilderError>;
