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

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::common::error::ErrorCode;

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl ApiMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            pagination: None,
        }
    }

    pub fn with_pagination(now: DateTime<Utc>, pagination: Pagination) -> Self {
        Self {
            timestamp: now,
            pagination: Some(pagination),
        }
    }
}

/// Success envelope: `{"success":true,"data":...,"metadata":{...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiOkResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: ApiMetadata,
}

impl<T: Serialize> ApiOkResponse<T> {
    pub fn new(data: T, now: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data,
            metadata: ApiMetadata::new(now),
        }
    }

    pub fn paginated(data: T, now: DateTime<Utc>, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            metadata: ApiMetadata::with_pagination(now, pagination),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiOkResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorMetadata {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
}

/// Error envelope: `{"success":false,"error":{...},"metadata":{timestamp,correlation_id}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
    pub correlation_id: Uuid,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.code.status_code();
        (
            status,
            Json(serde_json::json!({
                "success": self.success,
                "error": self.error,
                "metadata": ApiErrorMetadata {
                    timestamp: Utc::now(),
                    correlation_id: self.correlation_id,
                },
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleMessageResponse {
    pub message: String,
}
