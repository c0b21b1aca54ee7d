use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;
use crate::workflows::WorkflowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    /// Request body or path that could not be decoded.
    BadRequest(String),
    Auth(AuthError),
    Store(StoreError),
    Workflow(WorkflowError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(err) => match err {
                AuthError::TokenMissing | AuthError::TokenInvalid | AuthError::UnknownUser => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::RoleDenied(_) => StatusCode::FORBIDDEN,
                AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Store(err) => store_status(err),
            AppError::Workflow(err) => match err {
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::Forbidden(_) | WorkflowError::TypeMismatch => StatusCode::FORBIDDEN,
                WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkflowError::InvalidState(_)
                | WorkflowError::AlreadyEnrolled
                | WorkflowError::DuplicateAttendance
                | WorkflowError::DuplicateFeedback
                | WorkflowError::AlreadySubmitted => StatusCode::CONFLICT,
                WorkflowError::NotAvailable
                | WorkflowError::LimitReached { .. }
                | WorkflowError::CapacityExceeded
                | WorkflowError::NotActive => StatusCode::UNPROCESSABLE_ENTITY,
                WorkflowError::Store(err) => store_status(err),
            },
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Auth(err) => err.code(),
            AppError::Store(StoreError::Conflict(_)) => "CONCURRENT_UPDATE",
            AppError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            AppError::Workflow(err) => err.code(),
            _ => "INTERNAL_ERROR",
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::BadRequest(message) => write!(f, "{}", message),
            AppError::Auth(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "{}", err),
            AppError::Workflow(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::BadRequest(_) => None,
            AppError::Auth(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Workflow(err) => Some(err),
        }
    }
}

/// Client errors carry their message; anything 5xx is logged and masked.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            json!({
                "status": "error",
                "code": "INTERNAL_ERROR",
                "message": "Something went wrong!",
            })
        } else {
            tracing::debug!(status = status.as_u16(), code = self.code(), "request rejected");
            json!({
                "status": "fail",
                "code": self.code(),
                "message": self.to_string(),
            })
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, SkillType};

    #[test]
    fn enrollment_rules_map_to_distinct_statuses() {
        let cases = [
            (WorkflowError::NotAvailable, StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::AlreadyEnrolled, StatusCode::CONFLICT),
            (WorkflowError::TypeMismatch, StatusCode::FORBIDDEN),
            (
                WorkflowError::LimitReached {
                    skill_type: SkillType::Day,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (WorkflowError::NotFound("Skill"), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn auth_failures_split_between_401_and_403() {
        assert_eq!(
            AppError::from(AuthError::TokenMissing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::RoleDenied(Role::Student)).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_outage_is_masked_as_internal() {
        let err = AppError::from(WorkflowError::from(StoreError::Unavailable(
            "snapshot unwritable".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let conflict = AppError::from(StoreError::Conflict("skill".to_string()));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "CONCURRENT_UPDATE");
    }
}
