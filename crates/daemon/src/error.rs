use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use onboarding_core::api::{ErrorBody, ErrorEnvelope};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

/// Every failure a handler can surface. Rendered as `{"error": {"code", "message", "details"}}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    InvalidToken,
    InvalidRequest,
    MissingFields,
    DepartmentNotFound { department: String, valid: Vec<String> },
    TaskNotFound { task_id: String, department: String, valid: Vec<String> },
    EmployeeNotFound { name: String },
    NotFound,
    MethodNotAllowed,
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest | ApiError::MissingFields => StatusCode::BAD_REQUEST,
            ApiError::DepartmentNotFound { .. }
            | ApiError::TaskNotFound { .. }
            | ApiError::EmployeeNotFound { .. }
            | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::InvalidRequest => "INVALID_REQUEST",
            ApiError::MissingFields => "MISSING_FIELDS",
            ApiError::DepartmentNotFound { .. } => "DEPARTMENT_NOT_FOUND",
            ApiError::TaskNotFound { .. } => "TASK_NOT_FOUND",
            ApiError::EmployeeNotFound { .. } => "EMPLOYEE_NOT_FOUND",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Authentication required. Provide a Bearer token \
                (Authorization: Bearer <token>) or an API key (X-API-Key: <key>)."
                .to_string(),
            ApiError::InvalidToken => "Bearer token is invalid or expired.".to_string(),
            ApiError::InvalidRequest => {
                "Request body must be valid JSON with 'task_id' and 'department' fields.".to_string()
            }
            ApiError::MissingFields => "Both 'task_id' and 'department' are required.".to_string(),
            ApiError::DepartmentNotFound { department, valid } => format!(
                "Department '{department}' is not recognized. Valid values: {}.",
                valid.join(", ")
            ),
            ApiError::TaskNotFound { task_id, department, valid } => format!(
                "Task '{task_id}' not found in department '{department}'. Valid task IDs: {}.",
                valid.join(", ")
            ),
            ApiError::EmployeeNotFound { name } => format!(
                "No employee record found for '{name}'. The agent will ask the user to confirm their department."
            ),
            ApiError::NotFound => "The requested endpoint does not exist.".to_string(),
            ApiError::MethodNotAllowed => "HTTP method not allowed on this endpoint.".to_string(),
            ApiError::Internal(_) => {
                "An unexpected error occurred. Please try again or contact support.".to_string()
            }
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::DepartmentNotFound { valid, .. } => Some(json!({ "valid_departments": valid })),
            ApiError::TaskNotFound { valid, .. } => Some(json!({ "valid_task_ids": valid })),
            _ => None,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.message(),
                details: self.details(),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(_) => ApiError::InvalidToken,
            AuthError::Unauthorized => ApiError::Unauthorized,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            error!(error = %format!("{e:#}"), "request failed");
        }
        (self.status(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InvalidReason;

    #[test]
    fn auth_errors_map_to_401_codes() {
        let e = ApiError::from(AuthError::InvalidToken(InvalidReason::Expired));
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.code(), "INVALID_TOKEN");
        // The validator's reason stays in the logs.
        let reason = InvalidReason::Expired.to_string();
        assert!(!e.envelope().error.message.contains(&reason));

        let e = ApiError::from(AuthError::Unauthorized);
        assert_eq!(e.code(), "UNAUTHORIZED");
    }

    #[test]
    fn internal_error_hides_cause() {
        let e = ApiError::from(anyhow::anyhow!("disk I/O error at /var/db"));
        let body = e.envelope();
        assert_eq!(body.error.code, "INTERNAL_SERVER_ERROR");
        assert!(!body.error.message.contains("disk"));
        assert!(body.error.details.is_none());
    }

    #[test]
    fn department_not_found_lists_valid_values() {
        let e = ApiError::DepartmentNotFound {
            department: "finance".into(),
            valid: vec!["Engineering".into(), "Sales".into()],
        };
        let body = e.envelope().error;
        assert_eq!(body.message, "Department 'finance' is not recognized. Valid values: Engineering, Sales.");
        assert_eq!(body.details.unwrap()["valid_departments"][1], "Sales");
    }
}
