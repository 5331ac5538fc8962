use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Capacity exceeded: requested {requested}, remaining {remaining}")]
    CapacityExceeded { requested: i32, remaining: i32 },

    #[error("Lottery {0} already has a winner")]
    AlreadyFinished(i64),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::AlreadyFinished(_) => "ALREADY_FINISHED",
            AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            AppError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ReqwestError(_) => "HTTP_CLIENT_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::CapacityExceeded { .. }
            | AppError::AlreadyFinished(_) => StatusCode::CONFLICT,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::InvariantViolation(_)
            | AppError::DatabaseError(_)
            | AppError::ReqwestError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::NotFound(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::CapacityExceeded { .. } | AppError::AlreadyFinished(_) => self.to_string(),
            AppError::InvariantViolation(msg) => {
                log::error!("Invariant violation: {msg}");
                "Internal consistency fault".to_string()
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            AppError::ReqwestError(err) => {
                log::error!("HTTP request error: {err}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_family_maps_to_409() {
        let errors = [
            AppError::Conflict("Ticket 3 already sold".into()),
            AppError::CapacityExceeded {
                requested: 5,
                remaining: 2,
            },
            AppError::AlreadyFinished(7),
        ];
        for e in errors {
            assert_eq!(e.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_invariant_violation_is_server_fault() {
        let e = AppError::InvariantViolation("no ticket #9".into());
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code(), "INVARIANT_VIOLATION");
        assert_eq!(
            e.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_hides_details() {
        let e = AppError::from(sea_orm::DbErr::Custom("disk I/O error".into()));
        assert_eq!(e.code(), "DATABASE_ERROR");
        let resp = e.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = actix_web::body::to_bytes(resp.into_body());
        let body = futures_util::FutureExt::now_or_never(body).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(json["error"]["message"], "Database error");
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let e = AppError::ValidationError("No tickets selected".into());
        assert_eq!(e.error_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "VALIDATION_ERROR");
    }
}
