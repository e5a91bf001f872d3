use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Internal server error")]
    Media(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_)
            | ApiError::Hashing(_)
            | ApiError::Media(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Unexpected failures are logged with their cause; the response only
        // ever carries the generic message.
        match self {
            ApiError::Database(e) => error!("Database error: {:?}", e),
            ApiError::Hashing(e) => error!("Password hashing error: {:?}", e),
            ApiError::Media(msg) => error!("Media storage error: {}", msg),
            ApiError::Internal(msg) => error!("Internal error: {}", msg),
            _ => {}
        }

        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "success": false,
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        }))
    }
}
