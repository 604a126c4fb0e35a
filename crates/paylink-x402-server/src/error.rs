use actix_web::{HttpResponse, ResponseError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("short URL not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ServerError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServerError::InvalidUrl(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid URL provided",
                "code": "invalid_url",
                "reason": msg
            })),
            ServerError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Short URL not found",
                "code": "not_found"
            })),
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error",
                    "code": "internal_error"
                }))
            }
            ServerError::Database(e) => {
                tracing::error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error",
                    "code": "database_error"
                }))
            }
        }
    }
}
