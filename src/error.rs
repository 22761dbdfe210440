use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
pub enum AppError {
    Unauthorized(&'static str),
    BadRequest(String),
    TooManyAttempts(u64),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::TooManyAttempts(remaining) => (
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Too many login attempts. Try again in {} seconds.",
                    remaining
                ),
            ),
        };
        (status, message).into_response()
    }
}
