//! Greeting endpoint.

use axum::Json;

use crate::application::dto::MessageResponse;

/// `GET /`
pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new("hello world"))
}
