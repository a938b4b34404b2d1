//! Response DTOs
//!
//! Data structures for API response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::AuthDocument;

/// Public projection of an [`AuthDocument`]; the password hash never leaves
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDataResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub u_id: String,
    pub username: String,
    pub email: String,
    pub avatar_color: String,
    pub created_at: DateTime<Utc>,
}

impl From<&AuthDocument> for AuthDataResponse {
    fn from(doc: &AuthDocument) -> Self {
        Self {
            id: doc.id,
            u_id: doc.u_id.clone(),
            username: doc.username.clone(),
            email: doc.email.clone(),
            avatar_color: doc.avatar_color.clone(),
            created_at: doc.created_at,
        }
    }
}

/// Signup response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub message: String,
    pub auth_data: AuthDataResponse,
}

/// Plain message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
