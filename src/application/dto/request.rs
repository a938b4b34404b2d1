//! Request DTOs
//!
//! Data structures for API request bodies. Shape checks happen in the
//! route's validation schema before these are deserialized.

use serde::Deserialize;

/// Signup request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar_color: String,
    /// Accepted and validated; uploading it is handled elsewhere
    pub avatar_image: String,
}
