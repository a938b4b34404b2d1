//! Auth document.
//!
//! Stored in the `auth` collection; one document per signed-up user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection holding [`AuthDocument`]s
pub const AUTH_COLLECTION: &str = "auth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,

    /// Public numeric identifier, stored in the session
    pub u_id: String,

    /// Capitalized form of the submitted username
    pub username: String,

    /// Lower-cased form of the submitted email
    pub email: String,

    /// Argon2 PHC string, never the plain password
    pub password: String,

    pub avatar_color: String,

    pub created_at: DateTime<Utc>,
}
