//! Authentication Service
//!
//! Signup lookups and creation of auth documents in the document store.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::dto::SignUpRequest;
use crate::domain::{AuthDocument, DocumentStore, Filter, StoreError, AUTH_COLLECTION};
use crate::shared::helpers::{capitalize, generate_random_digits};

/// Number of digits in a generated `uId`
pub const UID_LENGTH: usize = 12;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Find an existing user by username (capitalized) or email (lower-cased)
    async fn get_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<AuthDocument>, AuthError>;

    /// Hash the password and persist a new auth document
    async fn create_auth_user(&self, request: SignUpRequest) -> Result<AuthDocument, AuthError>;
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Stored auth document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// AuthService implementation backed by a [`DocumentStore`]
#[derive(Clone)]
pub struct AuthServiceImpl {
    store: Arc<dyn DocumentStore>,
}

impl AuthServiceImpl {
    /// Create a new AuthServiceImpl
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Hash a password using Argon2id
    fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    #[instrument(skip(self))]
    async fn get_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<AuthDocument>, AuthError> {
        let filter = Filter::eq("username", capitalize(username)).or("email", email.to_lowercase());

        match self.store.find_one(AUTH_COLLECTION, &filter).await? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn create_auth_user(&self, request: SignUpRequest) -> Result<AuthDocument, AuthError> {
        let document = AuthDocument {
            id: Uuid::new_v4(),
            u_id: generate_random_digits(UID_LENGTH),
            username: capitalize(&request.username),
            email: request.email.to_lowercase(),
            password: Self::hash_password(&request.password)?,
            avatar_color: request.avatar_color,
            created_at: Utc::now(),
        };

        self.store
            .insert_one(AUTH_COLLECTION, serde_json::to_value(&document)?)
            .await?;

        debug!(u_id = %document.u_id, "Auth document created");
        Ok(document)
    }
}
