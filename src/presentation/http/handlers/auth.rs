//! Authentication Handlers

use std::future::Future;

use axum::{http::StatusCode, Json};
use futures::future::BoxFuture;

use crate::application::dto::{AuthDataResponse, SignUpRequest, SignUpResponse};
use crate::application::services::{AuthError, AuthService, AuthServiceImpl};
use crate::domain::StoreError;
use crate::presentation::http::RequestContext;
use crate::shared::error::{AppError, HandlerError};
use crate::shared::validation::{validated, Field, Schema};

/// Session key holding the signed-in user's `uId`
pub const SESSION_USER_KEY: &str = "uId";

type SignUpResult = Result<(StatusCode, Json<SignUpResponse>), HandlerError>;

/// Answer for a username or email that is already taken
fn already_exists() -> HandlerError {
    AppError::BadRequest("User already exist".into()).into()
}

/// Body rules for `POST /api/v1/signup`
pub fn signup_schema() -> Schema {
    Schema::new()
        .field(
            Field::string("username")
                .required()
                .min(4)
                .max(8)
                .message("Invalid username"),
        )
        .field(
            Field::string("password")
                .required()
                .min(4)
                .max(8)
                .message("Invalid password"),
        )
        .field(Field::email("email").required().message("Email must be valid"))
        .field(
            Field::string("avatarColor")
                .required()
                .message("Avatar color is required"),
        )
        .field(
            Field::string("avatarImage")
                .required()
                .message("Avatar image is required"),
        )
}

/// `POST /api/v1/signup`, validated before [`create`] runs
pub fn signup() -> impl Fn(RequestContext) -> BoxFuture<'static, SignUpResult> + Clone + Send + Sync + 'static
{
    validated(signup_schema(), create)
}

/// Create the user, record it in the session and answer 201
pub fn create(ctx: RequestContext) -> impl Future<Output = SignUpResult> + Send + 'static {
    async move {
        let request: SignUpRequest = ctx.parse()?;
        let service = AuthServiceImpl::new(ctx.state.store.clone());

        if service
            .get_user_by_username_or_email(&request.username, &request.email)
            .await?
            .is_some()
        {
            return Err(already_exists());
        }

        // A concurrent signup can pass the lookup; the unique indexes catch it
        let auth = service
            .create_auth_user(request)
            .await
            .map_err(|err| match err {
                AuthError::Store(StoreError::Duplicate(_)) => already_exists(),
                other => other.into(),
            })?;
        ctx.session.insert(SESSION_USER_KEY, &auth.u_id)?;

        tracing::info!(u_id = %auth.u_id, username = %auth.username, "User signed up");

        Ok((
            StatusCode::CREATED,
            Json(SignUpResponse {
                message: "User created successfully".into(),
                auth_data: AuthDataResponse::from(&auth),
            }),
        ))
    }
}
