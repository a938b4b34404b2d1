//! Custom Extractors
//!
//! Body parsing for JSON and extended url-encoded requests, and the request
//! context handed to validated handlers.

use axum::{
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::form;
use crate::presentation::middleware::Session;
use crate::shared::error::AppError;
use crate::shared::validation::RequestPayload;
use crate::startup::AppState;

/// Request body parsed from JSON or url-encoded form data.
///
/// Oversized bodies fail with [`AppError::PayloadTooLarge`] before the
/// handler runs; any other malformed body fails with
/// [`AppError::BadRequest`].
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn rejection(status: StatusCode, body_text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the size limit".into())
    } else {
        AppError::BadRequest(body_text)
    }
}

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|r| rejection(r.status(), r.body_text()))?;

            let value = serde_json::from_value(form::nest(pairs))
                .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;
            return Ok(Payload(value));
        }

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|r| rejection(r.status(), r.body_text()))?;
        Ok(Payload(value))
    }
}

/// Everything a body-carrying handler needs: shared state, the session and
/// the raw parsed body.
#[derive(Clone)]
pub struct RequestContext {
    pub state: AppState,
    pub session: Session,
    pub body: Value,
}

impl RequestContext {
    /// Deserialize the body into a typed request
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
    }
}

impl RequestPayload for RequestContext {
    fn payload(&self) -> &Value {
        &self.body
    }
}

impl FromRequest<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = req.extensions().get::<Session>().cloned().unwrap_or_default();
        let Payload(body) = Payload::<Value>::from_request(req, state).await?;

        Ok(Self {
            state: state.clone(),
            session,
            body,
        })
    }
}
