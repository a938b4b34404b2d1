//! Validation Utilities
//!
//! Declarative request-body schemas and the [`validated`] handler wrapper.
//!
//! A [`Schema`] is an ordered list of field rules over a JSON object. It is
//! immutable once built, so one schema can be shared by every invocation of
//! the handler it guards.
//!
//! ```rust,ignore
//! let schema = Schema::new()
//!     .field(Field::string("username").required().min(4).max(8))
//!     .field(Field::email("email").required());
//!
//! let handler = validated(schema, |ctx: RequestContext| async move { ... });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use validator::{ValidateEmail, ValidateLength};

use super::error::{AppError, HandlerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Any,
    String,
    Email,
}

/// Constraints for one field of the payload
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: Kind,
    required: bool,
    allow_empty: bool,
    min: Option<u64>,
    max: Option<u64>,
    one_of: Option<Vec<String>>,
    message: Option<String>,
}

impl Field {
    fn new(name: &str, kind: Kind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            required: false,
            allow_empty: false,
            min: None,
            max: None,
            one_of: None,
            message: None,
        }
    }

    /// Any JSON value
    pub fn any(name: &str) -> Self {
        Self::new(name, Kind::Any)
    }

    /// A string; empty strings are rejected unless [`Field::allow_empty`] is set
    pub fn string(name: &str) -> Self {
        Self::new(name, Kind::String)
    }

    /// A string holding a valid email address
    pub fn email(name: &str) -> Self {
        Self::new(name, Kind::Email)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Minimum length in characters
    pub fn min(mut self, min: u64) -> Self {
        self.min = Some(min);
        self
    }

    /// Maximum length in characters
    pub fn max(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Replace every violation message of this field
    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_owned());
        self
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            None | Some(Value::Null) if self.required => {
                return Err(format!("\"{}\" is required", self.name))
            }
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        if self.kind == Kind::Any {
            return Ok(());
        }

        let Value::String(text) = value else {
            return Err(format!("\"{}\" must be a string", self.name));
        };

        if text.is_empty() {
            return if self.allow_empty {
                Ok(())
            } else {
                Err(format!("\"{}\" is not allowed to be empty", self.name))
            };
        }

        if let Some(min) = self.min {
            if !text.validate_length(Some(min), None, None) {
                return Err(format!(
                    "\"{}\" length must be at least {} characters long",
                    self.name, min
                ));
            }
        }

        if let Some(max) = self.max {
            if !text.validate_length(None, Some(max), None) {
                return Err(format!(
                    "\"{}\" length must be less than or equal to {} characters long",
                    self.name, max
                ));
            }
        }

        if self.kind == Kind::Email && !text.validate_email() {
            return Err(format!("\"{}\" must be a valid email", self.name));
        }

        if let Some(allowed) = &self.one_of {
            if !allowed.iter().any(|candidate| candidate == text) {
                return Err(format!(
                    "\"{}\" must be one of [{}]",
                    self.name,
                    allowed.join(", ")
                ));
            }
        }

        Ok(())
    }
}

/// A single failed constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// Every violation of a payload, in schema declaration order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn first(&self) -> &Violation {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }
}

/// Ordered field constraints over a JSON object payload
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Check `payload` against every field, collecting all violations.
    pub fn validate(&self, payload: &Value) -> Result<(), Violations> {
        let Value::Object(object) = payload else {
            return Err(Violations(vec![Violation {
                field: "value".into(),
                message: "\"value\" must be of type object".into(),
            }]));
        };

        let violations: Vec<Violation> = self
            .fields
            .iter()
            .filter_map(|field| {
                field.check(object.get(&field.name)).err().map(|message| Violation {
                    field: field.name.clone(),
                    message: field.message.clone().unwrap_or(message),
                })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Violations(violations))
        }
    }
}

/// Convert validation errors to AppError.
///
/// Only the first violation reaches the client; the remaining ones are
/// logged at debug level.
pub fn validation_error(violations: Violations) -> AppError {
    if violations.len() > 1 {
        tracing::debug!(
            count = violations.len(),
            violations = ?violations.iter().map(|v| v.field.as_str()).collect::<Vec<_>>(),
            "Multiple validation violations, reporting the first"
        );
    }
    AppError::Validation(violations.first().message.clone())
}

/// Request contexts that expose the parsed request body
pub trait RequestPayload {
    fn payload(&self) -> &Value;
}

/// Wrap `handler` so its payload is checked against `schema` first.
///
/// The returned handler takes and returns exactly what `handler` does. On a
/// violation it fails with [`AppError::Validation`] carrying the first
/// violation message and `handler` is never called; otherwise `handler` runs
/// with the untouched context and its result is awaited and returned.
pub fn validated<C, H, Fut, R>(
    schema: Schema,
    handler: H,
) -> impl Fn(C) -> BoxFuture<'static, Result<R, HandlerError>> + Clone + Send + Sync + 'static
where
    C: RequestPayload + Send + 'static,
    H: Fn(C) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Send + 'static,
{
    let schema = Arc::new(schema);
    move |ctx: C| {
        let schema = Arc::clone(&schema);
        let handler = handler.clone();
        Box::pin(async move {
            schema.validate(ctx.payload()).map_err(validation_error)?;
            handler(ctx).await
        })
    }
}
