use crate::utils::try_respond;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self) -> Result<Self, Self::Error>;
}

/// Failure taxonomy shared by every repository operation and route.
#[derive(Debug)]
pub enum ApiError {
    /// Any storage failure that is not a constraint outcome below.
    Diesel(DieselError),
    Validation(ValidationError),
    NotFound,
    /// Unique constraint violation, carrying the storage message.
    Conflict(String),
    Forbidden,
    Unauthorized,
    Internal,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        match err {
            DieselError::NotFound => ApiError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ApiError::Conflict(info.message().to_owned())
            }
            // the referenced article (or user) vanished underneath the insert
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                ApiError::NotFound
            }
            other => ApiError::Diesel(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
pub struct ValidationError(BTreeMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn errors(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Ok(value)` when nothing was recorded, otherwise the accumulated errors.
    pub fn or_ok<T>(self, value: T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::Diesel(_) | ApiError::Internal => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = match self {
            ApiError::Validation(error) => json!({ "errors": error }),
            ApiError::NotFound => json!({ "errors": { "body": ["entity not found"] } }),
            ApiError::Conflict(message) => json!({ "errors": { "body": [message] } }),
            ApiError::Forbidden => json!({ "errors": { "body": ["forbidden"] } }),
            ApiError::Unauthorized => json!({ "errors": { "status": "401 Unauthorized" } }),
            ApiError::Diesel(error) => {
                tracing::error!(%error, "storage failure");
                json!({ "errors": { "body": ["internal error"] } })
            }
            ApiError::Internal => json!({ "errors": { "body": ["internal error"] } }),
        };
        try_respond(req, &body, status)
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self) -> Result<Self, Self::Error> {
        let inner = self.into_inner();
        let validated = inner.validate()?;
        Ok(Json(validated))
    }
}
