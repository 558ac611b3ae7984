use crate::config::Config;
use crate::types::ApiError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome};
use rocket::Request;
use serde::{Deserialize, Serialize};

pub mod models;

/// The authenticated user making a request. Routes take `Viewer` when a login
/// is mandatory and `Option<Viewer>` when anonymous access is fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub i32);

impl Viewer {
    pub fn id(self) -> i32 {
        self.0
    }
}

/// Claims carried by the `Authorization: Token <jwt>` header.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: i64,
}

pub fn decode_token(token: &str, secret: &[u8]) -> Result<Viewer, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|error| {
        tracing::debug!(%error, "rejected token");
        ApiError::Unauthorized
    })?;
    data.claims
        .sub
        .parse::<i32>()
        .map(Viewer)
        .map_err(|_| ApiError::Unauthorized)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Viewer {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<Config>() {
            Some(config) => config,
            None => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };
        let token_header = match request.headers().get_one("Authorization") {
            Some(header) => header,
            None => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };
        let token = token_header.strip_prefix("Token ").unwrap_or(token_header);
        match decode_token(token, config.secret.as_bytes()) {
            Ok(viewer) => Outcome::Success(viewer),
            Err(e) => Outcome::Error((Status::Unauthorized, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"unit-test-secret";

    fn token(sub: &str, exp: i64, secret: &[u8]) -> String {
        let claims = Claims {
            sub: sub.to_owned(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn valid_token_yields_viewer() {
        let viewer = decode_token(&token("17", in_an_hour(), SECRET), SECRET).unwrap();
        assert_eq!(viewer.id(), 17);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let result = decode_token(&token("17", in_an_hour(), b"other"), SECRET);
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let result = decode_token(&token("17", 1_000, SECRET), SECRET);
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn non_numeric_subject_is_unauthorized() {
        let result = decode_token(&token("alice", in_an_hour(), SECRET), SECRET);
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }
}
