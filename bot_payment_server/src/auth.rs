use std::{
    future::{ready, Ready},
    time::Duration,
};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use bot_payment_engine::db_types::{Principal, Role};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24);

/// The claims carried by every access token. The middleware places them in the request extensions once the token is
/// verified, and handlers receive them as an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Expiry, as a unix timestamp in seconds.
    pub exp: i64,
}

impl JwtClaims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id, self.email.as_str(), self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("🔐️ No JWT claims found in request extensions. Is the route outside the /api scope?");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Signs and verifies HS256 access tokens.
///
/// Users log in elsewhere; the issuer exists so that operators and tests can mint tokens with the same secret the
/// server verifies against.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        validation.set_required_spec_claims(&["exp"]);
        Self { encoding_key: EncodingKey::from_secret(secret), decoding_key: DecodingKey::from_secret(secret), validation }
    }

    /// Issue a new access token for the given user. The caller is responsible for having authenticated them.
    pub fn issue_token(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        lifetime: Option<Duration>,
    ) -> Result<String, AuthError> {
        let lifetime = lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let exp = Utc::now().timestamp() + i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = JwtClaims { user_id, email: email.to_string(), role, exp };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("🔐️ Access token rejected. {e}");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ValidationError("Token has expired".into()),
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::ValidationError("Token signature is invalid".into())
                },
                _ => AuthError::ValidationError("Token is malformed".into()),
            }
        })?;
        Ok(data.claims)
    }
}
