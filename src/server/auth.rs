//! Operator accounts and JWT authentication.
//!
//! Operators register with a username and password (stored as an Argon2
//! hash) and log in for an HS256 bearer token. When `auth.enabled` is set
//! the CRUD routes sit behind [`require_auth`]; otherwise they are open and
//! the `/auth/*` endpoints answer 501.
//!
//! # Configuration
//!
//! - `EXPIRY_WATCH_AUTH_ENABLED` - Turn authentication on
//! - `EXPIRY_WATCH_JWT_SECRET` - Secret key for HS256 signing (supports `env:VAR`)

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{resolve_secret, AuthConfig};
use crate::errors::{WatchError, WatchResult};
use crate::server::handlers::AppState;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Username of the operator
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

/// Operator identity attached to authenticated requests as an extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,
    #[error("invalid authorization header format")]
    InvalidHeader,
    #[error("Invalid token")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("authentication is not enabled")]
    AuthDisabled,
    #[error(transparent)]
    Request(#[from] WatchError),
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            AuthError::InvalidHeader => (StatusCode::UNAUTHORIZED, "INVALID_HEADER"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::AuthDisabled => (StatusCode::NOT_IMPLEMENTED, "AUTH_DISABLED"),
            AuthError::Request(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let err = match self {
            AuthError::Request(inner) => return inner.into_response(),
            other => other,
        };

        if let AuthError::InvalidToken(reason) = &err {
            warn!("rejected bearer token: {reason}");
        }

        let (status, code) = err.status_and_code();
        let body = serde_json::json!({
            "error": err.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

/// JWT issuer and validator.
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiration_secs: u64,
}

impl JwtValidator {
    /// Create a new JWT validator from auth configuration.
    pub fn from_config(config: &AuthConfig) -> WatchResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(WatchError::ConfigError(
                "jwt_secret is required for JWT authentication".to_string(),
            ));
        }

        let secret = resolve_secret(&config.jwt_secret)?;

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiration_secs: config.token_expiration_secs,
        })
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }

    /// Issue a token for `username`.
    pub fn create_token(&self, username: &str) -> WatchResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| WatchError::ServerError(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| WatchError::ServerError(format!("failed to create token: {e}")))
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

/// Authentication part of the application state.
#[derive(Clone)]
pub struct AuthState {
    pub enabled: bool,
    /// `None` when auth is disabled
    pub validator: Option<Arc<JwtValidator>>,
}

impl AuthState {
    /// Create auth state from configuration.
    pub fn from_config(config: &AuthConfig) -> WatchResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let validator = JwtValidator::from_config(config)?;
        Ok(Self {
            enabled: true,
            validator: Some(Arc::new(validator)),
        })
    }

    /// Create a disabled auth state.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            validator: None,
        }
    }

    fn validator(&self) -> Result<&JwtValidator, AuthError> {
        match (self.enabled, &self.validator) {
            (true, Some(validator)) => Ok(validator),
            _ => Err(AuthError::AuthDisabled),
        }
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Middleware guarding the CRUD routes when auth is enabled.
///
/// On success the caller's [`AuthenticatedUser`] is added to the request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let validator = state.auth.validator()?;

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidHeader)?;

    let claims = validator.validate_token(token)?.claims;
    request.extensions_mut().insert(AuthenticatedUser {
        username: claims.sub,
    });

    Ok(next.run(request).await)
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> WatchResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WatchError::ServerError(format!("failed to hash password: {e}")))
}

/// Check a password against a stored PHC hash string.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Body of `/auth/register` and `/auth/login`.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    fn into_parts(self) -> WatchResult<(String, String)> {
        match (self.username, self.password) {
            (Some(username), Some(password))
                if !username.trim().is_empty() && !password.is_empty() =>
            {
                Ok((username, password))
            }
            _ => Err(WatchError::InvalidInput(
                "Username and password required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// `POST /auth/register`
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    state.auth.validator()?;
    let (username, password) = payload.into_parts()?;

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| WatchError::ServerError(format!("hashing task failed: {e}")))??;

    state.db.insert_user(&username, &password_hash).await?;
    info!(%username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully",
        }),
    ))
}

/// `POST /auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, AuthError> {
    let validator = state.auth.validator()?;
    let (username, password) = payload
        .into_parts()
        .map_err(|_| AuthError::InvalidCredentials)?;

    let Some(user) = state.db.get_user(&username).await? else {
        warn!(%username, "login for unknown user");
        return Err(AuthError::InvalidCredentials);
    };

    let verified =
        tokio::task::spawn_blocking(move || verify_password(&password, &user.password_hash))
            .await
            .map_err(|e| WatchError::ServerError(format!("hashing task failed: {e}")))?;

    if !verified {
        warn!(%username, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = validator.create_token(&username)?;
    info!(%username, "User logged in");

    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            jwt_secret: "test-secret-key-for-testing-only".to_string(),
            jwt_issuer: "expiry-watch".to_string(),
            jwt_audience: "expiry-watch-api".to_string(),
            token_expiration_secs: 3600,
        }
    }

    #[test]
    fn create_and_validate_token() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();

        let token = validator.create_token("alice").unwrap();
        let token_data = validator.validate_token(&token).unwrap();

        assert_eq!(token_data.claims.sub, "alice");
        assert_eq!(token_data.claims.iss, "expiry-watch");
        assert_eq!(token_data.claims.aud, "expiry-watch-api");
        assert_eq!(token_data.claims.exp - token_data.claims.iat, 3600);
    }

    #[test]
    fn reject_token_from_other_secret() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();
        let token = validator.create_token("alice").unwrap();

        let other = JwtValidator::from_config(&AuthConfig {
            jwt_secret: "different-secret".to_string(),
            ..test_config()
        })
        .unwrap();

        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn reject_expired_token() {
        let config = test_config();
        let validator = JwtValidator::from_config(&config).unwrap();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let expired = Claims {
            sub: "alice".to_string(),
            iat: now - 7200,
            exp: now - 3600,
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            validator.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn empty_secret_fails() {
        let config = AuthConfig {
            enabled: true,
            jwt_secret: String::new(),
            ..Default::default()
        };
        assert!(JwtValidator::from_config(&config).is_err());
    }

    #[test]
    fn disabled_auth_state_has_no_validator() {
        let state = AuthState::from_config(&AuthConfig::default()).unwrap();
        assert!(!state.enabled);
        assert!(matches!(state.validator(), Err(AuthError::AuthDisabled)));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn credentials_require_both_fields() {
        let missing = Credentials {
            username: Some("alice".to_string()),
            password: None,
        };
        assert!(missing.into_parts().is_err());

        let blank = Credentials {
            username: Some("  ".to_string()),
            password: Some("pw".to_string()),
        };
        assert!(blank.into_parts().is_err());
    }
}
