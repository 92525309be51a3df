pub mod password;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::store::users::{UserRecord, UserStore};
use crate::store::StoreError;

pub use password::{hash_password, verify_password};

/// Role allowed to create users
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("Authorization header must use Bearer token format")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Refresh window has expired")]
    RefreshExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Missing required role: {0}")]
    MissingRole(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Invalid user data: {0}")]
    InvalidInput(String),

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(name) => AuthError::UserExists(name),
            other => AuthError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    /// Last moment the token may be exchanged at /refresh
    pub rf_exp: i64,
    pub jti: Uuid,
}

/// Issues and checks HS256 access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifespan: Duration,
    refresh_lifespan: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], access_lifespan: Duration, refresh_lifespan: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_lifespan,
            refresh_lifespan,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::seconds(config.access_token_lifespan_secs),
            Duration::seconds(config.refresh_token_lifespan_secs),
        )
    }

    /// Fresh token for a user that just authenticated
    pub fn issue(&self, user: &UserRecord) -> Result<String, AuthError> {
        self.issue_at(&user.username, &user.roles, Utc::now(), None)
    }

    fn issue_at(
        &self,
        sub: &str,
        roles: &[String],
        now: DateTime<Utc>,
        rf_exp: Option<i64>,
    ) -> Result<String, AuthError> {
        let rf_exp = rf_exp.unwrap_or_else(|| (now + self.refresh_lifespan).timestamp());
        let claims = Claims {
            sub: sub.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + self.access_lifespan).timestamp().min(rf_exp),
            rf_exp,
            jti: Uuid::new_v4(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    /// Verify signature and access expiry
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Exchange a token whose access window may have lapsed for a new one.
    /// The refresh deadline of the original token carries over unchanged.
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        self.refresh_at(token, Utc::now())
    }

    fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if claims.rf_exp <= now.timestamp() {
            return Err(AuthError::RefreshExpired);
        }

        self.issue_at(&claims.sub, &claims.roles, now, Some(claims.rf_exp))
    }
}

/// Check credentials against the user store
pub async fn authenticate(
    users: &dyn UserStore,
    username: &str,
    password: &str,
) -> Result<UserRecord, AuthError> {
    let user = users
        .find(username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let (candidate, stored) = (password.to_string(), user.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    if !verified {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

/// Create a user with a freshly hashed password. `cost` is the bcrypt work factor.
pub async fn create_user(
    users: &dyn UserStore,
    username: &str,
    password: &str,
    roles: Vec<String>,
    cost: u32,
) -> Result<UserRecord, AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidInput("username is empty".into()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is empty".into()));
    }

    let plain = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain, cost))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    let user = UserRecord {
        username: username.to_string(),
        password_hash,
        roles,
    };
    users.insert(user.clone()).await?;
    Ok(user)
}
