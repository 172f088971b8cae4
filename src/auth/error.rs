use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    Conflict,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account deactivated")]
    AccountDisabled,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenBadSignature,
    #[error("token invalid")]
    TokenMalformed,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("service temporarily unavailable")]
    Unavailable,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::Validation(_) | AuthError::Conflict => Status::BadRequest,
            AuthError::InvalidCredentials | AuthError::AccountDisabled => Status::Unauthorized,
            AuthError::TokenExpired
            | AuthError::TokenBadSignature
            | AuthError::TokenMalformed
            | AuthError::InvalidRefreshToken => Status::Unauthorized,
            AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::NotFound => Status::NotFound,
            AuthError::Unavailable => Status::ServiceUnavailable,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    /// Message safe to echo back to the client. Internal failure detail
    /// stays in the server log.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Config(_)
            | AuthError::Other(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<rocket_db_pools::sqlx::Error> for AuthError {
    fn from(err: rocket_db_pools::sqlx::Error) -> Self {
        match err {
            rocket_db_pools::sqlx::Error::PoolTimedOut => AuthError::Unavailable,
            other => AuthError::Sqlx(other),
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
