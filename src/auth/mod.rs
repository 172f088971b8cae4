//! Authentication module: configuration, credential storage, password
//! hashing, token minting/verification, Rocket request guards, and the
//! HTTP route handlers for the session lifecycle.

use std::sync::Arc;

use rocket_db_pools::sqlx::PgPool;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin};
pub use jwt::TokenService;
pub use passwords::PasswordService;
pub use store::UserStore;

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub token_service: Arc<TokenService>,
    pub user_store: UserStore,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        token_service: TokenService,
        user_store: UserStore,
    ) -> Self {
        Self {
            config,
            password_service: Arc::new(password_service),
            token_service: Arc::new(token_service),
            user_store,
        }
    }

    /// Build the full state from a loaded configuration and a pool handle.
    pub fn from_config(config: AuthConfig, pool: PgPool) -> AuthResult<Self> {
        let password_service = PasswordService::new()?;
        let token_service = TokenService::from_config(&config)?;
        let user_store = UserStore::new(pool);
        Ok(Self::new(config, password_service, token_service, user_store))
    }
}
