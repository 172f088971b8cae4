use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables once at
/// process start. The access and refresh secrets must differ so a refresh
/// token can never be replayed as an access token.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_token_secret = std::env::var("CAMPUS_ACCESS_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("CAMPUS_ACCESS_TOKEN_SECRET is required".into()))?;
        let refresh_token_secret = std::env::var("CAMPUS_REFRESH_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("CAMPUS_REFRESH_TOKEN_SECRET is required".into()))?;
        let access_token_ttl_secs = std::env::var("CAMPUS_ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(24 * 60 * 60);
        let refresh_token_ttl_secs = std::env::var("CAMPUS_REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7 * 24 * 60 * 60);

        let config = Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AuthResult<()> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.access_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            return Err(AuthError::Config("token TTLs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_identical_secrets() {
        let config = AuthConfig {
            access_token_secret: "same".into(),
            refresh_token_secret: "same".into(),
            access_token_ttl_secs: 86400,
            refresh_token_ttl_secs: 604800,
        };
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }

    #[test]
    fn accepts_distinct_secrets() {
        let config = AuthConfig {
            access_token_secret: "access".into(),
            refresh_token_secret: "refresh".into(),
            access_token_ttl_secs: 86400,
            refresh_token_ttl_secs: 604800,
        };
        assert!(config.validate().is_ok());
    }
}
