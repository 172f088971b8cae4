use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::responses::Role;
use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Claims carried by an access token. Authorizes individual requests;
/// never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Claims carried by a refresh token. Signed with a secret distinct from
/// the access secret, and deliberately free of email/role: the current
/// values are re-read from storage when a new access token is minted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub algorithm: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        let bytes = secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }
}

pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Zero leeway: a token with expiry T is accepted up to T and
        // rejected strictly after it.
        validation.leeway = 0;

        Ok(Self {
            access: KeyPair::from_secret(&config.access_token_secret),
            refresh: KeyPair::from_secret(&config.refresh_token_secret),
            validation,
            access_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs),
        })
    }

    pub fn issue_access_token(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
    ) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding)?;

        Ok(SignedToken { token, expires_at })
    }

    pub fn issue_refresh_token(&self, user_id: i64) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + self.refresh_ttl;

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding)?;

        Ok(SignedToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.access.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(classify_decode_error)
    }

    pub fn decode_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        decode::<RefreshTokenClaims>(token, &self.refresh.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(classify_decode_error)
    }

    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            algorithm: "HS256".to_string(),
            access_token_ttl_secs: self.access_ttl.num_seconds(),
            refresh_token_ttl_secs: self.refresh_ttl.num_seconds(),
        }
    }
}

/// Collapse the jsonwebtoken error space into the three failure kinds the
/// callers act on: expired means re-authenticate or refresh, the other two
/// mean retrying the same token is pointless.
fn classify_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::TokenBadSignature,
        _ => AuthError::TokenMalformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ACCESS_SECRET: &str = "test-access-secret";
    const TEST_REFRESH_SECRET: &str = "test-refresh-secret";

    fn make_test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: TEST_ACCESS_SECRET.into(),
            refresh_token_secret: TEST_REFRESH_SECRET.into(),
            access_token_ttl_secs: 86400,
            refresh_token_ttl_secs: 604800,
        }
    }

    fn service() -> TokenService {
        TokenService::from_config(&make_test_config()).expect("token service")
    }

    #[test]
    fn issues_and_decodes_access_tokens() {
        let service = service();
        let signed = service
            .issue_access_token(42, "ann@example.com", Role::Parent)
            .expect("issue token");

        let claims = service
            .decode_access_token(&signed.token)
            .expect("decode token");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.role, "parent");
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp, signed.expires_at.timestamp());
    }

    #[test]
    fn issues_and_decodes_refresh_tokens() {
        let service = service();
        let signed = service.issue_refresh_token(42).expect("issue token");
        let claims = service
            .decode_refresh_token(&signed.token)
            .expect("decode token");
        assert_eq!(claims.sub, "42");
    }

    #[test]
    fn two_tokens_for_same_user_differ() {
        let service = service();
        let first = service
            .issue_access_token(42, "ann@example.com", Role::Parent)
            .expect("first");
        let second = service
            .issue_access_token(42, "ann@example.com", Role::Parent)
            .expect("second");
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn expired_access_token_is_classified_expired() {
        let service = service();
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: "42".into(),
            email: "ann@example.com".into(),
            role: "parent".into(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_ACCESS_SECRET.as_bytes()),
        )
        .expect("encode");

        let err = service.decode_access_token(&token).expect_err("must fail");
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn refresh_secret_does_not_verify_access_tokens() {
        let service = service();
        let access = service
            .issue_access_token(42, "ann@example.com", Role::Parent)
            .expect("issue access");

        // A token signed with the access secret must not pass refresh
        // verification, and vice versa.
        let err = service
            .decode_refresh_token(&access.token)
            .expect_err("cross-secret decode must fail");
        assert!(matches!(err, AuthError::TokenBadSignature));

        let refresh = service.issue_refresh_token(42).expect("issue refresh");
        let err = service
            .decode_access_token(&refresh.token)
            .expect_err("cross-secret decode must fail");
        assert!(matches!(err, AuthError::TokenBadSignature));
    }

    #[test]
    fn garbage_is_classified_malformed() {
        let service = service();
        let err = service
            .decode_access_token("not.a.jwt")
            .expect_err("must fail");
        assert!(matches!(err, AuthError::TokenMalformed));

        let err = service.decode_access_token("").expect_err("must fail");
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let service = service();
        let signed = service
            .issue_access_token(42, "ann@example.com", Role::Parent)
            .expect("issue");

        let mut parts: Vec<String> = signed.token.split('.').map(str::to_string).collect();
        assert_eq!(parts.len(), 3);
        // Swap in a payload claiming a different identity.
        parts[1] = {
            let forged = AccessTokenClaims {
                sub: "1".into(),
                email: "admin@example.com".into(),
                role: "admin".into(),
                iat: Utc::now().timestamp(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                jti: Uuid::new_v4().to_string(),
            };
            let token = encode(
                &Header::new(Algorithm::HS256),
                &forged,
                &EncodingKey::from_secret(b"attacker-secret"),
            )
            .expect("encode forged");
            token.split('.').nth(1).expect("payload").to_string()
        };
        let tampered = parts.join(".");

        let err = service
            .decode_access_token(&tampered)
            .expect_err("tampered token must fail");
        assert!(matches!(err, AuthError::TokenBadSignature));
    }
}
