use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::responses::Role;
use crate::auth::{AuthError, AuthResult, AuthState};

/// Public message left behind by a failed guard, read by the 401/403
/// catchers so the specific failure kind reaches the caller.
#[derive(Debug, Clone, Default)]
pub struct GuardError(pub Option<String>);

/// Verified identity attached to a request. Built statelessly from the
/// bearer access token; holds no connection to storage, so concurrent
/// requests share nothing but the immutable key material in `AuthState`.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Compare the attached role against a handler-declared allowed set.
    pub fn authorize(&self, allowed: &[Role]) -> AuthResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                request.local_cache(|| GuardError(Some(err.public_message())));
                Outcome::Error((err.status(), err))
            }
        }
    }
}

/// Guard for admin-only operations.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct RequireAdmin(pub AuthUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAdmin {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(request).await {
            Outcome::Success(user) => match user.authorize(&[Role::Admin]) {
                Ok(()) => Outcome::Success(RequireAdmin(user)),
                Err(err) => {
                    request.local_cache(|| GuardError(Some(err.public_message())));
                    Outcome::Error((Status::Forbidden, err))
                }
            },
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(_) => Outcome::Error((Status::Unauthorized, AuthError::Unauthorized)),
        }
    }
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let token = bearer_token_from_request(request)?;

    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let claims = auth_state.token_service.decode_access_token(token)?;

    let user_id: i64 = claims.sub.parse().map_err(|_| AuthError::TokenMalformed)?;
    let role = Role::parse(&claims.role).ok_or(AuthError::TokenMalformed)?;

    Ok(AuthUser {
        id: user_id,
        email: claims.email,
        role,
    })
}

fn bearer_token_from_request<'r>(request: &'r Request<'_>) -> AuthResult<&'r str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthorized)?;
    parse_bearer_header(header).ok_or(AuthError::Unauthorized)
}

fn parse_bearer_header(header: &str) -> Option<&str> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 7,
            email: "staff@example.com".into(),
            role,
        }
    }

    #[test]
    fn authorize_accepts_member_roles() {
        let allowed = [Role::Admin, Role::SchoolAdmin];
        assert!(user(Role::Admin).authorize(&allowed).is_ok());
        assert!(user(Role::SchoolAdmin).authorize(&allowed).is_ok());
    }

    #[test]
    fn authorize_rejects_non_member_roles() {
        let allowed = [Role::Admin, Role::SchoolAdmin];
        let err = user(Role::Parent).authorize(&allowed).expect_err("forbidden");
        assert!(matches!(err, AuthError::Forbidden));
        assert_eq!(err.status(), Status::Forbidden);
    }

    #[test]
    fn parses_bearer_headers() {
        assert_eq!(parse_bearer_header("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer_header("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_header("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer_header("Bearer"), None);
        assert_eq!(parse_bearer_header("Bearer "), None);
        assert_eq!(parse_bearer_header(""), None);
    }
}
