use chrono::Utc;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;

use crate::auth::guards::{AuthUser, RequireAdmin};
use crate::auth::responses::{
    ChangePasswordRequest, ChangePasswordResponse, LoginRequest, LoginResponse, MeResponse,
    RefreshTokenRequest, RefreshTokenResponse, RegisterRequest, RegisterResponse, Role,
    TokenConfigResponse, UserSummary,
};
use crate::auth::store::NewUser;
use crate::auth::{AuthError, AuthResult, AuthState};

const MIN_PASSWORD_LEN: usize = 6;

type AuthRouteResult<T> = Result<Json<T>, status::Custom<Json<AuthErrorResponse>>>;

#[derive(Debug, serde::Serialize, serde::Deserialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Create an account. Succeeds with no tokens: the client logs in
/// separately afterwards.
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Json<RegisterRequest>,
) -> Result<status::Custom<Json<RegisterResponse>>, status::Custom<Json<AuthErrorResponse>>> {
    let (email, role) = validate_register(&payload).map_err(respond_error)?;

    // Advisory pre-check so a duplicate fails before the hashing cost is
    // paid. The unique index remains the authoritative check under
    // concurrency.
    if state
        .user_store
        .find_by_email(&email)
        .await
        .map_err(respond_error)?
        .is_some()
    {
        return Err(respond_error(AuthError::Conflict));
    }

    let password_hash = state
        .password_service
        .hash_password_async(payload.password.clone())
        .await
        .map_err(respond_error)?;

    let new_user = NewUser {
        email,
        password_hash,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone: payload
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        role,
    };

    let mut tx = state
        .user_store
        .pool()
        .begin()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    let user_id = state
        .user_store
        .create_user_tx(&mut tx, &new_user)
        .await
        .map_err(respond_error)?;

    tx.commit()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    log::info!("registered user {} with role {}", user_id, role.as_str());

    Ok(status::Custom(
        Status::Created,
        Json(RegisterResponse {
            success: true,
            id: user_id,
        }),
    ))
}

/// Authenticate with email and password, returning an access/refresh
/// token pair. Unknown email and wrong password produce the identical
/// generic failure.
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<LoginResponse> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(respond_error(AuthError::Validation(
            "email and password are required".into(),
        )));
    }

    let now = Utc::now();
    let mut tx = state
        .user_store
        .pool()
        .begin()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    let user = state
        .user_store
        .find_by_email_for_update(&mut tx, &email)
        .await
        .map_err(respond_error)?;

    let user = match user {
        Some(user) => user,
        None => return Err(invalid_credentials()),
    };

    if !user.active {
        return Err(respond_error(AuthError::AccountDisabled));
    }

    let verified = state
        .password_service
        .verify_password_async(payload.password.clone(), user.password_hash.clone())
        .await
        .map_err(respond_error)?;

    if !verified {
        return Err(invalid_credentials());
    }

    let role = stored_role(&user.role, user.id).map_err(respond_error)?;

    state
        .user_store
        .update_last_login_tx(&mut tx, user.id, now)
        .await
        .map_err(respond_error)?;

    let access_token = state
        .token_service
        .issue_access_token(user.id, &user.email, role)
        .map_err(respond_error)?;
    let refresh_token = state
        .token_service
        .issue_refresh_token(user.id)
        .map_err(respond_error)?;

    tx.commit()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    log::info!("user {} logged in", user.id);

    Ok(Json(LoginResponse {
        success: true,
        token: access_token.token,
        refresh_token: refresh_token.token,
        user: UserSummary {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
        },
    }))
}

/// Current account state for the bearer identity, including the
/// role-specific profile when the role has one.
#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(state: &State<AuthState>, user: AuthUser) -> AuthRouteResult<MeResponse> {
    let row = state
        .user_store
        .find_by_id(user.id)
        .await
        .map_err(respond_error)?
        .ok_or_else(|| respond_error(AuthError::Unauthorized))?;

    let role = stored_role(&row.role, row.id).map_err(respond_error)?;
    let role_details = state
        .user_store
        .role_details(&row)
        .await
        .map_err(respond_error)?;

    Ok(Json(MeResponse {
        id: row.id,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        role,
        last_login: row.last_login_at,
        created_at: row.created_at,
        role_details,
    }))
}

/// Exchange a refresh token for a fresh access token. The refresh token
/// itself is not rotated. All verification failures collapse into one
/// generic message so callers cannot probe token or account state.
#[openapi(tag = "Auth")]
#[post("/auth/refresh-token", data = "<payload>")]
pub async fn refresh_token(
    state: &State<AuthState>,
    payload: Json<RefreshTokenRequest>,
) -> AuthRouteResult<RefreshTokenResponse> {
    let claims = state
        .token_service
        .decode_refresh_token(&payload.refresh_token)
        .map_err(|_| respond_error(AuthError::InvalidRefreshToken))?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| respond_error(AuthError::InvalidRefreshToken))?;

    // Re-fetch the identity rather than trusting anything cached at issue
    // time: the new access token must reflect the currently stored role.
    let user = state
        .user_store
        .find_by_id(user_id)
        .await
        .map_err(respond_error)?
        .ok_or_else(|| respond_error(AuthError::InvalidRefreshToken))?;

    if !user.active {
        return Err(respond_error(AuthError::InvalidRefreshToken));
    }

    let role = stored_role(&user.role, user.id).map_err(respond_error)?;

    let access_token = state
        .token_service
        .issue_access_token(user.id, &user.email, role)
        .map_err(respond_error)?;

    Ok(Json(RefreshTokenResponse {
        success: true,
        token: access_token.token,
    }))
}

/// Replace the caller's password after re-verifying the current one.
/// Already-issued tokens stay valid until their embedded expiry.
#[openapi(tag = "Auth")]
#[post("/auth/change-password", data = "<payload>")]
pub async fn change_password(
    state: &State<AuthState>,
    user: AuthUser,
    payload: Json<ChangePasswordRequest>,
) -> AuthRouteResult<ChangePasswordResponse> {
    validate_password(&payload.new_password).map_err(respond_error)?;

    let mut tx = state
        .user_store
        .pool()
        .begin()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    let row = state
        .user_store
        .find_by_id_for_update(&mut tx, user.id)
        .await
        .map_err(respond_error)?
        .ok_or_else(|| respond_error(AuthError::Unauthorized))?;

    let verified = state
        .password_service
        .verify_password_async(payload.current_password.clone(), row.password_hash.clone())
        .await
        .map_err(respond_error)?;

    if !verified {
        return Err(invalid_credentials());
    }

    let new_hash = state
        .password_service
        .hash_password_async(payload.new_password.clone())
        .await
        .map_err(respond_error)?;

    state
        .user_store
        .update_password_hash_tx(&mut tx, row.id, &new_hash)
        .await
        .map_err(respond_error)?;

    tx.commit()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    log::info!("user {} changed password", row.id);

    Ok(Json(ChangePasswordResponse { success: true }))
}

/// Token signing parameters, for operators. Admin role required; secrets
/// are never part of the payload.
#[openapi(tag = "Auth")]
#[get("/auth/token-config")]
pub async fn token_config(
    state: &State<AuthState>,
    _admin: RequireAdmin,
) -> AuthRouteResult<TokenConfigResponse> {
    let meta = state.token_service.metadata();
    Ok(Json(TokenConfigResponse {
        algorithm: meta.algorithm,
        access_token_ttl_secs: meta.access_token_ttl_secs,
        refresh_token_ttl_secs: meta.refresh_token_ttl_secs,
    }))
}

fn validate_register(payload: &RegisterRequest) -> AuthResult<(String, Role)> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Validation("a valid email is required".into()));
    }
    validate_password(&payload.password)?;
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AuthError::Validation(
            "first name and last name are required".into(),
        ));
    }
    let role = Role::parse(payload.role.trim()).ok_or_else(|| {
        AuthError::Validation(
            "role must be one of admin, instructor, parent, school_admin".into(),
        )
    })?;
    Ok((email, role))
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn stored_role(role: &str, user_id: i64) -> AuthResult<Role> {
    Role::parse(role).ok_or_else(|| AuthError::Other(format!("unknown stored role for user {user_id}")))
}

fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    let status = err.status();
    if status.code >= 500 {
        log::error!("auth request failed: {}", err);
    }
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            message: err.public_message(),
        }),
    )
}

fn invalid_credentials() -> status::Custom<Json<AuthErrorResponse>> {
    respond_error(AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_payload() -> RegisterRequest {
        RegisterRequest {
            email: "  Ann.Lee@X.com ".into(),
            password: "secret123".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            role: "parent".into(),
            phone: None,
        }
    }

    #[test]
    fn register_validation_canonicalizes_email() {
        let (email, role) = validate_register(&register_payload()).expect("valid");
        assert_eq!(email, "ann.lee@x.com");
        assert_eq!(role, Role::Parent);
    }

    #[test]
    fn register_validation_rejects_short_password() {
        let mut payload = register_payload();
        payload.password = "12345".into();
        let err = validate_register(&payload).expect_err("must fail");
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn register_validation_rejects_unknown_role() {
        let mut payload = register_payload();
        payload.role = "superuser".into();
        let err = validate_register(&payload).expect_err("must fail");
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn register_validation_rejects_missing_names() {
        let mut payload = register_payload();
        payload.first_name = "   ".into();
        let err = validate_register(&payload).expect_err("must fail");
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn register_validation_rejects_bad_email() {
        let mut payload = register_payload();
        payload.email = "not-an-email".into();
        let err = validate_register(&payload).expect_err("must fail");
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
