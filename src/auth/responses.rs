use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of account roles. Assigned at registration and never mutated
/// by any flow in this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Instructor,
    Parent,
    SchoolAdmin,
}

/// Subordinate profile table attached to a role, if any. Adding a role means
/// adding a variant here and an arm in [`Role::profile_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Parent,
    Instructor,
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "admin" => Some(Role::Admin),
            "instructor" => Some(Role::Instructor),
            "parent" => Some(Role::Parent),
            "school_admin" => Some(Role::SchoolAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Parent => "parent",
            Role::SchoolAdmin => "school_admin",
        }
    }

    /// Role → profile-table lookup used by registration.
    pub fn profile_kind(&self) -> Option<ProfileKind> {
        match self {
            Role::Parent => Some(ProfileKind::Parent),
            Role::Instructor => Some(ProfileKind::Instructor),
            Role::Admin | Role::SchoolAdmin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub role_details: Option<RoleDetails>,
}

/// Subordinate profile attached to the authenticated account, shape varying
/// by role. Admin roles carry no profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", untagged)]
pub enum RoleDetails {
    Instructor {
        hire_date: Option<NaiveDate>,
        employment_type: String,
    },
    Parent {
        enrolled_at: DateTime<Utc>,
    },
}

/// Token signing parameters visible to administrators. Secrets are never
/// part of this payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfigResponse {
    pub algorithm: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("instructor"), Some(Role::Instructor));
        assert_eq!(Role::parse("parent"), Some(Role::Parent));
        assert_eq!(Role::parse("school_admin"), Some(Role::SchoolAdmin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Instructor, Role::Parent, Role::SchoolAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn serde_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&Role::SchoolAdmin).expect("serialize"),
            "\"school_admin\""
        );
        let role: Role = serde_json::from_str("\"parent\"").expect("deserialize");
        assert_eq!(role, Role::Parent);
    }

    #[test]
    fn only_parent_and_instructor_have_profiles() {
        assert_eq!(Role::Parent.profile_kind(), Some(ProfileKind::Parent));
        assert_eq!(Role::Instructor.profile_kind(), Some(ProfileKind::Instructor));
        assert_eq!(Role::Admin.profile_kind(), None);
        assert_eq!(Role::SchoolAdmin.profile_kind(), None);
    }
}
