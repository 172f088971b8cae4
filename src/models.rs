use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::FromRow;

use crate::auth::responses::Role;

/// Identity row. Holds the password hash, so this struct is never
/// serialized to a client; wire payloads use the DTOs in
/// `auth::responses`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Typed view of the stored role string. The column carries a CHECK
    /// constraint, so a parse failure means the schema and the enum have
    /// drifted.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ParentProfile {
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstructorProfile {
    pub user_id: i64,
    pub hire_date: Option<NaiveDate>,
    pub employment_type: String,
    pub created_at: DateTime<Utc>,
}
