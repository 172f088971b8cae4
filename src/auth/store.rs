use std::ops::DerefMut;

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool, Postgres, Transaction};

use crate::auth::responses::{ProfileKind, Role, RoleDetails};
use crate::auth::{AuthError, AuthResult};
use crate::models::{InstructorProfile, ParentProfile, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, \
     active, last_login_at, created_at, updated_at";

/// New identity to persist. The email must already be in canonical
/// (trimmed, lowercased) form and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Persistence boundary for user identity and role-profile rows.
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Row-locked fetch. Concurrent logins and password changes for the
    /// same account serialize on this lock until the transaction ends.
    pub async fn find_by_email_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
    ) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1 FOR UPDATE"
        ))
        .bind(email)
        .fetch_optional(tx.deref_mut())
        .await?;
        Ok(user)
    }

    pub async fn find_by_id_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(tx.deref_mut())
        .await?;
        Ok(user)
    }

    /// Insert the identity row and, when the role requires one, its
    /// profile row. Both land in the caller's transaction: a profile
    /// failure rolls back the identity insert, so no orphan user without
    /// a required profile is ever visible. The unique index on
    /// `lower(email)` is the authoritative duplicate check — the losing
    /// side of a concurrent register surfaces as `Conflict` here.
    pub async fn create_user_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_user: &NewUser,
    ) -> AuthResult<i64> {
        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .bind(new_user.role.as_str())
        .fetch_one(tx.deref_mut())
        .await
        .map_err(conflict_on_unique_violation)?;

        if let Some(kind) = new_user.role.profile_kind() {
            self.insert_role_profile_tx(tx, kind, user_id).await?;
        }

        Ok(user_id)
    }

    async fn insert_role_profile_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ProfileKind,
        user_id: i64,
    ) -> AuthResult<()> {
        let sql = match kind {
            ProfileKind::Parent => "INSERT INTO parent_profiles (user_id) VALUES ($1)",
            ProfileKind::Instructor => "INSERT INTO instructor_profiles (user_id) VALUES ($1)",
        };
        sqlx::query(sql)
            .bind(user_id)
            .execute(tx.deref_mut())
            .await?;
        Ok(())
    }

    pub async fn update_password_hash_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        new_hash: &str,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(new_hash)
            .bind(user_id)
            .execute(tx.deref_mut())
            .await?;
        Ok(())
    }

    pub async fn update_last_login_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
            .bind(now)
            .bind(user_id)
            .execute(tx.deref_mut())
            .await?;
        Ok(())
    }

    /// Load the role-specific profile for a user, if the role has one.
    pub async fn role_details(&self, user: &User) -> AuthResult<Option<RoleDetails>> {
        let role = user
            .role()
            .ok_or_else(|| AuthError::Other(format!("unknown stored role for user {}", user.id)))?;

        let details = match role.profile_kind() {
            Some(ProfileKind::Parent) => {
                let profile = sqlx::query_as::<_, ParentProfile>(
                    "SELECT user_id, created_at FROM parent_profiles WHERE user_id = $1",
                )
                .bind(user.id)
                .fetch_optional(&self.pool)
                .await?;
                profile.map(|p| RoleDetails::Parent {
                    enrolled_at: p.created_at,
                })
            }
            Some(ProfileKind::Instructor) => {
                let profile = sqlx::query_as::<_, InstructorProfile>(
                    "SELECT user_id, hire_date, employment_type, created_at \
                     FROM instructor_profiles WHERE user_id = $1",
                )
                .bind(user.id)
                .fetch_optional(&self.pool)
                .await?;
                profile.map(|p| RoleDetails::Instructor {
                    hire_date: p.hire_date,
                    employment_type: p.employment_type,
                })
            }
            None => None,
        };

        Ok(details)
    }
}

fn conflict_on_unique_violation(err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AuthError::Conflict,
        _ => AuthError::from(err),
    }
}
