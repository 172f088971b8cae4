//! HTTP route handlers outside the auth module.
//!
//! The auth session-lifecycle handlers live in `crate::auth::routes`;
//! everything here is operational surface.

pub mod catchers;
pub mod health;
