use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("campus_db")]
pub struct CampusDb(sqlx::PgPool);
