use campus_api::test_support::{TestDatabase, TestDatabaseError};
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new().await {
        Ok(db) => db,
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping migration revert test: container runtime unavailable: {err}");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");

    let user_tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'users'",
    )
    .fetch_one(&pool)
    .await
    .expect("lookup succeeded");

    assert_eq!(user_tables, 0, "users should be dropped after revert");

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");

    let profile_tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' \
         AND table_name IN ('users', 'parent_profiles', 'instructor_profiles')",
    )
    .fetch_one(&pool)
    .await
    .expect("lookup succeeded");

    assert_eq!(profile_tables, 3, "all tables should exist after rerun");

    test_db.close().await.expect("failed to drop test database");
}
