//! Test environment helpers

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use taskstore_infrastructure::database::migrations::SCHEMA_STATEMENTS;

/// In-memory SQLite pool with the schema applied.
///
/// A single connection is used on purpose: every connection to
/// `sqlite::memory:` opens its own database, and serializing the pool
/// keeps all test queries on the same one.
pub async fn sqlite_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite must open");

    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("schema statement must apply");
    }

    pool
}
