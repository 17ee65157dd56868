//! SQLite pool creation and schema bootstrap.

use super::DbError;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

/// Connection pool type used throughout the persistence layer.
pub type DbPool = sqlx::SqlitePool;

/// Creates a connection pool for the given SQLite URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, DbError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Creates a migrated in-memory database for tests and ephemeral runs.
///
/// Single connection: every new SQLite `:memory:` connection opens its
/// own empty database, so a wider pool would lose the schema.
pub async fn create_memory_pool() -> Result<DbPool, DbError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Creates the schema if it does not exist yet.
///
/// Idempotent; safe to run on every startup.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            owner_id   INTEGER PRIMARY KEY,
            lang       TEXT NOT NULL DEFAULT 'en',
            is_admin   INTEGER NOT NULL DEFAULT 0,
            is_banned  INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            first_seen TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_keys (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id  INTEGER NOT NULL,
            api_key   TEXT NOT NULL,
            name      TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS active_tasks (
            task_id    TEXT PRIMARY KEY,
            owner_id   INTEGER NOT NULL,
            is_active  INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_active_tasks_owner ON active_tasks (owner_id)")
        .execute(pool)
        .await?;

    info!("database schema ready");
    Ok(())
}
