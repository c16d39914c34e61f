//! Pool creation, compile-time selected by feature flag.
//!
//! Mirrors the teacher's `casparian_db::pool` pattern: concrete pool types
//! per backend (not `sqlx::AnyPool`) so `#[derive(FromRow)]` and typed
//! binds work without an indirection layer. `sqlite` is the default and the
//! only backend exercised by this workspace's tests; `postgres` is kept
//! behind an equivalent code path for deployments with a real PBM-scale
//! store.

use crate::error::{DbError, Result};

#[cfg(feature = "sqlite")]
pub type DbPool = sqlx::SqlitePool;
#[cfg(feature = "sqlite")]
pub type DbTransaction<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbPool = sqlx::PgPool;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// Open a pool against `url` and apply backend-specific startup tuning.
pub async fn create_pool(url: &str, max_connections: u32) -> Result<DbPool> {
    #[cfg(feature = "sqlite")]
    {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(DbError::Sqlx)?;
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await.map_err(DbError::Sqlx)?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await.map_err(DbError::Sqlx)?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await.map_err(DbError::Sqlx)?;
        tracing::info!(%url, "connected to SQLite store");
        return Ok(pool);
    }

    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(DbError::Sqlx)?;
        tracing::info!(%url, "connected to PostgreSQL store");
        return Ok(pool);
    }

    #[allow(unreachable_code)]
    {
        let _ = (url, max_connections);
        Err(DbError::NotCompiled("enable the `sqlite` or `postgres` feature".to_string()))
    }
}
