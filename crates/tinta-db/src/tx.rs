//! # Write Transactions
//!
//! Helpers for explicit `BEGIN IMMEDIATE` transactions.
//!
//! SQLite upgrades a deferred transaction to a writer only at the first
//! write statement. Under WAL, a reader whose snapshot went stale in the
//! meantime gets `SQLITE_BUSY` on that upgrade and cannot wait it out.
//! The number-allocation transactions read the current maximum before
//! inserting, so they take the write lock up front: concurrent creators
//! queue on the busy handler instead of failing mid-transaction.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbResult;

/// Acquires a connection and opens an immediate write transaction on it.
///
/// The caller owns the transaction lifecycle: every path out must go
/// through [`commit`] or [`rollback`].
pub(crate) async fn begin_immediate(pool: &SqlitePool) -> DbResult<PoolConnection<Sqlite>> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commits the open transaction, rolling back if the commit itself fails
/// so the connection returns to the pool clean.
pub(crate) async fn commit(conn: &mut SqliteConnection) -> DbResult<()> {
    if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        return Err(e.into());
    }
    Ok(())
}

/// Rolls back the open transaction. Errors are swallowed: the caller is
/// already on an error path and the original failure matters more.
pub(crate) async fn rollback(conn: &mut SqliteConnection) {
    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
}
