//! # Business Number Allocation
//!
//! Generates sequential, human-readable document numbers for orders and
//! invoices: `ORD-2026-000123`, `INV-2026-000042`.
//!
//! ## Allocation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Number Allocation                                    │
//! │                                                                         │
//! │  Caller opens an immediate write transaction, then:                    │
//! │                                                                         │
//! │  next_number(&mut *conn, "INV")                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT highest number with prefix "INV-2026-"                         │
//! │       │                                                                 │
//! │       ├── None found        → sequence starts at 1                     │
//! │       └── "INV-2026-000041" → next is 42                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Format "INV-2026-000042" and INSERT in the same transaction           │
//! │                                                                         │
//! │  Two transactions can still read the same maximum. The UNIQUE          │
//! │  constraint on the number column makes the loser's INSERT fail,        │
//! │  and the caller retries the whole transaction.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numbering restarts at 1 each calendar year because the year is part
//! of the searched prefix.

use chrono::{Datelike, Utc};
use sqlx::{Row, SqliteConnection};

use tinta_core::NUMBER_PAD_WIDTH;

use crate::error::DbResult;

/// How many times a caller should retry an insert that lost the
/// allocation race before giving up.
pub const MAX_NUMBER_ATTEMPTS: u32 = 5;

/// Allocates the next document number for `prefix` ("ORD" or "INV") and
/// the current year.
///
/// Must be called on the same connection/transaction that performs the
/// insert, so the read and the write race at most with *other*
/// transactions, never with the caller's own pending rows.
pub async fn next_number(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    prefix: &str,
) -> DbResult<String> {
    next_number_for_year(conn, table, column, prefix, Utc::now().year()).await
}

/// Year-explicit variant, used directly by tests.
pub async fn next_number_for_year(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    prefix: &str,
    year: i32,
) -> DbResult<String> {
    let year_prefix = format!("{prefix}-{year}-");

    // table/column come from compile-time constants in the repositories,
    // never from user input.
    let sql = format!(
        "SELECT {column} FROM {table} WHERE {column} LIKE ?1 ORDER BY {column} DESC LIMIT 1"
    );

    let last: Option<String> = sqlx::query(&sql)
        .bind(format!("{year_prefix}%"))
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| row.try_get(0))
        .transpose()?;

    let next_seq = match last {
        Some(number) => parse_sequence(&number) + 1,
        None => 1,
    };

    Ok(format_number(prefix, year, next_seq))
}

/// Extracts the numeric suffix from a document number.
/// Malformed numbers count as 0, so the sequence recovers instead of
/// failing.
fn parse_sequence(number: &str) -> u64 {
    number
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Formats `PREFIX-YYYY-NNNNNN` with a zero-padded sequence.
pub fn format_number(prefix: &str, year: i32, sequence: u64) -> String {
    format!("{prefix}-{year}-{sequence:0width$}", width = NUMBER_PAD_WIDTH)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[test]
    fn test_format_number_pads_to_six_digits() {
        assert_eq!(format_number("ORD", 2026, 1), "ORD-2026-000001");
        assert_eq!(format_number("INV", 2026, 42), "INV-2026-000042");
        assert_eq!(format_number("INV", 2026, 1_234_567), "INV-2026-1234567");
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("INV-2026-000041"), 41);
        assert_eq!(parse_sequence("ORD-2026-000001"), 1);
        assert_eq!(parse_sequence("garbage"), 0);
        assert_eq!(parse_sequence("INV-2026-"), 0);
    }

    #[tokio::test]
    async fn test_next_number_starts_at_one() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let number = next_number_for_year(&mut *conn, "invoices", "invoice_number", "INV", 2026)
            .await
            .unwrap();
        assert_eq!(number, "INV-2026-000001");
    }

    #[tokio::test]
    async fn test_next_number_increments_from_highest() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        for seq in [1u64, 5, 12] {
            sqlx::query(
                "INSERT INTO orders (id, order_number, subtotal_cents, tax_cents, \
                 shipping_cents, discount_cents, total_cents, status, created_at, updated_at) \
                 VALUES (?1, ?2, 0, 0, 0, 0, 0, 'pendiente', datetime('now'), datetime('now'))",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(format_number("ORD", 2026, seq))
            .execute(db.pool())
            .await
            .unwrap();
        }

        let mut conn = db.pool().acquire().await.unwrap();
        let number = next_number_for_year(&mut *conn, "orders", "order_number", "ORD", 2026)
            .await
            .unwrap();
        assert_eq!(number, "ORD-2026-000013");
    }

    #[tokio::test]
    async fn test_sequences_are_independent_per_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query(
            "INSERT INTO orders (id, order_number, subtotal_cents, tax_cents, \
             shipping_cents, discount_cents, total_cents, status, created_at, updated_at) \
             VALUES (?1, ?2, 0, 0, 0, 0, 0, 'pendiente', datetime('now'), datetime('now'))",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(format_number("ORD", 2025, 900))
        .execute(db.pool())
        .await
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let number = next_number_for_year(&mut *conn, "orders", "order_number", "ORD", 2026)
            .await
            .unwrap();
        assert_eq!(number, "ORD-2026-000001");
    }
}
