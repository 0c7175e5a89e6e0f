//! # Product Repository
//!
//! Product lookups and the stock ledger guard.
//!
//! ## Stock Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Conditional Stock Decrement                             │
//! │                                                                         │
//! │  reserve(product, 3)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products                                                        │
//! │     SET stock = stock - 3                                              │
//! │   WHERE id = ?1 AND stock >= 3          ← check and decrement are ONE  │
//! │       │                                    statement, so two shoppers  │
//! │       │                                    cannot both pass the check  │
//! │       ├── rows_affected = 1 → reserved                                 │
//! │       └── rows_affected = 0 → re-read the row to find out why:        │
//! │               missing row      → ProductNotFound                       │
//! │               inactive product → ProductUnavailable                    │
//! │               low stock        → InsufficientStock { available, ... } │
//! │                                                                         │
//! │  release() is the compensating increment for cancellations.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any read of `stock` is stale by the time of a later write; callers must
//! never check-then-decrement in two statements.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tinta_core::{CoreError, Product};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.require("uuid-here").await?;
/// repo.reserve(&product.id, 2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, description, price_cents, stock, images, is_active, \
             created_at, updated_at \
             FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_product(&r)).transpose()
    }

    /// Gets a product by ID, failing with `ProductNotFound` when missing.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Gets a product that must be active, failing with
    /// `ProductUnavailable` for soft-deleted rows.
    pub async fn require_active(&self, id: &str) -> DbResult<Product> {
        let product = self.require(id).await?;
        if !product.is_active {
            return Err(CoreError::ProductUnavailable {
                name: product.name,
            }
            .into());
        }
        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price_cents, stock, images, is_active, \
             created_at, updated_at \
             FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_product).collect()
    }

    /// Atomically reserves `quantity` units of stock.
    ///
    /// The check and the decrement are a single conditional UPDATE, so
    /// concurrent reservations for the last units cannot both succeed.
    ///
    /// ## Errors
    /// * `ProductNotFound` - No such product
    /// * `ProductUnavailable` - Product is soft-deleted
    /// * `InsufficientStock` - Fewer than `quantity` units on hand
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::reserve_on(&mut *conn, product_id, quantity).await
    }

    /// Transaction-scoped variant of [`reserve`](Self::reserve), for
    /// callers that must roll the decrement back with other writes.
    pub async fn reserve_on(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products \
             SET stock = stock - ?2, updated_at = ?3 \
             WHERE id = ?1 AND is_active = 1 AND stock >= ?2",
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            debug!(product_id, quantity, "Stock reserved");
            return Ok(());
        }

        // The guard refused. Re-read to report the precise reason; the
        // re-read is diagnostic only and never drives a write.
        let row = sqlx::query("SELECT name, stock, is_active FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
            Some(row) => {
                let name: String = row.try_get("name")?;
                let is_active: bool = row.try_get("is_active")?;
                if !is_active {
                    Err(CoreError::ProductUnavailable { name }.into())
                } else {
                    let available: i64 = row.try_get("stock")?;
                    Err(CoreError::InsufficientStock {
                        product_name: name,
                        available,
                        requested: quantity,
                    }
                    .into())
                }
            }
        }
    }

    /// Returns `quantity` units to stock (compensating increment for a
    /// cancelled order).
    pub async fn release(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::release_on(&mut *conn, product_id, quantity).await
    }

    /// Transaction-scoped variant of [`release`](Self::release).
    ///
    /// A missing product is not an error here: releasing stock for a
    /// since-deleted product is a no-op, not a failed cancellation.
    pub async fn release_on(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        debug!(
            product_id,
            quantity,
            restored = result.rows_affected() == 1,
            "Stock released"
        );
        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a product (used by seeding and tests).
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO products \
             (id, name, description, price_cents, stock, images, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(serde_json::to_string(&product.images)?)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a product's mutable catalog fields.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            "UPDATE products \
             SET name = ?2, description = ?3, price_cents = ?4, stock = ?5, \
                 images = ?6, is_active = ?7, updated_at = ?8 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(serde_json::to_string(&product.images)?)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Maps a products row, decoding the JSON images column.
fn map_product(row: &SqliteRow) -> DbResult<Product> {
    let images: String = row.try_get("images")?;
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price_cents: row.try_get("price_cents")?,
        stock: row.try_get("stock")?,
        images: serde_json::from_str(&images)?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    pub(crate) fn sample_product(name: &str, price_cents: i64, stock: i64) -> Product {
        Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: Some(format!("{name} for professional studios")),
            price_cents,
            stock,
            images: vec![format!("https://img.example.com/{name}.jpg")],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn db_with(products: &[Product]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for p in products {
            db.products().insert(p).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let product = sample_product("Rotary Machine", 25_000, 4);
        let db = db_with(std::slice::from_ref(&product)).await;

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Rotary Machine");
        assert_eq!(found.price_cents, 25_000);
        assert_eq!(found.stock, 4);
        assert_eq!(found.images.len(), 1);
    }

    #[tokio::test]
    async fn test_require_missing_product() {
        let db = db_with(&[]).await;

        let err = db.products().require("nope").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let product = sample_product("Ink Set", 4500, 10);
        let db = db_with(std::slice::from_ref(&product)).await;

        db.products().reserve(&product.id, 3).await.unwrap();

        let after = db.products().require(&product.id).await.unwrap();
        assert_eq!(after.stock, 7);
    }

    #[tokio::test]
    async fn test_reserve_refuses_when_stock_is_short() {
        let product = sample_product("Needles 5RL", 1500, 2);
        let db = db_with(std::slice::from_ref(&product)).await;

        let err = db.products().reserve(&product.id, 5).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Failed reservation leaves the ledger untouched
        let after = db.products().require(&product.id).await.unwrap();
        assert_eq!(after.stock, 2);
    }

    #[tokio::test]
    async fn test_reserve_exact_remaining_stock_succeeds() {
        let product = sample_product("Grip Tape", 800, 3);
        let db = db_with(std::slice::from_ref(&product)).await;

        db.products().reserve(&product.id, 3).await.unwrap();
        let after = db.products().require(&product.id).await.unwrap();
        assert_eq!(after.stock, 0);

        // And one more unit is refused
        let err = db.products().reserve(&product.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_reserve_inactive_product() {
        let mut product = sample_product("Discontinued Cream", 1200, 50);
        product.is_active = false;
        let db = db_with(std::slice::from_ref(&product)).await;

        let err = db.products().reserve(&product.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_restores_stock() {
        let product = sample_product("Stencil Paper", 2000, 5);
        let db = db_with(std::slice::from_ref(&product)).await;

        db.products().reserve(&product.id, 4).await.unwrap();
        db.products().release(&product.id, 4).await.unwrap();

        let after = db.products().require(&product.id).await.unwrap();
        assert_eq!(after.stock, 5);
    }

    #[tokio::test]
    async fn test_release_missing_product_is_noop() {
        let db = db_with(&[]).await;
        db.products().release("gone", 2).await.unwrap();
    }
}
