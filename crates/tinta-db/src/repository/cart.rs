//! # Cart Repository
//!
//! Active-cart lifecycle: lazy creation, line-item mutation, checkout
//! preparation, and deactivation.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Lifecycle                                    │
//! │                                                                         │
//! │  get_active(user)  ──► no active cart? create empty one lazily         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  add_item / update_item / remove_item / clear                          │
//! │       │         (each recomputes and persists total_cents)             │
//! │       ▼                                                                 │
//! │  prepare_for_checkout                                                   │
//! │       │   re-resolve every product, re-validate stock,                  │
//! │       │   refresh drifted prices, reconcile the total                   │
//! │       ▼                                                                 │
//! │  deactivate  ──► cart kept as history, never deleted                   │
//! │                                                                         │
//! │  One active cart per user, enforced by a partial unique index.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `total_cents` is a cache: it is recomputed from line items before every
//! read and after every mutation, never trusted between calls.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::product::ProductRepository;
use tinta_core::{validate_quantity, Cart, CartItem, CoreError, Product};

/// Aggregate view of the active cart (line count, quantity, total).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartSummary {
    pub cart_id: String,
    /// Distinct line items.
    pub item_count: i64,
    /// Units across all lines.
    pub total_quantity: i64,
    pub total_cents: i64,
}

/// Repository for cart database operations.
///
/// ## Usage
/// ```rust,ignore
/// let cart = db.carts().add_item(user_id, product_id, 2).await?;
/// let cart = db.carts().prepare_for_checkout(user_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the user's active cart, creating an empty one lazily.
    ///
    /// The one-active-cart-per-user index arbitrates concurrent first
    /// calls: the loser's insert collides and falls back to the winner's
    /// cart. The total is recomputed from line items and persisted before
    /// the cart is handed back, so callers always see a consistent
    /// figure.
    pub async fn get_active(&self, user_id: &str) -> DbResult<Cart> {
        if let Some(cart) = self.find_active(user_id).await? {
            return self.reconcile_total(cart).await;
        }

        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            items: Vec::new(),
            total_cents: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };

        match self.try_insert_active(&cart).await {
            Ok(()) => {
                info!(user_id, cart_id = %cart.id, "Created new active cart");
                Ok(cart)
            }
            Err(e) if e.is_unique_violation_on("user_id") => {
                debug!(user_id, "Lost active-cart creation race, reusing winner");
                match self.find_active(user_id).await? {
                    Some(cart) => self.reconcile_total(cart).await,
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn try_insert_active(&self, cart: &Cart) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, total_cents, active, created_at, updated_at) \
             VALUES (?1, ?2, 0, 1, ?3, ?4)",
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All carts for a user, newest first, items included.
    pub async fn history(&self, user_id: &str) -> DbResult<Vec<Cart>> {
        let rows = sqlx::query(
            "SELECT id, user_id, total_cents, active, created_at, updated_at \
             FROM carts WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut carts = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cart = map_cart(row)?;
            cart.items = self.load_items(&cart.id).await?;
            carts.push(cart);
        }
        Ok(carts)
    }

    /// Aggregate view of the active cart.
    pub async fn summary(&self, user_id: &str) -> DbResult<CartSummary> {
        let cart = self.get_active(user_id).await?;
        Ok(CartSummary {
            item_count: cart.items.len() as i64,
            total_quantity: cart.total_quantity(),
            total_cents: cart.total_cents,
            cart_id: cart.id,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `quantity` units of a product to the active cart.
    ///
    /// When the product is already a line item the quantities merge, and
    /// the *combined* quantity is validated against current stock. A
    /// failed merge leaves the existing line untouched.
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<Cart> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let product = self.products().require_active(product_id).await?;
        let cart = self.get_active(user_id).await?;

        match cart.items.iter().find(|i| i.product_id == product_id) {
            Some(existing) => {
                let combined = existing.quantity + quantity;
                ensure_stock(&product, combined)?;

                let subtotal = product.price().multiply_quantity(combined).cents();
                sqlx::query(
                    "UPDATE cart_items \
                     SET quantity = ?2, unit_price_cents = ?3, subtotal_cents = ?4, updated_at = ?5 \
                     WHERE id = ?1",
                )
                .bind(&existing.id)
                .bind(combined)
                .bind(product.price_cents)
                .bind(subtotal)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

                debug!(cart_id = %cart.id, product_id, combined, "Merged cart line");
            }
            None => {
                ensure_stock(&product, quantity)?;

                let now = Utc::now();
                sqlx::query(
                    "INSERT INTO cart_items \
                     (id, cart_id, product_id, product_name, unit_price_cents, quantity, \
                      subtotal_cents, product_image, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&cart.id)
                .bind(&product.id)
                .bind(&product.name)
                .bind(product.price_cents)
                .bind(quantity)
                .bind(product.price().multiply_quantity(quantity).cents())
                .bind(product.first_image())
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

                debug!(cart_id = %cart.id, product_id, quantity, "Added cart line");
            }
        }

        self.reconcile_total(cart).await
    }

    /// Sets a line item's absolute quantity.
    ///
    /// ## Errors
    /// * `CartItemNotFound` - No such line item
    /// * `Forbidden` - The item's cart belongs to another user
    /// * `InsufficientStock` - New quantity exceeds current stock
    pub async fn update_item(
        &self,
        user_id: &str,
        cart_item_id: &str,
        quantity: i64,
    ) -> DbResult<Cart> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let (item, cart) = self.owned_item(user_id, cart_item_id).await?;

        let product = self.products().require_active(&item.product_id).await?;
        ensure_stock(&product, quantity)?;

        sqlx::query(
            "UPDATE cart_items SET quantity = ?2, subtotal_cents = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(&item.id)
        .bind(quantity)
        .bind(item.unit_price().multiply_quantity(quantity).cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.reconcile_total(cart).await
    }

    /// Removes a line item (ownership-checked).
    pub async fn remove_item(&self, user_id: &str, cart_item_id: &str) -> DbResult<Cart> {
        let (item, cart) = self.owned_item(user_id, cart_item_id).await?;

        sqlx::query("DELETE FROM cart_items WHERE id = ?1")
            .bind(&item.id)
            .execute(&self.pool)
            .await?;

        self.reconcile_total(cart).await
    }

    /// Removes all line items. The cart stays active.
    pub async fn clear(&self, user_id: &str) -> DbResult<Cart> {
        let cart = self.get_active(user_id).await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(&cart.id)
            .execute(&self.pool)
            .await?;

        self.reconcile_total(cart).await
    }

    /// Marks the active cart inactive. Idempotent: no active cart is a
    /// no-op, not an error. The cart row is kept as history.
    pub async fn deactivate(&self, user_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE carts SET active = 0, updated_at = ?2 WHERE user_id = ?1 AND active = 1",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            user_id,
            deactivated = result.rows_affected() == 1,
            "Cart deactivated"
        );
        Ok(())
    }

    /// Reconciles the cart against the live catalog ahead of checkout.
    ///
    /// Per line item: the product is re-resolved (`ProductUnavailable`
    /// naming the snapshot when it vanished or was deactivated), stock is
    /// re-validated at the full line quantity, and a drifted unit price is
    /// refreshed along with the subtotal. Returns the reconciled cart.
    ///
    /// This validates but does not reserve: the decrement happens inside
    /// the order-creation transaction.
    pub async fn prepare_for_checkout(&self, user_id: &str) -> DbResult<Cart> {
        let cart = self.get_active(user_id).await?;
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        for item in &cart.items {
            let product = match self.products().get_by_id(&item.product_id).await? {
                Some(p) if p.is_active => p,
                _ => {
                    return Err(CoreError::ProductUnavailable {
                        name: item.product_name.clone(),
                    }
                    .into())
                }
            };

            ensure_stock(&product, item.quantity)?;

            if product.price_cents != item.unit_price_cents {
                debug!(
                    cart_item_id = %item.id,
                    old_price = item.unit_price_cents,
                    new_price = product.price_cents,
                    "Refreshing drifted unit price"
                );
                sqlx::query(
                    "UPDATE cart_items \
                     SET unit_price_cents = ?2, subtotal_cents = ?3, updated_at = ?4 \
                     WHERE id = ?1",
                )
                .bind(&item.id)
                .bind(product.price_cents)
                .bind(product.price().multiply_quantity(item.quantity).cents())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
            }
        }

        self.reconcile_total(cart).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn find_active(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, user_id, total_cents, active, created_at, updated_at \
             FROM carts WHERE user_id = ?1 AND active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_cart(&r)).transpose()
    }

    async fn load_items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, product_name, unit_price_cents, quantity, \
             subtotal_cents, product_image, created_at, updated_at \
             FROM cart_items WHERE cart_id = ?1 ORDER BY created_at",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_cart_item).collect()
    }

    /// Reloads items, recomputes the total, persists it when drifted, and
    /// returns the refreshed cart.
    async fn reconcile_total(&self, mut cart: Cart) -> DbResult<Cart> {
        cart.items = self.load_items(&cart.id).await?;
        let total = cart.calculate_total().cents();

        if total != cart.total_cents {
            sqlx::query("UPDATE carts SET total_cents = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&cart.id)
                .bind(total)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
            cart.total_cents = total;
        }

        Ok(cart)
    }

    /// Resolves a line item and enforces that its cart belongs to
    /// `user_id`.
    async fn owned_item(&self, user_id: &str, cart_item_id: &str) -> DbResult<(CartItem, Cart)> {
        let row = sqlx::query(
            "SELECT ci.id, ci.cart_id, ci.product_id, ci.product_name, ci.unit_price_cents, \
             ci.quantity, ci.subtotal_cents, ci.product_image, ci.created_at, ci.updated_at, \
             c.user_id AS owner_id, c.total_cents AS cart_total_cents, c.active AS cart_active, \
             c.created_at AS cart_created_at, c.updated_at AS cart_updated_at \
             FROM cart_items ci JOIN carts c ON c.id = ci.cart_id \
             WHERE ci.id = ?1",
        )
        .bind(cart_item_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Err(CoreError::CartItemNotFound(cart_item_id.to_string()).into()),
        };

        let item = map_cart_item(&row)?;
        let owner_id: String = row.try_get("owner_id")?;
        if owner_id != user_id {
            return Err(CoreError::Forbidden {
                user_id: user_id.to_string(),
                cart_id: item.cart_id,
            }
            .into());
        }

        let cart = Cart {
            id: item.cart_id.clone(),
            user_id: owner_id,
            items: Vec::new(),
            total_cents: row.try_get("cart_total_cents")?,
            active: row.try_get("cart_active")?,
            created_at: row.try_get::<DateTime<Utc>, _>("cart_created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("cart_updated_at")?,
        };

        Ok((item, cart))
    }
}

fn ensure_stock(product: &Product, quantity: i64) -> Result<(), CoreError> {
    if product.has_stock(quantity) {
        Ok(())
    } else {
        Err(CoreError::InsufficientStock {
            product_name: product.name.clone(),
            available: product.stock,
            requested: quantity,
        })
    }
}

fn map_cart(row: &SqliteRow) -> DbResult<Cart> {
    Ok(Cart {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        items: Vec::new(),
        total_cents: row.try_get("total_cents")?,
        active: row.try_get("active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_cart_item(row: &SqliteRow) -> DbResult<CartItem> {
    Ok(CartItem {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        quantity: row.try_get("quantity")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        product_image: row.try_get("product_image")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
