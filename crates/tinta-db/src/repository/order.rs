//! # Order Repository
//!
//! Order creation, the gated checkout path, and the status state machine.
//!
//! ## Status Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Status Flow                                 │
//! │                                                                         │
//! │  PENDIENTE ──► CONFIRMADA ──► PROCESANDO ──► ENVIADA ──► ENTREGADA     │
//! │      │             │              │             │                       │
//! │      └─────────────┴──────────────┴─────────────┴──► CANCELADA          │
//! │                                              (restocks reserved orders) │
//! │                                                                         │
//! │  Transitions outside this chain are rejected with InvalidTransition.   │
//! │  Non-status edits are allowed only in PENDIENTE / CONFIRMADA.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Checkout Atomicity
//! `create_from_cart` runs number allocation, the order insert, every
//! stock reservation, and the cart deactivation inside one transaction. A
//! reservation failure for the last line rolls back everything, including
//! reservations already made for earlier lines.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::cart::CartRepository;
use crate::repository::product::ProductRepository;
use crate::sequence::{self, MAX_NUMBER_ATTEMPTS};
use crate::tx;
use tinta_core::{
    ensure_order_transition, validate_amount_cents, validate_quantity, Cart, CoreError, GuestInfo,
    Order, OrderItem, OrderStatus, PaymentInfo, PaymentMethod, ORDER_NUMBER_PREFIX,
};

// =============================================================================
// Inputs
// =============================================================================

/// A line item for direct order creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// Input for [`OrderRepository::create`]. Carries no subtotal or total:
/// both are derived from the items server-side.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NewOrder {
    pub user_id: Option<String>,
    pub guest_info: Option<GuestInfo>,
    pub items: Vec<NewOrderItem>,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_info: Option<PaymentInfo>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub notes: Option<String>,
}

/// Checkout details for [`OrderRepository::create_from_cart`]. The items
/// come from the cart, everything else from here.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CheckoutDetails {
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_info: Option<PaymentInfo>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for [`OrderRepository::update`]. `None` leaves a field
/// unchanged. Status is deliberately absent; use `change_status`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct OrderPatch {
    pub tax_cents: Option<i64>,
    pub shipping_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_info: Option<PaymentInfo>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Listing filter. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on the creation date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date.
    pub to: Option<NaiveDate>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order directly from caller-supplied line items.
    ///
    /// The subtotal is derived from the items and the total from
    /// `subtotal + tax + shipping − discount`; any totals the caller
    /// computed are ignored as untrusted. Stock is never touched on this
    /// path, neither at creation nor on a later cancellation.
    pub async fn create(&self, input: NewOrder) -> DbResult<Order> {
        if input.items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        for item in &input.items {
            validate_quantity(item.quantity).map_err(CoreError::from)?;
            validate_amount_cents("unit_price_cents", item.unit_price_cents)
                .map_err(CoreError::from)?;
        }
        validate_amount_cents("tax_cents", input.tax_cents).map_err(CoreError::from)?;
        validate_amount_cents("shipping_cents", input.shipping_cents).map_err(CoreError::from)?;
        validate_amount_cents("discount_cents", input.discount_cents).map_err(CoreError::from)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(&input, None).await {
                Ok(order) => {
                    info!(order_number = %order.order_number, "Order created");
                    return Ok(order);
                }
                Err(e) if e.is_unique_violation_on("order_number") => {
                    if attempt >= MAX_NUMBER_ATTEMPTS {
                        return Err(CoreError::NumberConflict {
                            prefix: ORDER_NUMBER_PREFIX.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    warn!(attempt, "Order number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Creates an order from the user's active cart — the gated path.
    ///
    /// The cart is reconciled first (`prepare_for_checkout`), then one
    /// transaction covers: number allocation, the order and item inserts,
    /// a conditional stock decrement per line, and the cart
    /// deactivation. Any failure aborts the whole transaction.
    pub async fn create_from_cart(
        &self,
        user_id: &str,
        checkout: CheckoutDetails,
    ) -> DbResult<Order> {
        let cart = CartRepository::new(self.pool.clone())
            .prepare_for_checkout(user_id)
            .await?;

        let input = NewOrder {
            user_id: Some(user_id.to_string()),
            guest_info: None,
            items: cart
                .items
                .iter()
                .map(|i| NewOrderItem {
                    product_id: i.product_id.clone(),
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit_price_cents: i.unit_price_cents,
                })
                .collect(),
            tax_cents: checkout.tax_cents,
            shipping_cents: checkout.shipping_cents,
            discount_cents: checkout.discount_cents,
            payment_method: checkout.payment_method,
            payment_info: checkout.payment_info,
            shipping_address: checkout.shipping_address,
            shipping_city: checkout.shipping_city,
            shipping_postal_code: checkout.shipping_postal_code,
            shipping_country: checkout.shipping_country,
            notes: checkout.notes,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(&input, Some(&cart)).await {
                Ok(order) => {
                    info!(
                        order_number = %order.order_number,
                        cart_id = %cart.id,
                        "Checkout completed"
                    );
                    return Ok(order);
                }
                Err(e) if e.is_unique_violation_on("order_number") => {
                    if attempt >= MAX_NUMBER_ATTEMPTS {
                        return Err(CoreError::NumberConflict {
                            prefix: ORDER_NUMBER_PREFIX.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    warn!(attempt, "Order number collision, retrying checkout");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One creation attempt inside one immediate write transaction. When
    /// `reserve_from` is set the attempt also decrements stock per line
    /// and deactivates that cart.
    async fn try_create(&self, input: &NewOrder, reserve_from: Option<&Cart>) -> DbResult<Order> {
        let mut conn = tx::begin_immediate(&self.pool).await?;
        match Self::insert_order(&mut *conn, input, reserve_from).await {
            Ok(order) => {
                tx::commit(&mut *conn).await?;
                Ok(order)
            }
            Err(e) => {
                tx::rollback(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn insert_order(
        conn: &mut SqliteConnection,
        input: &NewOrder,
        reserve_from: Option<&Cart>,
    ) -> DbResult<Order> {
        let order_number =
            sequence::next_number(&mut *conn, "orders", "order_number", ORDER_NUMBER_PREFIX)
                .await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            items.push(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                subtotal_cents: line.unit_price_cents * line.quantity,
                created_at: now,
            });
        }

        let mut order = Order {
            id: order_id,
            order_number,
            user_id: input.user_id.clone(),
            guest_info: input.guest_info.clone(),
            items,
            subtotal_cents: 0,
            tax_cents: input.tax_cents,
            shipping_cents: input.shipping_cents,
            discount_cents: input.discount_cents,
            total_cents: 0,
            status: OrderStatus::default(),
            stock_reserved: reserve_from.is_some(),
            payment_method: input.payment_method,
            payment_info: input.payment_info.clone(),
            shipping_address: input.shipping_address.clone(),
            shipping_city: input.shipping_city.clone(),
            shipping_postal_code: input.shipping_postal_code.clone(),
            shipping_country: input.shipping_country.clone(),
            tracking_number: None,
            carrier: None,
            shipped_at: None,
            estimated_delivery: None,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        order.update_totals();

        sqlx::query(
            "INSERT INTO orders \
             (id, order_number, user_id, guest_info, subtotal_cents, tax_cents, shipping_cents, \
              discount_cents, total_cents, status, stock_reserved, payment_method, payment_info, \
              shipping_address, shipping_city, shipping_postal_code, shipping_country, \
              notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                     ?18, ?19, ?20)",
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(
            order
                .guest_info
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(order.stock_reserved)
        .bind(order.payment_method)
        .bind(
            order
                .payment_info
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_postal_code)
        .bind(&order.shipping_country)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, product_id, product_name, quantity, unit_price_cents, \
                  subtotal_cents, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }

        if let Some(cart) = reserve_from {
            for item in &order.items {
                ProductRepository::reserve_on(&mut *conn, &item.product_id, item.quantity).await?;
            }

            sqlx::query("UPDATE carts SET active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(&cart.id)
                .bind(now)
                .execute(&mut *conn)
                .await?;
        }

        Ok(order)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query(&format!("{ORDER_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut order = map_order(&row)?;
                order.items = self.load_items(&order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Gets an order, failing with `OrderNotFound` when missing.
    pub async fn require(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(id.to_string()).into())
    }

    /// Lists orders matching the filter, newest first, items included.
    ///
    /// Unset filter fields bind as NULL and their predicate collapses to
    /// true, so one prepared statement covers every combination.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{ORDER_COLUMNS} \
             WHERE (?1 IS NULL OR user_id = ?1) \
               AND (?2 IS NULL OR status = ?2) \
               AND (?3 IS NULL OR date(created_at) >= date(?3)) \
               AND (?4 IS NULL OR date(created_at) <= date(?4)) \
             ORDER BY created_at DESC"
        );

        let rows = sqlx::query(&sql)
            .bind(filter.user_id.as_deref())
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = map_order(row)?;
            order.items = self.load_items(&order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    async fn load_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT id, order_id, product_id, product_name, quantity, unit_price_cents, \
             subtotal_cents, created_at \
             FROM order_items WHERE order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_order_item).collect()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Moves an order to a new status, consulting the transition table.
    ///
    /// Entering ENVIADA stamps `shipped_at`. Entering CANCELADA returns
    /// every line's quantity to stock in the same transaction, but only
    /// when checkout reserved it (`stock_reserved`); cancelling a
    /// directly created order never touched the ledger and leaves it
    /// alone. An optional note is appended to the order's notes.
    pub async fn change_status(
        &self,
        id: &str,
        new_status: OrderStatus,
        note: Option<&str>,
    ) -> DbResult<Order> {
        let order = self.require(id).await?;
        ensure_order_transition(order.status, new_status)?;

        let now = Utc::now();
        let notes = match (order.notes.as_deref(), note) {
            (Some(existing), Some(added)) => Some(format!("{existing}\n{added}")),
            (None, Some(added)) => Some(added.to_string()),
            (existing, None) => existing.map(str::to_string),
        };
        let shipped_at = if new_status == OrderStatus::Enviada {
            Some(now)
        } else {
            order.shipped_at
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE orders SET status = ?2, notes = ?3, shipped_at = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(new_status)
        .bind(&notes)
        .bind(shipped_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if new_status == OrderStatus::Cancelada && order.stock_reserved {
            for item in &order.items {
                ProductRepository::release_on(&mut *tx, &item.product_id, item.quantity).await?;
            }
            debug!(order_id = id, "Restocked cancelled order");
        }

        tx.commit().await?;

        info!(order_id = id, from = %order.status, to = %new_status, "Order status changed");
        self.require(id).await
    }

    /// Merges non-status fields into an order still in an editable state
    /// (PENDIENTE or CONFIRMADA), then recomputes totals from the stored
    /// items.
    pub async fn update(&self, id: &str, patch: OrderPatch) -> DbResult<Order> {
        let mut order = self.require(id).await?;
        if !order.status.is_editable() {
            return Err(CoreError::ImmutableRecord {
                entity: "order",
                id: id.to_string(),
                status: order.status.to_string(),
            }
            .into());
        }

        if let Some(v) = patch.tax_cents {
            validate_amount_cents("tax_cents", v).map_err(CoreError::from)?;
            order.tax_cents = v;
        }
        if let Some(v) = patch.shipping_cents {
            validate_amount_cents("shipping_cents", v).map_err(CoreError::from)?;
            order.shipping_cents = v;
        }
        if let Some(v) = patch.discount_cents {
            validate_amount_cents("discount_cents", v).map_err(CoreError::from)?;
            order.discount_cents = v;
        }
        if let Some(v) = patch.payment_method {
            order.payment_method = Some(v);
        }
        if let Some(v) = patch.payment_info {
            order.payment_info = Some(v);
        }
        if let Some(v) = patch.shipping_address {
            order.shipping_address = Some(v);
        }
        if let Some(v) = patch.shipping_city {
            order.shipping_city = Some(v);
        }
        if let Some(v) = patch.shipping_postal_code {
            order.shipping_postal_code = Some(v);
        }
        if let Some(v) = patch.shipping_country {
            order.shipping_country = Some(v);
        }
        if let Some(v) = patch.tracking_number {
            order.tracking_number = Some(v);
        }
        if let Some(v) = patch.carrier {
            order.carrier = Some(v);
        }
        if let Some(v) = patch.estimated_delivery {
            order.estimated_delivery = Some(v);
        }
        if let Some(v) = patch.notes {
            order.notes = Some(v);
        }

        // Totals always re-derive from the stored items
        order.update_totals();
        order.updated_at = Utc::now();

        sqlx::query(
            "UPDATE orders SET subtotal_cents = ?2, tax_cents = ?3, shipping_cents = ?4, \
             discount_cents = ?5, total_cents = ?6, payment_method = ?7, payment_info = ?8, \
             shipping_address = ?9, shipping_city = ?10, shipping_postal_code = ?11, \
             shipping_country = ?12, tracking_number = ?13, carrier = ?14, \
             estimated_delivery = ?15, notes = ?16, updated_at = ?17 \
             WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.payment_method)
        .bind(
            order
                .payment_info
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_postal_code)
        .bind(&order.shipping_country)
        .bind(&order.tracking_number)
        .bind(&order.carrier)
        .bind(order.estimated_delivery)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    /// Deletes an order and its items (ops tooling; no state gate).
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderNotFound(id.to_string()).into());
        }
        Ok(())
    }
}

// Shared SELECT column list so every read maps identically.
const ORDER_COLUMNS: &str = "SELECT id, order_number, user_id, guest_info, subtotal_cents, \
     tax_cents, shipping_cents, discount_cents, total_cents, status, stock_reserved, \
     payment_method, payment_info, shipping_address, shipping_city, shipping_postal_code, \
     shipping_country, tracking_number, carrier, shipped_at, estimated_delivery, notes, \
     created_at, updated_at \
     FROM orders";

fn map_order(row: &SqliteRow) -> DbResult<Order> {
    let guest_info: Option<String> = row.try_get("guest_info")?;
    let payment_info: Option<String> = row.try_get("payment_info")?;

    Ok(Order {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        user_id: row.try_get("user_id")?,
        guest_info: guest_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        items: Vec::new(),
        subtotal_cents: row.try_get("subtotal_cents")?,
        tax_cents: row.try_get("tax_cents")?,
        shipping_cents: row.try_get("shipping_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        total_cents: row.try_get("total_cents")?,
        status: row.try_get("status")?,
        stock_reserved: row.try_get("stock_reserved")?,
        payment_method: row.try_get("payment_method")?,
        payment_info: payment_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        shipping_address: row.try_get("shipping_address")?,
        shipping_city: row.try_get("shipping_city")?,
        shipping_postal_code: row.try_get("shipping_postal_code")?,
        shipping_country: row.try_get("shipping_country")?,
        tracking_number: row.try_get("tracking_number")?,
        carrier: row.try_get("carrier")?,
        shipped_at: row.try_get("shipped_at")?,
        estimated_delivery: row.try_get("estimated_delivery")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_order_item(row: &SqliteRow) -> DbResult<OrderItem> {
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::sample_product;
    use tinta_core::Product;

    async fn db_with(products: &[Product]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for p in products {
            db.products().insert(p).await.unwrap();
        }
        db
    }

    fn direct_order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            user_id: Some("user-1".to_string()),
            items,
            tax_cents: 500,
            shipping_cents: 1000,
            discount_cents: 300,
            ..NewOrder::default()
        }
    }

    fn line(product_id: &str, name: &str, quantity: i64, unit_price_cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: product_id.to_string(),
            product_name: name.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    #[tokio::test]
    async fn test_create_derives_totals_from_items() {
        let db = db_with(&[]).await;

        let order = db
            .orders()
            .create(direct_order(vec![
                line("p-1", "Ink Set", 2, 4500),
                line("p-2", "Needles", 1, 1500),
            ]))
            .await
            .unwrap();

        assert!(order.order_number.starts_with("ORD-"));
        assert!(order.order_number.ends_with("-000001"));
        assert_eq!(order.subtotal_cents, 10_500);
        assert_eq!(order.total_cents, 10_500 + 500 + 1000 - 300);
        assert_eq!(order.status, OrderStatus::Pendiente);
        assert_eq!(order.items.len(), 2);

        // Round-trips through the database unchanged
        let loaded = db.orders().require(&order.id).await.unwrap();
        assert_eq!(loaded.total_cents, order.total_cents);
        assert_eq!(loaded.items.len(), 2);
    }

    #[tokio::test]
    async fn test_guest_order_round_trips_snapshot() {
        let db = db_with(&[]).await;

        let mut input = direct_order(vec![line("p-1", "Ink Set", 1, 4500)]);
        input.user_id = None;
        input.guest_info = Some(GuestInfo {
            first_name: "Marta".to_string(),
            last_name: "Sanz".to_string(),
            email: "marta@example.com".to_string(),
            phone: "+34 611 222 333".to_string(),
        });

        let order = db.orders().create(input).await.unwrap();
        let loaded = db.orders().require(&order.id).await.unwrap();

        assert!(loaded.user_id.is_none());
        let guest = loaded.guest_info.expect("guest snapshot survives");
        assert_eq!(guest.first_name, "Marta");
        assert_eq!(guest.email, "marta@example.com");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_items() {
        let db = db_with(&[]).await;
        let err = db.orders().create(direct_order(vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let db = db_with(&[]).await;

        let first = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap();
        let second = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap();

        assert!(first.order_number.ends_with("000001"));
        assert!(second.order_number.ends_with("000002"));
    }

    #[tokio::test]
    async fn test_concurrent_creation_mints_distinct_numbers() {
        // On-disk pool with real parallel connections, so allocators
        // genuinely contend for the write lock instead of queueing on a
        // single pooled connection.
        let (db, path) = crate::pool::tests::temp_db(8).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let orders = db.orders();
            handles.push(tokio::spawn(async move {
                orders
                    .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
                    .await
            }));
        }

        let mut numbers = std::collections::HashSet::new();
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            assert!(numbers.insert(order.order_number), "duplicate number minted");
        }
        assert_eq!(numbers.len(), 16);

        crate::pool::tests::remove_temp_db(&db, &path).await;
    }

    #[tokio::test]
    async fn test_number_conflict_surfaces_after_exhausted_retries() {
        use chrono::Datelike;

        let db = db_with(&[]).await;
        let year = Utc::now().year();

        // A legacy row with a narrower pad sorts above the real maximum,
        // so every allocation attempt re-derives the same taken number
        // and the retry loop must give up with a conflict.
        for number in [
            format!("ORD-{year}-00001"),
            format!("ORD-{year}-000002"),
        ] {
            sqlx::query(
                "INSERT INTO orders (id, order_number, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&number)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        }

        let err = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NumberConflict {
                attempts: MAX_NUMBER_ATTEMPTS,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_checkout_reserves_stock_and_deactivates_cart() {
        let machine = sample_product("Rotary Machine", 25_000, 5);
        let ink = sample_product("Ink Set", 4500, 10);
        let db = db_with(&[machine.clone(), ink.clone()]).await;

        db.carts().add_item("user-1", &machine.id, 1).await.unwrap();
        db.carts().add_item("user-1", &ink.id, 3).await.unwrap();

        let order = db
            .orders()
            .create_from_cart(
                "user-1",
                CheckoutDetails {
                    shipping_cents: 1500,
                    ..CheckoutDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(order.subtotal_cents, 25_000 + 4500 * 3);
        assert_eq!(order.total_cents, order.subtotal_cents + 1500);
        assert_eq!(order.user_id.as_deref(), Some("user-1"));
        assert!(order.stock_reserved);

        // Stock decremented
        assert_eq!(db.products().require(&machine.id).await.unwrap().stock, 4);
        assert_eq!(db.products().require(&ink.id).await.unwrap().stock, 7);

        // Cart deactivated; a fresh one appears on next access
        let fresh = db.carts().get_active("user-1").await.unwrap();
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reservation_aborts_whole_checkout() {
        let machine = sample_product("Rotary Machine", 25_000, 5);
        let ink = sample_product("Ink Set", 4500, 10);
        let db = db_with(&[machine.clone(), ink.clone()]).await;

        db.carts().add_item("user-1", &machine.id, 2).await.unwrap();
        db.carts().add_item("user-1", &ink.id, 10).await.unwrap();

        // Stock for the second line drops after the items were added
        let mut drained = ink.clone();
        drained.stock = 4;
        db.products().update(&drained).await.unwrap();

        let err = db
            .orders()
            .create_from_cart("user-1", CheckoutDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // Nothing happened: first line's stock intact, cart still active,
        // no order row
        assert_eq!(db.products().require(&machine.id).await.unwrap().stock, 5);
        let cart = db.carts().get_active("user-1").await.unwrap();
        assert_eq!(cart.items.len(), 2);
        let orders = db.orders().list(&OrderFilter::default()).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_status_chain_and_rejections() {
        let db = db_with(&[]).await;
        let order = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap();

        // Skipping CONFIRMADA is rejected
        let err = db
            .orders()
            .change_status(&order.id, OrderStatus::Procesando, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));

        let order = db
            .orders()
            .change_status(&order.id, OrderStatus::Confirmada, Some("confirmed by ops"))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmada);
        assert_eq!(order.notes.as_deref(), Some("confirmed by ops"));

        let order = db
            .orders()
            .change_status(&order.id, OrderStatus::Procesando, None)
            .await
            .unwrap();
        let order = db
            .orders()
            .change_status(&order.id, OrderStatus::Enviada, None)
            .await
            .unwrap();
        assert!(order.shipped_at.is_some());

        let order = db
            .orders()
            .change_status(&order.id, OrderStatus::Entregada, None)
            .await
            .unwrap();

        // Terminal: nothing leaves ENTREGADA
        let err = db
            .orders()
            .change_status(&order.id, OrderStatus::Cancelada, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancellation_restocks_items() {
        let ink = sample_product("Ink Set", 4500, 10);
        let db = db_with(std::slice::from_ref(&ink)).await;

        db.carts().add_item("user-1", &ink.id, 4).await.unwrap();
        let order = db
            .orders()
            .create_from_cart("user-1", CheckoutDetails::default())
            .await
            .unwrap();
        assert_eq!(db.products().require(&ink.id).await.unwrap().stock, 6);

        db.orders()
            .change_status(&order.id, OrderStatus::Cancelada, Some("customer request"))
            .await
            .unwrap();
        assert_eq!(db.products().require(&ink.id).await.unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_cancelling_direct_order_leaves_stock_alone() {
        let ink = sample_product("Ink Set", 4500, 10);
        let db = db_with(std::slice::from_ref(&ink)).await;

        // Direct creation bypasses the ledger entirely
        let order = db
            .orders()
            .create(direct_order(vec![line(&ink.id, "Ink Set", 2, 4500)]))
            .await
            .unwrap();
        assert!(!order.stock_reserved);
        assert_eq!(db.products().require(&ink.id).await.unwrap().stock, 10);

        // So cancelling it must not invent inventory either
        db.orders()
            .change_status(&order.id, OrderStatus::Cancelada, None)
            .await
            .unwrap();
        assert_eq!(db.products().require(&ink.id).await.unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_update_recomputes_totals_and_respects_editability() {
        let db = db_with(&[]).await;
        let order = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 2, 4500)]))
            .await
            .unwrap();

        let updated = db
            .orders()
            .update(
                &order.id,
                OrderPatch {
                    shipping_cents: Some(2000),
                    shipping_city: Some("Sevilla".to_string()),
                    ..OrderPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.shipping_city.as_deref(), Some("Sevilla"));
        assert_eq!(updated.total_cents, 9000 + 500 + 2000 - 300);

        // Push the order past the editable window
        db.orders()
            .change_status(&order.id, OrderStatus::Confirmada, None)
            .await
            .unwrap();
        db.orders()
            .change_status(&order.id, OrderStatus::Procesando, None)
            .await
            .unwrap();

        let err = db
            .orders()
            .update(&order.id, OrderPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ImmutableRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_user_and_status() {
        let db = db_with(&[]).await;

        let mine = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap();
        let mut other = direct_order(vec![line("p-2", "Needles", 1, 1500)]);
        other.user_id = Some("user-2".to_string());
        db.orders().create(other).await.unwrap();

        db.orders()
            .change_status(&mine.id, OrderStatus::Confirmada, None)
            .await
            .unwrap();

        let for_user = db
            .orders()
            .list(&OrderFilter {
                user_id: Some("user-1".to_string()),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(for_user.len(), 1);
        assert_eq!(for_user[0].id, mine.id);

        let confirmed = db
            .orders()
            .list(&OrderFilter {
                status: Some(OrderStatus::Confirmada),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);

        let pending = db
            .orders()
            .list(&OrderFilter {
                status: Some(OrderStatus::Pendiente),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_order() {
        let db = db_with(&[]).await;
        let order = db
            .orders()
            .create(direct_order(vec![line("p-1", "Ink Set", 1, 4500)]))
            .await
            .unwrap();

        db.orders().remove(&order.id).await.unwrap();
        assert!(db.orders().get_by_id(&order.id).await.unwrap().is_none());

        let err = db.orders().remove(&order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::OrderNotFound(_))));
    }
}
