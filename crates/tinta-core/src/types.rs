//! # Domain Types
//!
//! Core domain types for the Tinta commerce core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Cart        │   │     Order       │   │    Invoice      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  user_id        │   │  order_number   │   │  invoice_number │       │
//! │  │  items          │   │  items (frozen) │   │  status         │       │
//! │  │  total_cents    │   │  status         │   │  total_cents    │       │
//! │  │  active         │   │  total_cents    │   │  customer snap  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Product and Customer are external collaborators: this core reads      │
//! │  them through narrow lookups and never owns their lifecycle.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! CartItem and OrderItem carry both a product_id (weak back-reference,
//! used for re-validation only) and copied name/price fields. The copies
//! are the source of truth for display and pricing history; they are never
//! re-derived from the live catalog after the fact.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{cart_total, invoice_tax_amount, invoice_total, Money, Percentage};

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// Wire strings are Spanish and fixed by the external contract:
/// `pendiente, confirmada, procesando, enviada, entregada, cancelada`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order received, awaiting confirmation.
    Pendiente,
    /// Order confirmed by the shop.
    Confirmada,
    /// Order is being prepared.
    Procesando,
    /// Order handed to the carrier.
    Enviada,
    /// Order delivered (terminal).
    Entregada,
    /// Order cancelled (terminal).
    Cancelada,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pendiente
    }
}

impl OrderStatus {
    /// The wire string for this status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "pendiente",
            OrderStatus::Confirmada => "confirmada",
            OrderStatus::Procesando => "procesando",
            OrderStatus::Enviada => "enviada",
            OrderStatus::Entregada => "entregada",
            OrderStatus::Cancelada => "cancelada",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The status of an invoice.
///
/// Wire strings: `draft, pending, paid, cancelled, overdue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Unissued working copy. The only deletable state.
    Draft,
    /// Issued, awaiting payment.
    Pending,
    /// Paid in full (terminal).
    Paid,
    /// Cancelled (terminal).
    Cancelled,
    /// Past its due date without payment.
    Overdue,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl InvoiceStatus {
    /// The wire string for this status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credit card.
    TarjetaCredito,
    /// Debit card.
    TarjetaDebito,
    /// PayPal.
    Paypal,
    /// Bank transfer.
    Transferencia,
    /// Cash.
    Efectivo,
}

// =============================================================================
// Product (external collaborator)
// =============================================================================

/// A catalog product. Referenced, not owned, by this core.
///
/// `stock` is the single shared mutable column the stock ledger guard
/// reads and conditionally decrements. Every read is treated as stale by
/// the time of a subsequent write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, snapshotted onto line items.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Current stock level.
    pub stock: i64,

    /// Image URLs; the first one is snapshotted onto cart items.
    pub images: Vec<String>,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// The first image URL, if any. Snapshotted at add-to-cart time.
    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Checks whether `quantity` units can be taken from current stock.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Customer (external collaborator)
// =============================================================================

/// The narrow customer lookup interface invoices snapshot from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// National id / tax id.
    pub document: Option<String>,
    /// Document kind (cedula, ruc, pasaporte).
    pub document_type: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

/// A shopping cart.
///
/// ## Invariants
/// - At most one active cart per user at any time.
/// - `total_cents` is a read-time-consistent cache: it always equals the
///   sum of item subtotals when handed to a caller, and is recomputed
///   before every read rather than trusted between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    /// Line items. Cart exclusively owns them; deleting a cart cascades.
    pub items: Vec<CartItem>,
    /// Derived, cached total in cents.
    pub total_cents: i64,
    /// Active flag. Checkout completion deactivates, never deletes.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Returns the cached total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Recomputes the total from item subtotals.
    pub fn calculate_total(&self) -> Money {
        cart_total(self.items.iter().map(|i| i.subtotal()))
    }

    /// Total quantity across all line items.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Checks if the cart has no line items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A line item in a cart.
///
/// Snapshot pattern: name, unit price, and image are frozen copies taken
/// when the item was added. `product_id` is a weak back-reference used
/// only to re-validate stock and refresh a drifted price at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    /// Weak reference to the live product.
    pub product_id: String,
    /// Product name at add-time (frozen).
    pub product_name: String,
    /// Unit price in cents at add-time. May be refreshed from the live
    /// price during checkout preparation.
    pub unit_price_cents: i64,
    /// Quantity (always ≥ 1).
    pub quantity: i64,
    /// quantity × unit_price, recomputed on every mutation.
    pub subtotal_cents: i64,
    /// First product image at add-time, if any.
    pub product_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the stored subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Recomputes the subtotal from unit price × quantity.
    #[inline]
    pub fn calculate_subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// Embedded customer info for guest (non-registered) orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Payment info snapshot stored on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: String,
    pub card_type: Option<String>,
    pub last_four: Option<String>,
    pub status: Option<String>,
}

/// A customer order.
///
/// ## Invariants
/// - `order_number` is unique and immutable once assigned.
/// - `total = subtotal + tax + shipping − discount`, computed at creation
///   and on explicit update, always from the stored line items.
/// - Items are immutable historical facts; they never re-price themselves
///   from the live catalog after order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// `ORD-YYYY-NNNNNN`, sequential per calendar year.
    pub order_number: String,
    /// Registered customer, if any. Semantically exclusive with
    /// `guest_info` even though both columns exist.
    pub user_id: Option<String>,
    /// Guest checkout snapshot, if any.
    pub guest_info: Option<GuestInfo>,
    /// Frozen line items.
    pub items: Vec<OrderItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    /// True when checkout decremented stock for the lines. Cancellation
    /// releases stock only for such orders; directly created orders
    /// never touched the ledger, so cancelling them must not either.
    pub stock_reserved: bool,
    pub payment_method: Option<PaymentMethod>,
    pub payment_info: Option<PaymentInfo>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Subtotal derived from the stored line items.
    pub fn calculate_subtotal(&self) -> Money {
        cart_total(self.items.iter().map(|i| i.subtotal()))
    }

    /// `subtotal + tax + shipping − discount` from current fields.
    pub fn calculate_total(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
            + Money::from_cents(self.tax_cents)
            + Money::from_cents(self.shipping_cents)
            - Money::from_cents(self.discount_cents)
    }

    /// Re-derives `subtotal_cents` from items and `total_cents` from the
    /// component fields. Client-supplied totals are untrusted.
    pub fn update_totals(&mut self) {
        self.subtotal_cents = self.calculate_subtotal().cents();
        self.total_cents = self.calculate_total().cents();
    }
}

/// A frozen line item in an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Weak back-reference; never used to re-derive historical values.
    pub product_id: String,
    /// Product name at order time (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the stored subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A customer invoice.
///
/// ## Invariants
/// - `invoice_number` is unique, immutable, sequential per year.
/// - `tax_amount = subtotal × tax_percentage / 100` and
///   `total = subtotal + tax_amount − discount_amount`; both derived
///   fields are recomputed whenever their inputs change and are never
///   independently settable by a client.
/// - Customer contact/document fields are snapshotted at issuance so
///   later profile edits don't retroactively alter a legal document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    /// `INV-YYYY-NNNNNN`, sequential per calendar year.
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    /// Weak reference to the customer record.
    pub customer_id: String,
    // Customer snapshot, captured at issuance.
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub customer_document: Option<String>,
    pub customer_document_type: Option<String>,
    // Totals. Percentages in basis points (1500 = 15.00%).
    pub subtotal_cents: i64,
    pub tax_percentage_bps: u32,
    /// Derived: subtotal × tax_percentage / 100.
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub discount_percentage_bps: u32,
    /// Derived: subtotal + tax_amount − discount_amount.
    pub total_cents: i64,
    // Payment fields, set only by the pay action.
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the tax percentage.
    #[inline]
    pub fn tax_percentage(&self) -> Percentage {
        Percentage::from_bps(self.tax_percentage_bps)
    }

    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Recomputes the derived `tax_amount_cents` and `total_cents` from
    /// subtotal, tax percentage, and discount amount. Idempotent: calling
    /// it twice with unchanged inputs yields the same totals.
    pub fn update_totals(&mut self) {
        let tax = invoice_tax_amount(self.subtotal(), self.tax_percentage());
        self.tax_amount_cents = tax.cents();
        self.total_cents = invoice_total(
            self.subtotal(),
            tax,
            Money::from_cents(self.discount_amount_cents),
        )
        .cents();
    }

    /// Snapshots customer contact/document fields onto the invoice.
    pub fn snapshot_customer(&mut self, customer: &Customer) {
        self.customer_id = customer.id.clone();
        self.customer_name = customer.name.clone();
        self.customer_email = customer.email.clone();
        self.customer_phone = customer.phone.clone();
        self.customer_address = customer.address.clone();
        self.customer_document = customer.document.clone();
        self.customer_document_type = customer.document_type.clone();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
