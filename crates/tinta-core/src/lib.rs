//! # tinta-core: Pure Business Logic for the Tinta Commerce Core
//!
//! This crate is the **heart** of the cart/order/invoice lifecycle. It
//! contains all business rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tinta Commerce Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             HTTP handlers (outside this workspace)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tinta-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  status   │  │ validation│  │   │
//! │  │   │ Cart/Order│  │   Money   │  │ transition│  │   rules   │  │   │
//! │  │   │  Invoice  │  │ Percentage│  │  tables   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tinta-db (Database Layer)                    │   │
//! │  │           SQLite queries, migrations, repositories              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Cart, Order, Invoice, Product, Customer)
//! - [`money`] - Money/Percentage types and the pure total calculators
//! - [`status`] - Order and invoice status transition tables
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output, always
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64), percentages
//!    are basis points — no floating point in business arithmetic
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tinta_core::Money` instead of
// `use tinta_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percentage};
pub use status::{ensure_invoice_transition, ensure_order_transition};
pub use types::*;
pub use validation::{
    validate_amount_cents, validate_percentage_bps, validate_quantity, validate_uuid,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Business-number prefix for orders: `ORD-YYYY-NNNNNN`.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Business-number prefix for invoices: `INV-YYYY-NNNNNN`.
pub const INVOICE_NUMBER_PREFIX: &str = "INV";

/// Width of the zero-padded sequence suffix in business numbers.
pub const NUMBER_PAD_WIDTH: usize = 6;
