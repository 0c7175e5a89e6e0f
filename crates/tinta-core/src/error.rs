//! # Error Types
//!
//! Domain-specific error types for tinta-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tinta-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tinta-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → HTTP boundary           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, quantities, states)
//! 3. Errors are enum variants, never String
//! 4. Every failure names the specific violated rule

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are recovered at the
/// point of detection and surfaced to the caller as a typed failure with
/// a human-readable message, never as an unstructured crash.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be resolved by id.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// A cart line item references a product that has since disappeared
    /// from the catalog. Detected during checkout preparation.
    #[error("product '{name}' is no longer available")]
    ProductUnavailable { name: String },

    /// Customer cannot be resolved by id.
    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    /// Insufficient stock for the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=2
    ///      │
    ///      ▼
    /// InsufficientStock { product_name, available: 2, requested: 5 }
    /// ```
    #[error("insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Cart line item cannot be found.
    #[error("cart item not found: {0}")]
    CartItemNotFound(String),

    /// The caller does not own the cart being mutated.
    #[error("cart {cart_id} does not belong to user {user_id}")]
    Forbidden { user_id: String, cart_id: String },

    /// Checkout attempted on a cart with no line items.
    #[error("cart is empty")]
    EmptyCart,

    /// Order cannot be found.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Invoice cannot be found.
    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Illegal state-machine transition. Names both states so the
    /// contract stays testable.
    #[error("cannot transition {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Mutation attempted on a frozen record (paid/cancelled invoice,
    /// order past its early states).
    #[error("{entity} {id} is {status} and can no longer be modified")]
    ImmutableRecord {
        entity: &'static str,
        id: String,
        status: String,
    },

    /// Only draft invoices may be deleted; anything that reached pending
    /// stays for the audit trail.
    #[error("invoice {id} is {status}; only draft invoices can be deleted")]
    NotDraft { id: String, status: String },

    /// Payment attempted on an invoice that is already paid.
    #[error("invoice {0} is already paid")]
    AlreadyPaid(String),

    /// Payment attempted on a cancelled invoice.
    #[error("cannot pay cancelled invoice {0}")]
    CannotPayCancelled(String),

    /// Cancellation attempted on a paid invoice.
    #[error("cannot cancel paid invoice {0}")]
    CannotCancelPaid(String),

    /// Business-number uniqueness could not be satisfied after retries.
    #[error("could not allocate a unique {prefix} number after {attempts} attempts")]
    NumberConflict { prefix: String, attempts: u32 },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for
/// early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_the_rule() {
        let err = CoreError::InsufficientStock {
            product_name: "Rotary Machine".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for Rotary Machine: requested 5, available 2"
        );
    }

    #[test]
    fn test_invalid_transition_names_both_states() {
        let err = CoreError::InvalidTransition {
            entity: "invoice",
            from: "paid".to_string(),
            to: "draft".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot transition invoice from 'paid' to 'draft'"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
