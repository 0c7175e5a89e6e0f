//! # Status Transition Tables
//!
//! The single source of truth for order and invoice state-machine
//! legality. Every status-mutating entry point in the persistence layer
//! consults this module, including the specialized pay/cancel actions,
//! so there is exactly one place where a transition can be allowed.
//!
//! ## Invoice State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   DRAFT ──────► PENDING ──────► PAID (terminal)                        │
//! │     │              │  ▲                                                 │
//! │     │              ▼  │                                                 │
//! │     │           OVERDUE ──────► PAID                                    │
//! │     │              │                                                    │
//! │     └──────────────┴──────────► CANCELLED (terminal)                    │
//! │                                                                         │
//! │   pay():    DRAFT / PENDING / OVERDUE → PAID  (distinguished action)   │
//! │   cancel(): anything except PAID → CANCELLED                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order State Machine
//! ```text
//! PENDIENTE → CONFIRMADA → PROCESANDO → ENVIADA → ENTREGADA (terminal)
//!     └───────────┴────────────┴───────────┴────► CANCELADA (terminal)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{InvoiceStatus, OrderStatus};

// =============================================================================
// Invoice Transitions
// =============================================================================

impl InvoiceStatus {
    /// The allow-list of generic transitions out of this status.
    pub const fn allowed_transitions(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Pending, InvoiceStatus::Cancelled],
            InvoiceStatus::Pending => &[
                InvoiceStatus::Paid,
                InvoiceStatus::Overdue,
                InvoiceStatus::Cancelled,
            ],
            InvoiceStatus::Overdue => &[InvoiceStatus::Paid, InvoiceStatus::Cancelled],
            // Paid and cancelled invoices never change state
            InvoiceStatus::Paid => &[],
            InvoiceStatus::Cancelled => &[],
        }
    }

    /// Checks whether a generic transition to `to` is legal.
    pub fn can_transition_to(&self, to: InvoiceStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// True for states with no outgoing transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Whether the pay action may run from this status.
    ///
    /// Payment is a distinguished action, not a raw status write: drafts
    /// may be paid directly even though DRAFT → PAID is absent from the
    /// generic allow-list. The rule lives here so pay and the table can
    /// never disagree.
    pub const fn can_pay(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Pending | InvoiceStatus::Overdue
        )
    }

    /// Whether the cancel action may run from this status.
    pub const fn can_cancel(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// Validates a generic invoice transition, failing with
/// `InvalidTransition` naming both states.
pub fn ensure_invoice_transition(from: InvoiceStatus, to: InvoiceStatus) -> CoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            entity: "invoice",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

// =============================================================================
// Order Transitions
// =============================================================================

impl OrderStatus {
    /// The allow-list of transitions out of this status.
    ///
    /// The order machine mirrors the invoice machine's strictness: the
    /// linear fulfillment chain, with cancellation reachable from every
    /// non-terminal state.
    pub const fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pendiente => &[OrderStatus::Confirmada, OrderStatus::Cancelada],
            OrderStatus::Confirmada => &[OrderStatus::Procesando, OrderStatus::Cancelada],
            OrderStatus::Procesando => &[OrderStatus::Enviada, OrderStatus::Cancelada],
            OrderStatus::Enviada => &[OrderStatus::Entregada, OrderStatus::Cancelada],
            OrderStatus::Entregada => &[],
            OrderStatus::Cancelada => &[],
        }
    }

    /// Checks whether a transition to `to` is legal.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// True for states with no outgoing transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Entregada | OrderStatus::Cancelada)
    }

    /// Whether non-status fields may still be edited. Orders freeze once
    /// fulfillment starts.
    pub const fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Pendiente | OrderStatus::Confirmada)
    }
}

/// Validates an order transition, failing with `InvalidTransition`
/// naming both states.
pub fn ensure_order_transition(from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            entity: "order",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
