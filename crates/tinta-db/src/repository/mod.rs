//! # Repository Module
//!
//! Database repository implementations for the Tinta store backend.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Request handler                                                       │
//! │       │                                                                 │
//! │       │  db.carts().add_item(user_id, product_id, 2)                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  CartRepository                                                        │
//! │  ├── get_active(&self, user_id)                                        │
//! │  ├── add_item(&self, user_id, product_id, quantity)                    │
//! │  ├── prepare_for_checkout(&self, user_id)                              │
//! │  └── deactivate(&self, user_id)                                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • Easy to test against an in-memory database                          │
//! │  • SQL is isolated in one place                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product lookup and the stock guard
//! - [`CustomerRepository`] - Customer lookup for invoicing
//! - [`CartRepository`] - Active-cart lifecycle
//! - [`OrderRepository`] - Order creation and status transitions
//! - [`InvoiceRepository`] - Invoice lifecycle and statistics
//!
//! [`ProductRepository`]: product::ProductRepository
//! [`CustomerRepository`]: customer::CustomerRepository
//! [`CartRepository`]: cart::CartRepository
//! [`OrderRepository`]: order::OrderRepository
//! [`InvoiceRepository`]: invoice::InvoiceRepository

pub mod cart;
pub mod customer;
pub mod invoice;
pub mod order;
pub mod product;
