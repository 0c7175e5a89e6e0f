//! # Customer Repository
//!
//! Narrow customer lookups for invoicing. Invoices copy the contact and
//! document fields at issuance; this repository only needs to resolve a
//! customer at that moment.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::DbResult;
use tinta_core::{CoreError, Customer};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, address, document, document_type \
             FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_customer(&r)).transpose()
    }

    /// Gets a customer by ID, failing with `CustomerNotFound` when missing.
    pub async fn require(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()).into())
    }

    /// Inserts a customer (used by seeding and tests).
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO customers (id, name, email, phone, address, document, document_type) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.document)
        .bind(&customer.document_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_customer(row: &SqliteRow) -> DbResult<Customer> {
    Ok(Customer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        document: row.try_get("document")?,
        document_type: row.try_get("document_type")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
