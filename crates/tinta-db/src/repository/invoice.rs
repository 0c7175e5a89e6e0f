//! # Invoice Repository
//!
//! Invoice lifecycle: creation with customer snapshots, the status
//! allow-list, payment and cancellation actions, and statistics.
//!
//! ## Status Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Status Flow                                │
//! │                                                                         │
//! │   DRAFT ────► PENDING ────► PAID (terminal)                            │
//! │     │            │  ▲                                                   │
//! │     │            ▼  │                                                   │
//! │     │         OVERDUE ────► PAID                                       │
//! │     │            │                                                      │
//! │     └────────────┴────────► CANCELLED (terminal)                        │
//! │                                                                         │
//! │   pay() may settle a DRAFT directly (walk-in sales); the generic       │
//! │   change_status table still refuses a raw draft→paid write.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Customer contact and document fields are copied onto the invoice at
//! issuance. Later customer edits never alter an issued invoice.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::customer::CustomerRepository;
use crate::sequence::{self, MAX_NUMBER_ATTEMPTS};
use crate::tx;
use tinta_core::{
    ensure_invoice_transition, validate_amount_cents, validate_percentage_bps, Customer,
    CoreError, Invoice, InvoiceStatus, Money, PaymentMethod, Percentage, INVOICE_NUMBER_PREFIX,
};

// =============================================================================
// Inputs
// =============================================================================

/// Input for [`InvoiceRepository::create`]. Status always starts DRAFT;
/// tax and discount default to zero. `tax_amount` and `total` are never
/// accepted from a caller.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NewInvoice {
    pub customer_id: String,
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub subtotal_cents: i64,
    /// Basis points (1500 = 15.00%).
    pub tax_percentage_bps: u32,
    pub discount_amount_cents: i64,
    /// When set and no flat amount is given, the discount amount derives
    /// from subtotal × percentage.
    pub discount_percentage_bps: u32,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

/// Partial update for [`InvoiceRepository::update`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct InvoicePatch {
    /// Re-resolves and re-snapshots the customer when changed.
    pub customer_id: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub subtotal_cents: Option<i64>,
    pub tax_percentage_bps: Option<u32>,
    pub discount_amount_cents: Option<i64>,
    pub discount_percentage_bps: Option<u32>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

/// Payment details recorded by [`InvoiceRepository::pay`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Defaults to today.
    pub paid_date: Option<NaiveDate>,
}

/// Listing filter. All fields optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Substring match on the invoice number.
    pub number_contains: Option<String>,
    /// Inclusive issue-date bounds.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Counts per status plus revenue sums over an optional issue-date range.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InvoiceStatistics {
    pub total: i64,
    pub draft: i64,
    pub pending: i64,
    pub paid: i64,
    pub cancelled: i64,
    pub overdue: i64,
    /// Sum of PAID invoice totals.
    pub paid_revenue_cents: i64,
    /// Sum of PENDING and OVERDUE invoice totals (outstanding).
    pub pending_revenue_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a DRAFT invoice, snapshotting the customer and computing
    /// the derived totals, all in one transaction with number retry.
    pub async fn create(&self, input: NewInvoice) -> DbResult<Invoice> {
        validate_amount_cents("subtotal_cents", input.subtotal_cents).map_err(CoreError::from)?;
        validate_amount_cents("discount_amount_cents", input.discount_amount_cents)
            .map_err(CoreError::from)?;
        validate_percentage_bps("tax_percentage_bps", input.tax_percentage_bps)
            .map_err(CoreError::from)?;
        validate_percentage_bps("discount_percentage_bps", input.discount_percentage_bps)
            .map_err(CoreError::from)?;

        let customer = CustomerRepository::new(self.pool.clone())
            .require(&input.customer_id)
            .await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(&input, &customer).await {
                Ok(invoice) => {
                    info!(invoice_number = %invoice.invoice_number, "Invoice created");
                    return Ok(invoice);
                }
                Err(e) if e.is_unique_violation_on("invoice_number") => {
                    if attempt >= MAX_NUMBER_ATTEMPTS {
                        return Err(CoreError::NumberConflict {
                            prefix: INVOICE_NUMBER_PREFIX.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    warn!(attempt, "Invoice number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One creation attempt inside one immediate write transaction, so
    /// concurrent allocators queue instead of tripping over stale WAL
    /// snapshots.
    async fn try_create(&self, input: &NewInvoice, customer: &Customer) -> DbResult<Invoice> {
        let mut conn = tx::begin_immediate(&self.pool).await?;
        match Self::insert_invoice(&mut *conn, input, customer).await {
            Ok(invoice) => {
                tx::commit(&mut *conn).await?;
                Ok(invoice)
            }
            Err(e) => {
                tx::rollback(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn insert_invoice(
        conn: &mut SqliteConnection,
        input: &NewInvoice,
        customer: &Customer,
    ) -> DbResult<Invoice> {
        let invoice_number =
            sequence::next_number(&mut *conn, "invoices", "invoice_number", INVOICE_NUMBER_PREFIX)
                .await?;

        let now = Utc::now();
        let mut invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number,
            status: InvoiceStatus::default(),
            issue_date: input.issue_date.unwrap_or_else(|| now.date_naive()),
            due_date: input.due_date,
            paid_date: None,
            customer_id: String::new(),
            customer_name: String::new(),
            customer_email: String::new(),
            customer_phone: None,
            customer_address: None,
            customer_document: None,
            customer_document_type: None,
            subtotal_cents: input.subtotal_cents,
            tax_percentage_bps: input.tax_percentage_bps,
            tax_amount_cents: 0,
            discount_amount_cents: effective_discount(
                input.subtotal_cents,
                input.discount_amount_cents,
                input.discount_percentage_bps,
            ),
            discount_percentage_bps: input.discount_percentage_bps,
            total_cents: 0,
            payment_method: None,
            payment_reference: None,
            notes: input.notes.clone(),
            terms: input.terms.clone(),
            created_at: now,
            updated_at: now,
        };
        invoice.snapshot_customer(customer);
        invoice.update_totals();

        sqlx::query(
            "INSERT INTO invoices \
             (id, invoice_number, status, issue_date, due_date, paid_date, customer_id, \
              customer_name, customer_email, customer_phone, customer_address, \
              customer_document, customer_document_type, subtotal_cents, tax_percentage_bps, \
              tax_amount_cents, discount_amount_cents, discount_percentage_bps, total_cents, \
              payment_method, payment_reference, notes, terms, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(&invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_phone)
        .bind(&invoice.customer_address)
        .bind(&invoice.customer_document)
        .bind(&invoice.customer_document_type)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_percentage_bps)
        .bind(invoice.tax_amount_cents)
        .bind(invoice.discount_amount_cents)
        .bind(invoice.discount_percentage_bps)
        .bind(invoice.total_cents)
        .bind(invoice.payment_method)
        .bind(&invoice.payment_reference)
        .bind(&invoice.notes)
        .bind(&invoice.terms)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(invoice)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let row = sqlx::query(&format!("{INVOICE_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| map_invoice(&r)).transpose()
    }

    /// Gets an invoice, failing with `InvoiceNotFound` when missing.
    pub async fn require(&self, id: &str) -> DbResult<Invoice> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(id.to_string()).into())
    }

    /// Looks an invoice up by its business number (`INV-2026-000042`).
    pub async fn get_by_number(&self, number: &str) -> DbResult<Invoice> {
        let row = sqlx::query(&format!("{INVOICE_COLUMNS} WHERE invoice_number = ?1"))
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| map_invoice(&r))
            .transpose()?
            .ok_or_else(|| CoreError::InvoiceNotFound(number.to_string()).into())
    }

    /// All invoices for a customer, newest issue date first.
    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Invoice>> {
        self.list(&InvoiceFilter {
            customer_id: Some(customer_id.to_string()),
            ..InvoiceFilter::default()
        })
        .await
    }

    /// Lists invoices matching the filter, newest issue date first.
    ///
    /// Unset filter fields bind as NULL and their predicate collapses to
    /// true, so one prepared statement covers every combination.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "{INVOICE_COLUMNS} \
             WHERE (?1 IS NULL OR status = ?1) \
               AND (?2 IS NULL OR customer_id = ?2) \
               AND (?3 IS NULL OR payment_method = ?3) \
               AND (?4 IS NULL OR instr(invoice_number, ?4) > 0) \
               AND (?5 IS NULL OR issue_date >= ?5) \
               AND (?6 IS NULL OR issue_date <= ?6) \
             ORDER BY issue_date DESC, invoice_number DESC"
        );

        let rows = sqlx::query(&sql)
            .bind(filter.status)
            .bind(filter.customer_id.as_deref())
            .bind(filter.payment_method)
            .bind(filter.number_contains.as_deref())
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_invoice).collect()
    }

    /// Counts per status and revenue sums over an optional issue-date
    /// range (inclusive).
    pub async fn statistics(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<InvoiceStatistics> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(total_cents), 0) AS revenue \
             FROM invoices \
             WHERE (?1 IS NULL OR issue_date >= ?1) AND (?2 IS NULL OR issue_date <= ?2) \
             GROUP BY status",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = InvoiceStatistics::default();
        for row in &rows {
            let status: InvoiceStatus = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let revenue: i64 = row.try_get("revenue")?;

            stats.total += count;
            match status {
                InvoiceStatus::Draft => stats.draft = count,
                InvoiceStatus::Pending => {
                    stats.pending = count;
                    stats.pending_revenue_cents += revenue;
                }
                InvoiceStatus::Paid => {
                    stats.paid = count;
                    stats.paid_revenue_cents += revenue;
                }
                InvoiceStatus::Cancelled => stats.cancelled = count,
                InvoiceStatus::Overdue => {
                    stats.overdue = count;
                    stats.pending_revenue_cents += revenue;
                }
            }
        }
        Ok(stats)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Merges fields into an invoice that is not yet PAID or CANCELLED,
    /// re-snapshotting a changed customer and recomputing the derived
    /// totals.
    pub async fn update(&self, id: &str, patch: InvoicePatch) -> DbResult<Invoice> {
        let mut invoice = self.require(id).await?;
        if matches!(
            invoice.status,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled
        ) {
            return Err(CoreError::ImmutableRecord {
                entity: "invoice",
                id: id.to_string(),
                status: invoice.status.to_string(),
            }
            .into());
        }

        if let Some(customer_id) = &patch.customer_id {
            if *customer_id != invoice.customer_id {
                let customer = CustomerRepository::new(self.pool.clone())
                    .require(customer_id)
                    .await?;
                invoice.snapshot_customer(&customer);
            }
        }
        if let Some(v) = patch.issue_date {
            invoice.issue_date = v;
        }
        if let Some(v) = patch.due_date {
            invoice.due_date = Some(v);
        }
        if let Some(v) = patch.subtotal_cents {
            validate_amount_cents("subtotal_cents", v).map_err(CoreError::from)?;
            invoice.subtotal_cents = v;
        }
        if let Some(v) = patch.tax_percentage_bps {
            validate_percentage_bps("tax_percentage_bps", v).map_err(CoreError::from)?;
            invoice.tax_percentage_bps = v;
        }
        if let Some(v) = patch.discount_percentage_bps {
            validate_percentage_bps("discount_percentage_bps", v).map_err(CoreError::from)?;
            invoice.discount_percentage_bps = v;
            invoice.discount_amount_cents = effective_discount(invoice.subtotal_cents, 0, v);
        }
        if let Some(v) = patch.discount_amount_cents {
            validate_amount_cents("discount_amount_cents", v).map_err(CoreError::from)?;
            invoice.discount_amount_cents = v;
        }
        if let Some(v) = patch.notes {
            invoice.notes = Some(v);
        }
        if let Some(v) = patch.terms {
            invoice.terms = Some(v);
        }

        // Derived fields always recompute; recomputation with unchanged
        // inputs is a no-op.
        invoice.update_totals();
        invoice.updated_at = Utc::now();

        self.persist(&invoice).await?;
        Ok(invoice)
    }

    /// Moves an invoice along the status allow-list.
    ///
    /// Entering OVERDUE populates an unset due date with today.
    pub async fn change_status(&self, id: &str, new_status: InvoiceStatus) -> DbResult<Invoice> {
        let mut invoice = self.require(id).await?;
        ensure_invoice_transition(invoice.status, new_status)?;

        if new_status == InvoiceStatus::Overdue && invoice.due_date.is_none() {
            invoice.due_date = Some(Utc::now().date_naive());
        }
        let from = invoice.status;
        invoice.status = new_status;
        invoice.updated_at = Utc::now();

        self.persist(&invoice).await?;
        info!(invoice_id = id, %from, to = %new_status, "Invoice status changed");
        Ok(invoice)
    }

    /// Settles an invoice, recording method, reference, and paid date.
    ///
    /// DRAFT, PENDING, and OVERDUE invoices can all be paid; DRAFT skips
    /// the issued state entirely (walk-in sales).
    pub async fn pay(&self, id: &str, payment: PaymentDetails) -> DbResult<Invoice> {
        let mut invoice = self.require(id).await?;
        match invoice.status {
            InvoiceStatus::Paid => {
                return Err(CoreError::AlreadyPaid(invoice.invoice_number).into())
            }
            InvoiceStatus::Cancelled => {
                return Err(CoreError::CannotPayCancelled(invoice.invoice_number).into())
            }
            status if status.can_pay() => {}
            status => {
                return Err(CoreError::InvalidTransition {
                    entity: "invoice",
                    from: status.to_string(),
                    to: InvoiceStatus::Paid.to_string(),
                }
                .into())
            }
        }

        invoice.status = InvoiceStatus::Paid;
        invoice.payment_method = Some(payment.method);
        invoice.payment_reference = payment.reference;
        invoice.paid_date = Some(payment.paid_date.unwrap_or_else(|| Utc::now().date_naive()));
        invoice.updated_at = Utc::now();

        self.persist(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, "Invoice paid");
        Ok(invoice)
    }

    /// Cancels an invoice. PAID invoices can never be cancelled.
    pub async fn cancel(&self, id: &str) -> DbResult<Invoice> {
        let mut invoice = self.require(id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(CoreError::CannotCancelPaid(invoice.invoice_number).into());
        }
        if !invoice.status.can_cancel() {
            return Err(CoreError::InvalidTransition {
                entity: "invoice",
                from: invoice.status.to_string(),
                to: InvoiceStatus::Cancelled.to_string(),
            }
            .into());
        }

        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = Utc::now();

        self.persist(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, "Invoice cancelled");
        Ok(invoice)
    }

    /// Deletes an invoice. Only DRAFT may be deleted; anything that
    /// reached PENDING stays as an audit trail.
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let invoice = self.require(id).await?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::NotDraft {
                id: invoice.invoice_number,
                status: invoice.status.to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Writes every mutable column back. Creation inserts; everything
    /// else funnels through here.
    async fn persist(&self, invoice: &Invoice) -> DbResult<()> {
        sqlx::query(
            "UPDATE invoices SET status = ?2, issue_date = ?3, due_date = ?4, paid_date = ?5, \
             customer_id = ?6, customer_name = ?7, customer_email = ?8, customer_phone = ?9, \
             customer_address = ?10, customer_document = ?11, customer_document_type = ?12, \
             subtotal_cents = ?13, tax_percentage_bps = ?14, tax_amount_cents = ?15, \
             discount_amount_cents = ?16, discount_percentage_bps = ?17, total_cents = ?18, \
             payment_method = ?19, payment_reference = ?20, notes = ?21, terms = ?22, \
             updated_at = ?23 \
             WHERE id = ?1",
        )
        .bind(&invoice.id)
        .bind(invoice.status)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(&invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_phone)
        .bind(&invoice.customer_address)
        .bind(&invoice.customer_document)
        .bind(&invoice.customer_document_type)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_percentage_bps)
        .bind(invoice.tax_amount_cents)
        .bind(invoice.discount_amount_cents)
        .bind(invoice.discount_percentage_bps)
        .bind(invoice.total_cents)
        .bind(invoice.payment_method)
        .bind(&invoice.payment_reference)
        .bind(&invoice.notes)
        .bind(&invoice.terms)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// A flat discount wins; otherwise a set percentage derives the amount
/// from the subtotal.
fn effective_discount(subtotal_cents: i64, amount_cents: i64, percentage_bps: u32) -> i64 {
    if amount_cents > 0 || percentage_bps == 0 {
        amount_cents
    } else {
        Money::from_cents(subtotal_cents)
            .percentage_of(Percentage::from_bps(percentage_bps))
            .cents()
    }
}

// Shared SELECT column list so every read maps identically.
const INVOICE_COLUMNS: &str = "SELECT id, invoice_number, status, issue_date, due_date, \
     paid_date, customer_id, customer_name, customer_email, customer_phone, customer_address, \
     customer_document, customer_document_type, subtotal_cents, tax_percentage_bps, \
     tax_amount_cents, discount_amount_cents, discount_percentage_bps, total_cents, \
     payment_method, payment_reference, notes, terms, created_at, updated_at \
     FROM invoices";

fn map_invoice(row: &SqliteRow) -> DbResult<Invoice> {
    Ok(Invoice {
        id: row.try_get("id")?,
        invoice_number: row.try_get("invoice_number")?,
        status: row.try_get("status")?,
        issue_date: row.try_get("issue_date")?,
        due_date: row.try_get("due_date")?,
        paid_date: row.try_get("paid_date")?,
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_address: row.try_get("customer_address")?,
        customer_document: row.try_get("customer_document")?,
        customer_document_type: row.try_get("customer_document_type")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        tax_percentage_bps: row.try_get("tax_percentage_bps")?,
        tax_amount_cents: row.try_get("tax_amount_cents")?,
        discount_amount_cents: row.try_get("discount_amount_cents")?,
        discount_percentage_bps: row.try_get("discount_percentage_bps")?,
        total_cents: row.try_get("total_cents")?,
        payment_method: row.try_get("payment_method")?,
        payment_reference: row.try_get("payment_reference")?,
        notes: row.try_get("notes")?,
        terms: row.try_get("terms")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
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
    use crate::repository::customer::tests::sample_customer;

    async fn db_with_customer() -> (Database, Customer) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = sample_customer("Ana Ruiz", "ana@example.com");
        db.customers().insert(&customer).await.unwrap();
        (db, customer)
    }

    fn draft(customer_id: &str, subtotal_cents: i64, tax_bps: u32) -> NewInvoice {
        NewInvoice {
            customer_id: customer_id.to_string(),
            subtotal_cents,
            tax_percentage_bps: tax_bps,
            ..NewInvoice::default()
        }
    }

    #[tokio::test]
    async fn test_create_snapshots_customer_and_computes_totals() {
        let (db, customer) = db_with_customer().await;

        // 100.00 subtotal at 15% tax
        let invoice = db
            .invoices()
            .create(draft(&customer.id, 10_000, 1500))
            .await
            .unwrap();

        assert!(invoice.invoice_number.starts_with("INV-"));
        assert!(invoice.invoice_number.ends_with("-000001"));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.customer_name, "Ana Ruiz");
        assert_eq!(invoice.customer_email, "ana@example.com");
        assert_eq!(invoice.tax_amount_cents, 1500);
        assert_eq!(invoice.total_cents, 11_500);
        assert_eq!(invoice.issue_date, Utc::now().date_naive());

        // Round-trips unchanged
        let loaded = db.invoices().require(&invoice.id).await.unwrap();
        assert_eq!(loaded.total_cents, 11_500);
        assert_eq!(loaded.customer_document, customer.document);
    }

    #[tokio::test]
    async fn test_create_with_unknown_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .invoices()
            .create(draft("ghost", 10_000, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CustomerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_percentage_discount_derives_amount() {
        let (db, customer) = db_with_customer().await;

        let mut input = draft(&customer.id, 20_000, 0);
        input.discount_percentage_bps = 1000; // 10%
        let invoice = db.invoices().create(input).await.unwrap();

        assert_eq!(invoice.discount_amount_cents, 2000);
        assert_eq!(invoice.total_cents, 18_000);
    }

    #[tokio::test]
    async fn test_invoice_sequence_is_independent_of_orders() {
        let (db, customer) = db_with_customer().await;

        db.orders()
            .create(crate::repository::order::NewOrder {
                user_id: Some("user-1".to_string()),
                items: vec![crate::repository::order::NewOrderItem {
                    product_id: "p-1".to_string(),
                    product_name: "Ink Set".to_string(),
                    quantity: 1,
                    unit_price_cents: 4500,
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        let invoice = db
            .invoices()
            .create(draft(&customer.id, 1000, 0))
            .await
            .unwrap();
        assert!(invoice.invoice_number.ends_with("-000001"));
    }

    #[tokio::test]
    async fn test_later_customer_edits_do_not_alter_snapshot() {
        let (db, customer) = db_with_customer().await;
        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();

        sqlx::query("UPDATE customers SET name = 'Renamed' WHERE id = ?1")
            .bind(&customer.id)
            .execute(db.pool())
            .await
            .unwrap();

        let loaded = db.invoices().require(&invoice.id).await.unwrap();
        assert_eq!(loaded.customer_name, "Ana Ruiz");
    }

    #[tokio::test]
    async fn test_change_status_follows_allow_list() {
        let (db, customer) = db_with_customer().await;
        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();

        // The generic table refuses a raw draft→paid write
        let err = db
            .invoices()
            .change_status(&invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));

        let invoice = db
            .invoices()
            .change_status(&invoice.id, InvoiceStatus::Pending)
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        let invoice = db
            .invoices()
            .change_status(&invoice.id, InvoiceStatus::Overdue)
            .await
            .unwrap();
        // Unset due date autofilled with today
        assert_eq!(invoice.due_date, Some(Utc::now().date_naive()));
    }

    #[tokio::test]
    async fn test_pay_settles_draft_directly() {
        let (db, customer) = db_with_customer().await;
        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();

        let paid = db
            .invoices()
            .pay(
                &invoice.id,
                PaymentDetails {
                    method: PaymentMethod::Efectivo,
                    reference: Some("walk-in".to_string()),
                    paid_date: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payment_method, Some(PaymentMethod::Efectivo));
        assert_eq!(paid.payment_reference.as_deref(), Some("walk-in"));
        assert_eq!(paid.paid_date, Some(Utc::now().date_naive()));
    }

    #[tokio::test]
    async fn test_pay_twice_and_pay_cancelled() {
        let (db, customer) = db_with_customer().await;
        let payment = PaymentDetails {
            method: PaymentMethod::Transferencia,
            reference: None,
            paid_date: None,
        };

        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();
        db.invoices().pay(&invoice.id, payment.clone()).await.unwrap();

        let err = db
            .invoices()
            .pay(&invoice.id, payment.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AlreadyPaid(_))));

        let cancelled = db
            .invoices()
            .create(draft(&customer.id, 2000, 0))
            .await
            .unwrap();
        db.invoices().cancel(&cancelled.id).await.unwrap();

        let err = db
            .invoices()
            .pay(&cancelled.id, payment)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CannotPayCancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let (db, customer) = db_with_customer().await;

        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();
        db.invoices()
            .pay(
                &invoice.id,
                PaymentDetails {
                    method: PaymentMethod::Paypal,
                    reference: None,
                    paid_date: None,
                },
            )
            .await
            .unwrap();

        let err = db.invoices().cancel(&invoice.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CannotCancelPaid(_))
        ));

        // Overdue invoices can still be cancelled
        let overdue = db
            .invoices()
            .create(draft(&customer.id, 3000, 0))
            .await
            .unwrap();
        db.invoices()
            .change_status(&overdue.id, InvoiceStatus::Pending)
            .await
            .unwrap();
        db.invoices()
            .change_status(&overdue.id, InvoiceStatus::Overdue)
            .await
            .unwrap();
        let cancelled = db.invoices().cancel(&overdue.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_recomputes_and_respects_immutability() {
        let (db, customer) = db_with_customer().await;
        let invoice = db
            .invoices()
            .create(draft(&customer.id, 10_000, 1500))
            .await
            .unwrap();

        let updated = db
            .invoices()
            .update(
                &invoice.id,
                InvoicePatch {
                    subtotal_cents: Some(20_000),
                    ..InvoicePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tax_amount_cents, 3000);
        assert_eq!(updated.total_cents, 23_000);

        db.invoices()
            .pay(
                &invoice.id,
                PaymentDetails {
                    method: PaymentMethod::TarjetaCredito,
                    reference: None,
                    paid_date: None,
                },
            )
            .await
            .unwrap();

        let err = db
            .invoices()
            .update(&invoice.id, InvoicePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ImmutableRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_can_switch_customer_snapshot() {
        let (db, customer) = db_with_customer().await;
        let other = sample_customer("Luis Vega", "luis@example.com");
        db.customers().insert(&other).await.unwrap();

        let invoice = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();
        let updated = db
            .invoices()
            .update(
                &invoice.id,
                InvoicePatch {
                    customer_id: Some(other.id.clone()),
                    ..InvoicePatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.customer_id, other.id);
        assert_eq!(updated.customer_name, "Luis Vega");
    }

    #[tokio::test]
    async fn test_remove_only_drafts() {
        let (db, customer) = db_with_customer().await;

        let keep = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();
        db.invoices()
            .change_status(&keep.id, InvoiceStatus::Pending)
            .await
            .unwrap();

        let err = db.invoices().remove(&keep.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotDraft { .. })));

        let gone = db
            .invoices()
            .create(draft(&customer.id, 1000, 0))
            .await
            .unwrap();
        db.invoices().remove(&gone.id).await.unwrap();
        assert!(db.invoices().get_by_id(&gone.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_number_and_list_filters() {
        let (db, customer) = db_with_customer().await;

        let first = db
            .invoices()
            .create(draft(&customer.id, 5000, 0))
            .await
            .unwrap();
        let second = db
            .invoices()
            .create(draft(&customer.id, 7000, 0))
            .await
            .unwrap();
        db.invoices()
            .change_status(&second.id, InvoiceStatus::Pending)
            .await
            .unwrap();

        let by_number = db
            .invoices()
            .get_by_number(&first.invoice_number)
            .await
            .unwrap();
        assert_eq!(by_number.id, first.id);

        let err = db
            .invoices()
            .get_by_number("INV-1999-000001")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvoiceNotFound(_))
        ));

        let drafts = db
            .invoices()
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Draft),
                ..InvoiceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, first.id);

        let by_customer = db.invoices().list_by_customer(&customer.id).await.unwrap();
        assert_eq!(by_customer.len(), 2);

        let by_substring = db
            .invoices()
            .list(&InvoiceFilter {
                number_contains: Some("000002".to_string()),
                ..InvoiceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_substring.len(), 1);
        assert_eq!(by_substring[0].id, second.id);
    }

    #[tokio::test]
    async fn test_statistics() {
        let (db, customer) = db_with_customer().await;

        let paid = db
            .invoices()
            .create(draft(&customer.id, 10_000, 0))
            .await
            .unwrap();
        db.invoices()
            .pay(
                &paid.id,
                PaymentDetails {
                    method: PaymentMethod::Efectivo,
                    reference: None,
                    paid_date: None,
                },
            )
            .await
            .unwrap();

        let pending = db
            .invoices()
            .create(draft(&customer.id, 4000, 0))
            .await
            .unwrap();
        db.invoices()
            .change_status(&pending.id, InvoiceStatus::Pending)
            .await
            .unwrap();

        db.invoices()
            .create(draft(&customer.id, 999, 0))
            .await
            .unwrap();

        let stats = db.invoices().statistics(None, None).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.paid, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.draft, 1);
        assert_eq!(stats.paid_revenue_cents, 10_000);
        assert_eq!(stats.pending_revenue_cents, 4000);

        // A range excluding everything
        let empty = db
            .invoices()
            .statistics(
                Some(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()),
                Some(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(empty.total, 0);
    }
}
