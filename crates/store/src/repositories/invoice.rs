use sqlx::Row;

use fieldops_core::access::RecordFilter;
use fieldops_core::domain::invoice::{
    CounterpartyType, Invoice, InvoiceId, InvoiceStatus,
};
use fieldops_core::domain::{CustomerId, ProjectId};

use super::report::parse_decimal;
use super::{InvoiceRepository, StoreError};
use crate::DbPool;

const INVOICE_COLUMNS: &str = "id, project_id, counterparty_type, counterparty_name, \
     customer_id, amount, status, due_date, created_at";

pub struct SqlInvoiceRepository {
    pool: DbPool,
}

impl SqlInvoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_invoice(row: &sqlx::sqlite::SqliteRow) -> Result<Invoice, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = InvoiceStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown invoice status `{status_raw}`")))?;
    let counterparty_raw: String = row.try_get("counterparty_type")?;
    let counterparty_type = CounterpartyType::parse(&counterparty_raw).ok_or_else(|| {
        StoreError::Decode(format!("unknown counterparty type `{counterparty_raw}`"))
    })?;
    let amount: String = row.try_get("amount")?;

    Ok(Invoice {
        id: InvoiceId(row.try_get("id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        counterparty_type,
        counterparty_name: row.try_get("counterparty_name")?,
        customer_id: row.try_get::<Option<String>, _>("customer_id")?.map(CustomerId),
        amount: parse_decimal(&amount, "invoice.amount")?,
        status,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait::async_trait]
impl InvoiceRepository for SqlInvoiceRepository {
    async fn get(&self, id: &InvoiceId) -> Result<Invoice, StoreError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoice WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        let row = row.ok_or_else(|| StoreError::NotFound { kind: "Invoice", id: id.0.clone() })?;
        map_invoice(&row)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Invoice>, StoreError> {
        let rows = match filter {
            RecordFilter::Nothing => return Ok(Vec::new()),
            RecordFilter::All => {
                let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoice ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            RecordFilter::Projects(project_ids) => {
                let placeholders = vec!["?"; project_ids.len()].join(", ");
                let sql = format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoice \
                     WHERE project_id IN ({placeholders}) ORDER BY id"
                );
                let mut query = sqlx::query(&sql);
                for project_id in project_ids {
                    query = query.bind(&project_id.0);
                }
                query.fetch_all(&self.pool).await?
            }
            RecordFilter::Customer(customer_id) => {
                let sql =
                    format!("SELECT {INVOICE_COLUMNS} FROM invoice WHERE customer_id = ? ORDER BY id");
                sqlx::query(&sql).bind(&customer_id.0).fetch_all(&self.pool).await?
            }
            // Invoices are never engineer-scoped; fail closed if one leaks.
            RecordFilter::AssignedEngineer(_) => return Ok(Vec::new()),
        };

        rows.iter().map(map_invoice).collect()
    }

    async fn insert(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        sqlx::query(
            "INSERT INTO invoice \
             (id, project_id, counterparty_type, counterparty_name, customer_id, amount, \
              status, due_date, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&invoice.id.0)
        .bind(&invoice.project_id.0)
        .bind(invoice.counterparty_type.as_str())
        .bind(&invoice.counterparty_name)
        .bind(invoice.customer_id.as_ref().map(|id| id.0.clone()))
        .bind(invoice.amount.to_string())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;

        Ok(invoice)
    }

    async fn update_status(
        &self,
        id: &InvoiceId,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, StoreError> {
        let result = sqlx::query("UPDATE invoice SET status = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(&id.0)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await {
                Ok(_) => Err(StoreError::Conflict { kind: "Invoice", id: id.0.clone() }),
                Err(error) => Err(error),
            };
        }

        self.get(id).await
    }
}
