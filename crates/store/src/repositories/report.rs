use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use fieldops_core::access::RecordFilter;
use fieldops_core::domain::report::{ReportId, ReportStatus, ServiceReport, WorkItem};
use fieldops_core::domain::request::{RequestId, RequestStatus, ServiceRequest};
use fieldops_core::workflow::ReportSubmission;

use super::request::map_request;
use super::{ServiceReportRepository, StoreError};
use crate::DbPool;

const REPORT_COLUMNS: &str = "id, service_request_id, status, total_amount, created_at";

pub struct SqlServiceReportRepository {
    pool: DbPool,
}

impl SqlServiceReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn work_items(&self, report_id: &ReportId) -> Result<Vec<WorkItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT description, hours, rate, total FROM report_work_item \
             WHERE report_id = ? ORDER BY position",
        )
        .bind(&report_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_work_item).collect()
    }
}

pub(crate) fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw)
        .map_err(|_| StoreError::Decode(format!("invalid decimal `{raw}` in {field}")))
}

fn map_work_item(row: &sqlx::sqlite::SqliteRow) -> Result<WorkItem, StoreError> {
    let hours: String = row.try_get("hours")?;
    let rate: String = row.try_get("rate")?;
    let total: String = row.try_get("total")?;
    Ok(WorkItem {
        description: row.try_get("description")?,
        hours: parse_decimal(&hours, "report_work_item.hours")?,
        rate: parse_decimal(&rate, "report_work_item.rate")?,
        total: parse_decimal(&total, "report_work_item.total")?,
    })
}

fn map_report(
    row: &sqlx::sqlite::SqliteRow,
    work_items: Vec<WorkItem>,
) -> Result<ServiceReport, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = ReportStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown report status `{status_raw}`")))?;
    let total_amount: String = row.try_get("total_amount")?;

    Ok(ServiceReport {
        id: ReportId(row.try_get("id")?),
        service_request_id: RequestId(row.try_get("service_request_id")?),
        status,
        work_items,
        total_amount: parse_decimal(&total_amount, "service_report.total_amount")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait::async_trait]
impl ServiceReportRepository for SqlServiceReportRepository {
    async fn get(&self, id: &ReportId) -> Result<ServiceReport, StoreError> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM service_report WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        let row =
            row.ok_or_else(|| StoreError::NotFound { kind: "ServiceReport", id: id.0.clone() })?;
        let work_items = self.work_items(id).await?;
        map_report(&row, work_items)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceReport>, StoreError> {
        // Reports only support unscoped listing; narrower filters are
        // rejected upstream as UnsupportedScope and never reach the store.
        let rows = match filter {
            RecordFilter::All => {
                let sql = format!("SELECT {REPORT_COLUMNS} FROM service_report ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            _ => return Ok(Vec::new()),
        };

        let mut reports = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = ReportId(row.try_get("id")?);
            let work_items = self.work_items(&id).await?;
            reports.push(map_report(row, work_items)?);
        }
        Ok(reports)
    }

    async fn insert(&self, report: ServiceReport) -> Result<ServiceReport, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO service_report (id, service_request_id, status, total_amount, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&report.id.0)
        .bind(&report.service_request_id.0)
        .bind(report.status.as_str())
        .bind(report.total_amount.to_string())
        .bind(report.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in report.work_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO report_work_item (report_id, position, description, hours, rate, total) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&report.id.0)
            .bind(position as i64)
            .bind(&item.description)
            .bind(item.hours.to_string())
            .bind(item.rate.to_string())
            .bind(item.total.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn update_status(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        next: ReportStatus,
    ) -> Result<ServiceReport, StoreError> {
        let result =
            sqlx::query("UPDATE service_report SET status = ? WHERE id = ? AND status = ?")
                .bind(next.as_str())
                .bind(&id.0)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await {
                Ok(_) => Err(StoreError::Conflict { kind: "ServiceReport", id: id.0.clone() }),
                Err(error) => Err(error),
            };
        }

        self.get(id).await
    }

    async fn apply_submission(
        &self,
        submission: &ReportSubmission,
    ) -> Result<(ServiceReport, ServiceRequest), StoreError> {
        let mut tx = self.pool.begin().await?;

        let report_write =
            sqlx::query("UPDATE service_report SET status = ? WHERE id = ? AND status = ?")
                .bind(ReportStatus::Submitted.as_str())
                .bind(&submission.report_id.0)
                .bind(ReportStatus::Draft.as_str())
                .execute(&mut *tx)
                .await?;
        if report_write.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::Conflict {
                kind: "ServiceReport",
                id: submission.report_id.0.clone(),
            });
        }

        let request_write = sqlx::query(
            "UPDATE service_request SET status = ?, linked_report_id = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(RequestStatus::Completed.as_str())
        .bind(&submission.report_id.0)
        .bind(&submission.request_id.0)
        .bind(RequestStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;
        if request_write.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                kind: "ServiceRequest",
                id: submission.request_id.0.clone(),
            });
        }

        tx.commit().await?;

        let report = self.get(&submission.report_id).await?;
        let sql = "SELECT id, title, customer_id, project_id, object_id, assigned_engineer_id, \
                   status, kind, priority, created_at, sla_deadline, linked_report_id, \
                   actual_start, actual_end FROM service_request WHERE id = ?";
        let row = sqlx::query(sql)
            .bind(&submission.request_id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "ServiceRequest",
                id: submission.request_id.0.clone(),
            })?;
        let request = map_request(&row)?;

        Ok((report, request))
    }
}
