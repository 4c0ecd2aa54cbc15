use sqlx::Row;

use fieldops_core::access::RecordFilter;
use fieldops_core::domain::report::ReportId;
use fieldops_core::domain::request::{
    Priority, RequestId, RequestKind, RequestStatus, ServiceRequest,
};
use fieldops_core::domain::{CustomerId, ObjectId, ProjectId, UserId};

use super::{ServiceRequestRepository, StoreError};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, title, customer_id, project_id, object_id, \
     assigned_engineer_id, status, kind, priority, created_at, sla_deadline, \
     linked_report_id, actual_start, actual_end";

pub struct SqlServiceRequestRepository {
    pool: DbPool,
}

impl SqlServiceRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_request(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceRequest, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = RequestStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown request status `{status_raw}`")))?;
    let kind_raw: String = row.try_get("kind")?;
    let kind = RequestKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown request kind `{kind_raw}`")))?;
    let priority_raw: String = row.try_get("priority")?;
    let priority = Priority::parse(&priority_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown priority `{priority_raw}`")))?;

    Ok(ServiceRequest {
        id: RequestId(row.try_get("id")?),
        title: row.try_get("title")?,
        customer_id: CustomerId(row.try_get("customer_id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        object_id: ObjectId(row.try_get("object_id")?),
        assigned_engineer_id: row
            .try_get::<Option<String>, _>("assigned_engineer_id")?
            .map(UserId),
        status,
        kind,
        priority,
        created_at: row.try_get("created_at")?,
        sla_deadline: row.try_get("sla_deadline")?,
        linked_report_id: row.try_get::<Option<String>, _>("linked_report_id")?.map(ReportId),
        actual_start: row.try_get("actual_start")?,
        actual_end: row.try_get("actual_end")?,
    })
}

#[async_trait::async_trait]
impl ServiceRequestRepository for SqlServiceRequestRepository {
    async fn get(&self, id: &RequestId) -> Result<ServiceRequest, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM service_request WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        let row = row
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceRequest", id: id.0.clone() })?;
        map_request(&row)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceRequest>, StoreError> {
        let rows = match filter {
            RecordFilter::Nothing => return Ok(Vec::new()),
            RecordFilter::All => {
                let sql = format!("SELECT {REQUEST_COLUMNS} FROM service_request ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            RecordFilter::Projects(project_ids) => {
                let placeholders =
                    vec!["?"; project_ids.len()].join(", ");
                let sql = format!(
                    "SELECT {REQUEST_COLUMNS} FROM service_request \
                     WHERE project_id IN ({placeholders}) ORDER BY id"
                );
                let mut query = sqlx::query(&sql);
                for project_id in project_ids {
                    query = query.bind(&project_id.0);
                }
                query.fetch_all(&self.pool).await?
            }
            RecordFilter::AssignedEngineer(user_id) => {
                let sql = format!(
                    "SELECT {REQUEST_COLUMNS} FROM service_request \
                     WHERE assigned_engineer_id = ? ORDER BY id"
                );
                sqlx::query(&sql).bind(&user_id.0).fetch_all(&self.pool).await?
            }
            RecordFilter::Customer(customer_id) => {
                let sql = format!(
                    "SELECT {REQUEST_COLUMNS} FROM service_request \
                     WHERE customer_id = ? ORDER BY id"
                );
                sqlx::query(&sql).bind(&customer_id.0).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(map_request).collect()
    }

    async fn insert(&self, request: ServiceRequest) -> Result<ServiceRequest, StoreError> {
        sqlx::query(
            "INSERT INTO service_request \
             (id, title, customer_id, project_id, object_id, assigned_engineer_id, status, \
              kind, priority, created_at, sla_deadline, linked_report_id, actual_start, actual_end) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.title)
        .bind(&request.customer_id.0)
        .bind(&request.project_id.0)
        .bind(&request.object_id.0)
        .bind(request.assigned_engineer_id.as_ref().map(|id| id.0.clone()))
        .bind(request.status.as_str())
        .bind(request.kind.as_str())
        .bind(request.priority.as_str())
        .bind(request.created_at)
        .bind(request.sla_deadline)
        .bind(request.linked_report_id.as_ref().map(|id| id.0.clone()))
        .bind(request.actual_start)
        .bind(request.actual_end)
        .execute(&self.pool)
        .await?;

        Ok(request)
    }

    async fn update_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest, StoreError> {
        let result =
            sqlx::query("UPDATE service_request SET status = ? WHERE id = ? AND status = ?")
                .bind(next.as_str())
                .bind(&id.0)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            // Distinguish a vanished record from a lost conditional write.
            return match self.get(id).await {
                Ok(_) => Err(StoreError::Conflict { kind: "ServiceRequest", id: id.0.clone() }),
                Err(error) => Err(error),
            };
        }

        self.get(id).await
    }

    async fn list_unresolved(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM service_request \
             WHERE status NOT IN ('Completed', 'Closed') ORDER BY id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(map_request).collect()
    }
}
