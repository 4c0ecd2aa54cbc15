use sqlx::Row;

use fieldops_core::domain::object::ServiceObject;
use fieldops_core::domain::{CustomerId, ObjectId, ProjectId};

use super::{ServiceObjectRepository, StoreError};
use crate::DbPool;

pub struct SqlServiceObjectRepository {
    pool: DbPool,
}

impl SqlServiceObjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ServiceObjectRepository for SqlServiceObjectRepository {
    async fn get(&self, id: &ObjectId) -> Result<ServiceObject, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, customer_id, project_id FROM service_object WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;
        let row =
            row.ok_or_else(|| StoreError::NotFound { kind: "ServiceObject", id: id.0.clone() })?;

        Ok(ServiceObject {
            id: ObjectId(row.try_get("id")?),
            name: row.try_get("name")?,
            customer_id: CustomerId(row.try_get("customer_id")?),
            project_id: ProjectId(row.try_get("project_id")?),
        })
    }

    async fn insert(&self, object: ServiceObject) -> Result<ServiceObject, StoreError> {
        sqlx::query(
            "INSERT INTO service_object (id, name, customer_id, project_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&object.id.0)
        .bind(&object.name)
        .bind(&object.customer_id.0)
        .bind(&object.project_id.0)
        .execute(&self.pool)
        .await?;

        Ok(object)
    }
}
