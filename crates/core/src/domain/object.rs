use serde::{Deserialize, Serialize};

use crate::domain::{CustomerId, ObjectId, ProjectId};

/// Scoping-chain link: a serviced installation belongs to a project, which
/// belongs to a customer. New requests inherit both ids from their object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObject {
    pub id: ObjectId,
    pub name: String,
    pub customer_id: CustomerId,
    pub project_id: ProjectId,
}
