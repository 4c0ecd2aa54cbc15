use async_trait::async_trait;
use thiserror::Error;

use fieldops_core::access::RecordFilter;
use fieldops_core::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use fieldops_core::domain::object::ServiceObject;
use fieldops_core::domain::report::{ReportId, ReportStatus, ServiceReport};
use fieldops_core::domain::request::{RequestId, RequestStatus, ServiceRequest};
use fieldops_core::domain::ObjectId;
use fieldops_core::workflow::ReportSubmission;

pub mod invoice;
pub mod memory;
pub mod object;
pub mod report;
pub mod request;

pub use invoice::SqlInvoiceRepository;
pub use memory::InMemoryStore;
pub use object::SqlServiceObjectRepository;
pub use report::SqlServiceReportRepository;
pub use request::SqlServiceRequestRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` was modified concurrently")]
    Conflict { kind: &'static str, id: String },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

#[async_trait]
pub trait ServiceObjectRepository: Send + Sync {
    async fn get(&self, id: &ObjectId) -> Result<ServiceObject, StoreError>;
    async fn insert(&self, object: ServiceObject) -> Result<ServiceObject, StoreError>;
}

#[async_trait]
pub trait ServiceRequestRepository: Send + Sync {
    async fn get(&self, id: &RequestId) -> Result<ServiceRequest, StoreError>;
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceRequest>, StoreError>;
    async fn insert(&self, request: ServiceRequest) -> Result<ServiceRequest, StoreError>;

    /// Conditional write: the update applies only while the persisted status
    /// still equals `expected`, otherwise `Conflict`.
    async fn update_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest, StoreError>;

    /// Requests still carrying SLA obligations, for the periodic sweep.
    async fn list_unresolved(&self) -> Result<Vec<ServiceRequest>, StoreError>;
}

#[async_trait]
pub trait ServiceReportRepository: Send + Sync {
    async fn get(&self, id: &ReportId) -> Result<ServiceReport, StoreError>;
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceReport>, StoreError>;
    async fn insert(&self, report: ServiceReport) -> Result<ServiceReport, StoreError>;

    async fn update_status(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        next: ReportStatus,
    ) -> Result<ServiceReport, StoreError>;

    /// Applies both submission writes in one transaction: the report enters
    /// Submitted and the linked request is completed with the back-link
    /// set. Either both land or neither does.
    async fn apply_submission(
        &self,
        submission: &ReportSubmission,
    ) -> Result<(ServiceReport, ServiceRequest), StoreError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn get(&self, id: &InvoiceId) -> Result<Invoice, StoreError>;
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Invoice>, StoreError>;
    async fn insert(&self, invoice: Invoice) -> Result<Invoice, StoreError>;

    async fn update_status(
        &self,
        id: &InvoiceId,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, StoreError>;
}
