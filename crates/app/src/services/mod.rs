use fieldops_core::identity::Principal;
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod invoices;
pub mod reports;
pub mod requests;

pub use invoices::{InvoiceService, NewInvoice};
pub use reports::{NewServiceReport, ReportService};
pub use requests::{NewServiceRequest, RequestService};

/// Bounded retries for the conditional-write loop around each transition.
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 3;

pub(crate) fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn actor_label(principal: Option<&Principal>) -> String {
    principal.map_or_else(|| "anonymous".to_string(), |principal| principal.id.0.clone())
}

pub(crate) fn principal_or_bail(principal: Option<&Principal>) -> Result<&Principal, ServiceError> {
    principal.ok_or(ServiceError::Unauthenticated)
}
