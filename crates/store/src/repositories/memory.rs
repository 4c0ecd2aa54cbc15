use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use fieldops_core::access::{RecordFilter, RecordScope};
use fieldops_core::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use fieldops_core::domain::object::ServiceObject;
use fieldops_core::domain::report::{ReportId, ReportStatus, ServiceReport};
use fieldops_core::domain::request::{RequestId, RequestStatus, ServiceRequest};
use fieldops_core::domain::ObjectId;
use fieldops_core::workflow::ReportSubmission;

use super::{
    InvoiceRepository, ServiceObjectRepository, ServiceReportRepository,
    ServiceRequestRepository, StoreError,
};

#[derive(Default)]
struct Inner {
    objects: HashMap<String, ServiceObject>,
    requests: HashMap<String, ServiceRequest>,
    reports: HashMap<String, ServiceReport>,
    invoices: HashMap<String, Invoice>,
}

/// All four collections behind one lock, so the report-submission command
/// can apply its two writes atomically the same way the SQL transaction
/// does.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceObjectRepository for InMemoryStore {
    async fn get(&self, id: &ObjectId) -> Result<ServiceObject, StoreError> {
        let inner = self.inner.read().await;
        inner
            .objects
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceObject", id: id.0.clone() })
    }

    async fn insert(&self, object: ServiceObject) -> Result<ServiceObject, StoreError> {
        let mut inner = self.inner.write().await;
        inner.objects.insert(object.id.0.clone(), object.clone());
        Ok(object)
    }
}

#[async_trait]
impl ServiceRequestRepository for InMemoryStore {
    async fn get(&self, id: &RequestId) -> Result<ServiceRequest, StoreError> {
        let inner = self.inner.read().await;
        inner
            .requests
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceRequest", id: id.0.clone() })
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceRequest>, StoreError> {
        let inner = self.inner.read().await;
        let mut requests: Vec<ServiceRequest> = inner
            .requests
            .values()
            .filter(|request| filter.permits(&RecordScope::of_request(request)))
            .cloned()
            .collect();
        requests.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(requests)
    }

    async fn insert(&self, request: ServiceRequest) -> Result<ServiceRequest, StoreError> {
        let mut inner = self.inner.write().await;
        inner.requests.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    async fn update_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest, StoreError> {
        let mut inner = self.inner.write().await;
        let request = inner
            .requests
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceRequest", id: id.0.clone() })?;
        if request.status != expected {
            return Err(StoreError::Conflict { kind: "ServiceRequest", id: id.0.clone() });
        }
        request.status = next;
        Ok(request.clone())
    }

    async fn list_unresolved(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        let inner = self.inner.read().await;
        let mut requests: Vec<ServiceRequest> = inner
            .requests
            .values()
            .filter(|request| !request.status.is_resolved())
            .cloned()
            .collect();
        requests.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(requests)
    }
}

#[async_trait]
impl ServiceReportRepository for InMemoryStore {
    async fn get(&self, id: &ReportId) -> Result<ServiceReport, StoreError> {
        let inner = self.inner.read().await;
        inner
            .reports
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceReport", id: id.0.clone() })
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ServiceReport>, StoreError> {
        let inner = self.inner.read().await;
        let mut reports: Vec<ServiceReport> = inner
            .reports
            .values()
            .filter(|report| filter.permits(&RecordScope::of_report(report)))
            .cloned()
            .collect();
        reports.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(reports)
    }

    async fn insert(&self, report: ServiceReport) -> Result<ServiceReport, StoreError> {
        let mut inner = self.inner.write().await;
        inner.reports.insert(report.id.0.clone(), report.clone());
        Ok(report)
    }

    async fn update_status(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        next: ReportStatus,
    ) -> Result<ServiceReport, StoreError> {
        let mut inner = self.inner.write().await;
        let report = inner
            .reports
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound { kind: "ServiceReport", id: id.0.clone() })?;
        if report.status != expected {
            return Err(StoreError::Conflict { kind: "ServiceReport", id: id.0.clone() });
        }
        report.status = next;
        Ok(report.clone())
    }

    async fn apply_submission(
        &self,
        submission: &ReportSubmission,
    ) -> Result<(ServiceReport, ServiceRequest), StoreError> {
        let mut inner = self.inner.write().await;

        // Validate both sides before touching either, so a failure on the
        // request leaves the report untouched.
        let report = inner.reports.get(&submission.report_id.0).ok_or_else(|| {
            StoreError::NotFound { kind: "ServiceReport", id: submission.report_id.0.clone() }
        })?;
        if report.status != ReportStatus::Draft {
            return Err(StoreError::Conflict {
                kind: "ServiceReport",
                id: submission.report_id.0.clone(),
            });
        }
        let request = inner.requests.get(&submission.request_id.0).ok_or_else(|| {
            StoreError::NotFound { kind: "ServiceRequest", id: submission.request_id.0.clone() }
        })?;
        if request.status != RequestStatus::InProgress {
            return Err(StoreError::Conflict {
                kind: "ServiceRequest",
                id: submission.request_id.0.clone(),
            });
        }

        let report = {
            let report = inner.reports.get_mut(&submission.report_id.0).ok_or_else(|| {
                StoreError::NotFound { kind: "ServiceReport", id: submission.report_id.0.clone() }
            })?;
            report.status = ReportStatus::Submitted;
            report.clone()
        };
        let request = {
            let request = inner.requests.get_mut(&submission.request_id.0).ok_or_else(|| {
                StoreError::NotFound { kind: "ServiceRequest", id: submission.request_id.0.clone() }
            })?;
            request.status = RequestStatus::Completed;
            request.linked_report_id = Some(submission.report_id.clone());
            request.clone()
        };

        Ok((report, request))
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn get(&self, id: &InvoiceId) -> Result<Invoice, StoreError> {
        let inner = self.inner.read().await;
        inner
            .invoices
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { kind: "Invoice", id: id.0.clone() })
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Invoice>, StoreError> {
        let inner = self.inner.read().await;
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|invoice| filter.permits(&RecordScope::of_invoice(invoice)))
            .cloned()
            .collect();
        invoices.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(invoices)
    }

    async fn insert(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let mut inner = self.inner.write().await;
        inner.invoices.insert(invoice.id.0.clone(), invoice.clone());
        Ok(invoice)
    }

    async fn update_status(
        &self,
        id: &InvoiceId,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, StoreError> {
        let mut inner = self.inner.write().await;
        let invoice = inner
            .invoices
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound { kind: "Invoice", id: id.0.clone() })?;
        if invoice.status != expected {
            return Err(StoreError::Conflict { kind: "Invoice", id: id.0.clone() });
        }
        invoice.status = next;
        Ok(invoice.clone())
    }
}
