use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fieldops_core::access::{Action, PolicyEngine, RecordScope, ResourceKind};
use fieldops_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use fieldops_core::domain::report::{ReportId, ReportStatus, ServiceReport, WorkItem};
use fieldops_core::domain::request::RequestId;
use fieldops_core::identity::Principal;
use fieldops_core::sla::Clock;
use fieldops_core::workflow::{plan_report_submission, validate_report_transition};
use fieldops_dispatch::{
    report_created, report_status_changed, request_status_changed, NotificationDispatcher,
};
use fieldops_store::{ServiceReportRepository, ServiceRequestRepository, StoreError};

use super::{actor_label, new_correlation_id, principal_or_bail, MAX_WRITE_ATTEMPTS};
use crate::errors::ServiceError;

#[derive(Clone, Debug)]
pub struct NewServiceReport {
    pub service_request_id: RequestId,
    pub work_items: Vec<WorkItem>,
}

pub struct ReportService {
    reports: Arc<dyn ServiceReportRepository>,
    requests: Arc<dyn ServiceRequestRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    policy: PolicyEngine,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ServiceReportRepository>,
        requests: Arc<dyn ServiceRequestRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { reports, requests, dispatcher, audit, clock, policy: PolicyEngine::new() }
    }

    pub async fn list(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<ServiceReport>, ServiceError> {
        let filter = self.policy.scope_filter(principal, ResourceKind::ServiceReport)?;
        Ok(self.reports.list(&filter).await?)
    }

    pub async fn get(
        &self,
        principal: Option<&Principal>,
        id: &ReportId,
    ) -> Result<ServiceReport, ServiceError> {
        let report = self.reports.get(id).await?;
        self.policy.authorize_record(
            principal,
            ResourceKind::ServiceReport,
            Action::Read,
            &RecordScope::of_report(&report),
        )?;
        Ok(report)
    }

    /// Creates a Draft report against an existing request. Work-item and
    /// report totals are re-derived before the save, never trusted.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        new: NewServiceReport,
    ) -> Result<ServiceReport, ServiceError> {
        self.policy.authorize(principal, ResourceKind::ServiceReport, Action::Create)?;

        // The linked request must exist before a report is drafted for it.
        let request = self.requests.get(&new.service_request_id).await?;

        let mut report = ServiceReport {
            id: ReportId(format!("SRV-REP-{}", Uuid::new_v4())),
            service_request_id: request.id,
            status: ReportStatus::Draft,
            work_items: new.work_items,
            total_amount: rust_decimal::Decimal::ZERO,
            created_at: self.clock.now(),
        };
        report.recompute_totals();

        let saved = self.reports.insert(report).await?;

        let context = AuditContext::new(
            Some(ResourceKind::ServiceReport),
            Some(saved.id.0.clone()),
            new_correlation_id(),
            actor_label(principal),
        );
        self.audit.emit(
            AuditEvent::new(
                &context,
                "report.created",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("service_request_id", saved.service_request_id.0.clone())
            .with_metadata("total_amount", saved.total_amount.to_string()),
        );
        info!(report_id = %saved.id.0, total = %saved.total_amount, "service report created");

        self.dispatcher.enqueue(report_created(&saved));
        Ok(saved)
    }

    /// Submits a Draft report: one transactional command producing two
    /// writes (report Submitted, request Completed + back-link).
    pub async fn submit(
        &self,
        principal: Option<&Principal>,
        id: &ReportId,
    ) -> Result<ServiceReport, ServiceError> {
        let actor = principal_or_bail(principal)?;
        self.policy.authorize(principal, ResourceKind::ServiceReport, Action::UpdateStatus)?;

        let mut attempt = 0;
        loop {
            let report = self.reports.get(id).await?;
            let request = self.requests.get(&report.service_request_id).await?;
            let context = AuditContext::new(
                Some(ResourceKind::ServiceReport),
                Some(id.0.clone()),
                new_correlation_id(),
                actor_label(principal),
            );

            let plan = match plan_report_submission(&report, &request, actor) {
                Ok(plan) => plan,
                Err(error) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "workflow.transition_rejected",
                            AuditCategory::Workflow,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                    );
                    return Err(error.into());
                }
            };

            match self.reports.apply_submission(&plan).await {
                Ok((submitted, completed)) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "report.submitted",
                            AuditCategory::Workflow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("service_request_id", completed.id.0.clone()),
                    );
                    info!(
                        report_id = %submitted.id.0,
                        request_id = %completed.id.0,
                        "report submitted and request completed"
                    );

                    self.dispatcher.enqueue(report_status_changed(&submitted));
                    self.dispatcher.enqueue(request_status_changed(&completed));
                    return Ok(submitted);
                }
                Err(StoreError::Conflict { .. }) if attempt + 1 < MAX_WRITE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Approval, amendment, archival, and cancellation. Submission has its
    /// own command because of its cross-entity write.
    pub async fn update_status(
        &self,
        principal: Option<&Principal>,
        id: &ReportId,
        target: ReportStatus,
    ) -> Result<ServiceReport, ServiceError> {
        let actor = principal_or_bail(principal)?;
        self.policy.authorize(principal, ResourceKind::ServiceReport, Action::UpdateStatus)?;

        let mut attempt = 0;
        loop {
            let report = self.reports.get(id).await?;
            let context = AuditContext::new(
                Some(ResourceKind::ServiceReport),
                Some(id.0.clone()),
                new_correlation_id(),
                actor_label(principal),
            );

            let validation = if target == ReportStatus::Submitted {
                Err(fieldops_core::workflow::TransitionError::Illegal {
                    from: report.status.to_string(),
                    to: target.to_string(),
                    reason: "reports are submitted through the submission command".to_string(),
                })
            } else {
                validate_report_transition(report.status, target, actor)
            };
            if let Err(error) = validation {
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "workflow.transition_rejected",
                        AuditCategory::Workflow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(error.into());
            }

            match self.reports.update_status(id, report.status, target).await {
                Ok(updated) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "workflow.transition_applied",
                            AuditCategory::Workflow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", report.status.as_str())
                        .with_metadata("to", updated.status.as_str()),
                    );
                    info!(
                        report_id = %updated.id.0,
                        from = %report.status,
                        to = %updated.status,
                        "service report transition applied"
                    );

                    self.dispatcher.enqueue(report_status_changed(&updated));
                    return Ok(updated);
                }
                Err(StoreError::Conflict { .. }) if attempt + 1 < MAX_WRITE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
