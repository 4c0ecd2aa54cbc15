use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::report::{ReportId, ReportStatus, ServiceReport};
use crate::domain::request::{RequestId, RequestStatus, ServiceRequest};
use crate::identity::Principal;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal transition from {from} to {to}: {reason}")]
    Illegal { from: String, to: String, reason: String },
    #[error("transition from {from} to {to} requires a manager-level role")]
    RequiresManagerRole { from: String, to: String },
}

impl TransitionError {
    fn illegal(
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::Illegal { from: from.to_string(), to: to.to_string(), reason: reason.into() }
    }
}

/// Validates a request status change against the *persisted* status. The
/// caller re-reads the entity before every attempt; a stale read is caught
/// by the store's conditional write.
pub fn validate_request_transition(
    request: &ServiceRequest,
    target: RequestStatus,
    actor: &Principal,
) -> Result<(), TransitionError> {
    use RequestStatus::{Cancelled, Closed, Completed, InProgress, Open};

    match (request.status, target) {
        (Open, InProgress) => {
            if request.assigned_engineer_id.is_none() {
                return Err(TransitionError::illegal(Open, InProgress, "missing assignee"));
            }
            Ok(())
        }
        (InProgress, Completed) => {
            if request.linked_report_id.is_none() {
                return Err(TransitionError::illegal(InProgress, Completed, "missing report"));
            }
            Ok(())
        }
        (Completed, Closed) => {
            if !actor.has_manager_role() {
                return Err(TransitionError::RequiresManagerRole {
                    from: Completed.to_string(),
                    to: Closed.to_string(),
                });
            }
            Ok(())
        }
        (Open, Cancelled) | (InProgress, Cancelled) => Ok(()),
        (from, to) => Err(TransitionError::illegal(from, to, "no such transition")),
    }
}

/// Report edges. Approval and archival are manager-only; amendment reopens
/// a submitted report for editing.
pub fn validate_report_transition(
    current: ReportStatus,
    target: ReportStatus,
    actor: &Principal,
) -> Result<(), TransitionError> {
    use ReportStatus::{Approved, Archived, Cancelled, Draft, Submitted};

    match (current, target) {
        (Draft, Submitted) | (Submitted, Draft) => Ok(()),
        (Submitted, Approved) | (Approved, Archived) => {
            if !actor.has_manager_role() {
                return Err(TransitionError::RequiresManagerRole {
                    from: current.to_string(),
                    to: target.to_string(),
                });
            }
            Ok(())
        }
        (Draft, Cancelled) | (Submitted, Cancelled) => Ok(()),
        (from, to) => Err(TransitionError::illegal(from, to, "no such transition")),
    }
}

pub fn validate_invoice_transition(
    invoice: &Invoice,
    target: InvoiceStatus,
) -> Result<(), TransitionError> {
    use InvoiceStatus::{Cancelled, Draft, Overdue, Paid, Sent};

    match (invoice.status, target) {
        (Draft, Sent) => {
            if invoice.due_date.is_none() {
                return Err(TransitionError::illegal(Draft, Sent, "missing due date"));
            }
            Ok(())
        }
        (Sent, Paid) | (Overdue, Paid) => {
            if invoice.amount <= Decimal::ZERO {
                return Err(TransitionError::illegal(
                    invoice.status,
                    Paid,
                    "non-positive amount",
                ));
            }
            Ok(())
        }
        (Sent, Overdue) => Ok(()),
        (Draft, Cancelled) | (Sent, Cancelled) => Ok(()),
        (from, to) => Err(TransitionError::illegal(from, to, "no such transition")),
    }
}

/// The two writes produced by submitting a report: the report enters
/// Submitted and its request is completed with the back-link set. The store
/// applies both in one transaction or neither.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSubmission {
    pub report_id: ReportId,
    pub request_id: RequestId,
}

pub fn plan_report_submission(
    report: &ServiceReport,
    request: &ServiceRequest,
    actor: &Principal,
) -> Result<ReportSubmission, TransitionError> {
    if report.service_request_id != request.id {
        return Err(TransitionError::illegal(
            report.status,
            ReportStatus::Submitted,
            "report is not linked to this request",
        ));
    }

    validate_report_transition(report.status, ReportStatus::Submitted, actor)?;

    if request.status != RequestStatus::InProgress {
        return Err(TransitionError::illegal(
            request.status,
            RequestStatus::Completed,
            "linked request is not in progress",
        ));
    }

    Ok(ReportSubmission { report_id: report.id.clone(), request_id: request.id.clone() })
}
