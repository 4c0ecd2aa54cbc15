use serde::{Deserialize, Serialize};

use fieldops_core::domain::invoice::{CounterpartyType, Invoice};
use fieldops_core::domain::report::ServiceReport;
use fieldops_core::domain::request::ServiceRequest;
use fieldops_core::domain::{CustomerId, UserId};
use fieldops_core::identity::Role;
use fieldops_core::sla::SlaBreach;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientSelector {
    Roles(Vec<Role>),
    User(UserId),
    Customer(CustomerId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<RecipientSelector>,
    pub text: String,
}

pub fn request_created(request: &ServiceRequest) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(vec![
            Role::ProjectManager,
            Role::OfficeManager,
        ])],
        text: format!(
            "New Service Request created: {} - {}. Status: {}. Priority: {}.",
            request.id.0, request.title, request.status, request.priority
        ),
    }
}

pub fn request_status_changed(request: &ServiceRequest) -> Notification {
    let mut recipients = Vec::new();
    if let Some(engineer) = &request.assigned_engineer_id {
        recipients.push(RecipientSelector::User(engineer.clone()));
    }
    recipients.push(RecipientSelector::Customer(request.customer_id.clone()));

    Notification {
        recipients,
        text: format!(
            "Service Request {} status changed to {}. Title: {}.",
            request.id.0, request.status, request.title
        ),
    }
}

pub fn report_created(report: &ServiceReport) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(vec![
            Role::ProjectManager,
            Role::Administrator,
        ])],
        text: format!(
            "New Service Report created: {} for Service Request {}. Status: {}.",
            report.id.0, report.service_request_id.0, report.status
        ),
    }
}

pub fn report_status_changed(report: &ServiceReport) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(vec![
            Role::ProjectManager,
            Role::Administrator,
        ])],
        text: format!(
            "Service Report {} status changed to {}. For Service Request {}.",
            report.id.0, report.status, report.service_request_id.0
        ),
    }
}

pub fn invoice_created(invoice: &Invoice) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(vec![Role::Accountant, Role::Administrator])],
        text: format!(
            "New Invoice created: {} for {}. Amount: {}. Status: {}.",
            invoice.id.0, invoice.counterparty_name, invoice.amount, invoice.status
        ),
    }
}

pub fn invoice_status_changed(invoice: &Invoice) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(vec![Role::Accountant, Role::Administrator])],
        text: format!(
            "Invoice {} status changed to {}. For {}. Amount: {}.",
            invoice.id.0, invoice.status, invoice.counterparty_name, invoice.amount
        ),
    }
}

/// Extra administrator alert for subcontractor invoices; returns `None` for
/// customer-facing ones.
pub fn subcontractor_invoice_alert(invoice: &Invoice) -> Option<Notification> {
    if invoice.counterparty_type != CounterpartyType::Subcontractor {
        return None;
    }
    Some(Notification {
        recipients: vec![RecipientSelector::Roles(vec![Role::Administrator])],
        text: format!(
            "Subcontractor invoice {} created for {}. Amount: {}.",
            invoice.id.0, invoice.counterparty_name, invoice.amount
        ),
    })
}

pub fn sla_breach(breach: &SlaBreach, recipients: Vec<Role>) -> Notification {
    Notification {
        recipients: vec![RecipientSelector::Roles(recipients)],
        text: format!(
            "SLA for Service Request {} has been breached! Title: {}. Priority: {}. Due: {}.",
            breach.request_id.0, breach.title, breach.priority, breach.deadline
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use fieldops_core::domain::invoice::{CounterpartyType, Invoice, InvoiceId, InvoiceStatus};
    use fieldops_core::domain::request::{
        Priority, RequestId, RequestKind, RequestStatus, ServiceRequest,
    };
    use fieldops_core::domain::{CustomerId, ObjectId, ProjectId, UserId};
    use fieldops_core::identity::Role;
    use fieldops_core::sla::SlaBreach;

    use super::{
        request_created, request_status_changed, sla_breach, subcontractor_invoice_alert,
        RecipientSelector,
    };

    fn request() -> ServiceRequest {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        ServiceRequest {
            id: RequestId("SR-001".to_string()),
            title: "boiler inspection".to_string(),
            customer_id: CustomerId("CUST-7".to_string()),
            project_id: ProjectId("PROJ-1".to_string()),
            object_id: ObjectId("OBJ-3".to_string()),
            assigned_engineer_id: Some(UserId("eng-f".to_string())),
            status: RequestStatus::InProgress,
            kind: RequestKind::Emergency,
            priority: Priority::High,
            created_at,
            sla_deadline: created_at + Duration::hours(4),
            linked_report_id: None,
            actual_start: None,
            actual_end: None,
        }
    }

    fn invoice(counterparty_type: CounterpartyType) -> Invoice {
        Invoice {
            id: InvoiceId("INV-001".to_string()),
            project_id: ProjectId("PROJ-1".to_string()),
            counterparty_type,
            counterparty_name: "Northline Electrical".to_string(),
            customer_id: None,
            amount: Decimal::new(90_000, 2),
            status: InvoiceStatus::Draft,
            due_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn request_created_targets_managers() {
        let notification = request_created(&request());
        assert_eq!(
            notification.recipients,
            vec![RecipientSelector::Roles(vec![Role::ProjectManager, Role::OfficeManager])]
        );
        assert!(notification.text.contains("SR-001"));
        assert!(notification.text.contains("boiler inspection"));
        assert!(notification.text.contains("Priority: High"));
    }

    #[test]
    fn status_change_targets_engineer_and_customer() {
        let notification = request_status_changed(&request());
        assert_eq!(
            notification.recipients,
            vec![
                RecipientSelector::User(UserId("eng-f".to_string())),
                RecipientSelector::Customer(CustomerId("CUST-7".to_string())),
            ]
        );
    }

    #[test]
    fn status_change_without_engineer_still_reaches_customer() {
        let mut request = request();
        request.assigned_engineer_id = None;
        let notification = request_status_changed(&request);
        assert_eq!(
            notification.recipients,
            vec![RecipientSelector::Customer(CustomerId("CUST-7".to_string()))]
        );
    }

    #[test]
    fn subcontractor_alert_only_fires_for_subcontractors() {
        assert!(subcontractor_invoice_alert(&invoice(CounterpartyType::Customer)).is_none());

        let alert = subcontractor_invoice_alert(&invoice(CounterpartyType::Subcontractor))
            .expect("subcontractor alert");
        assert_eq!(alert.recipients, vec![RecipientSelector::Roles(vec![Role::Administrator])]);
        assert!(alert.text.contains("Northline Electrical"));
    }

    #[test]
    fn breach_message_carries_request_details() {
        let deadline = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
        let breach = SlaBreach {
            request_id: RequestId("SR-001".to_string()),
            title: "boiler inspection".to_string(),
            priority: Priority::High,
            deadline,
            observed_at: deadline + Duration::days(1),
        };

        let notification = sla_breach(&breach, vec![Role::Administrator, Role::DepartmentHead]);
        assert!(notification.text.contains("has been breached"));
        assert!(notification.text.contains("SR-001"));
        assert_eq!(
            notification.recipients,
            vec![RecipientSelector::Roles(vec![Role::Administrator, Role::DepartmentHead])]
        );
    }
}
