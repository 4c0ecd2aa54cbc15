use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use fieldops_core::access::{Action, PolicyEngine, RecordScope, ResourceKind};
use fieldops_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use fieldops_core::domain::invoice::{
    CounterpartyType, Invoice, InvoiceId, InvoiceStatus,
};
use fieldops_core::domain::{CustomerId, ProjectId};
use fieldops_core::identity::Principal;
use fieldops_core::sla::Clock;
use fieldops_core::workflow::validate_invoice_transition;
use fieldops_dispatch::{
    invoice_created, invoice_status_changed, subcontractor_invoice_alert, NotificationDispatcher,
};
use fieldops_store::{InvoiceRepository, StoreError};

use super::{actor_label, new_correlation_id, MAX_WRITE_ATTEMPTS};
use crate::errors::ServiceError;

#[derive(Clone, Debug)]
pub struct NewInvoice {
    pub project_id: ProjectId,
    pub counterparty_type: CounterpartyType,
    pub counterparty_name: String,
    pub customer_id: Option<CustomerId>,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    policy: PolicyEngine,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { invoices, dispatcher, audit, clock, policy: PolicyEngine::new() }
    }

    pub async fn list(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<Invoice>, ServiceError> {
        let filter = self.policy.scope_filter(principal, ResourceKind::Invoice)?;
        Ok(self.invoices.list(&filter).await?)
    }

    pub async fn get(
        &self,
        principal: Option<&Principal>,
        id: &InvoiceId,
    ) -> Result<Invoice, ServiceError> {
        let invoice = self.invoices.get(id).await?;
        self.policy.authorize_record(
            principal,
            ResourceKind::Invoice,
            Action::Read,
            &RecordScope::of_invoice(&invoice),
        )?;
        Ok(invoice)
    }

    pub async fn create(
        &self,
        principal: Option<&Principal>,
        new: NewInvoice,
    ) -> Result<Invoice, ServiceError> {
        self.policy.authorize(principal, ResourceKind::Invoice, Action::Create)?;

        let invoice = Invoice {
            id: InvoiceId(format!("INV-{}", Uuid::new_v4())),
            project_id: new.project_id,
            counterparty_type: new.counterparty_type,
            counterparty_name: new.counterparty_name,
            customer_id: new.customer_id,
            amount: new.amount,
            status: InvoiceStatus::Draft,
            due_date: new.due_date,
            created_at: self.clock.now(),
        };

        let saved = self.invoices.insert(invoice).await?;

        let context = AuditContext::new(
            Some(ResourceKind::Invoice),
            Some(saved.id.0.clone()),
            new_correlation_id(),
            actor_label(principal),
        );
        self.audit.emit(
            AuditEvent::new(
                &context,
                "invoice.created",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("amount", saved.amount.to_string())
            .with_metadata("counterparty_type", saved.counterparty_type.as_str()),
        );
        info!(invoice_id = %saved.id.0, amount = %saved.amount, "invoice created");

        self.dispatcher.enqueue(invoice_created(&saved));
        if let Some(alert) = subcontractor_invoice_alert(&saved) {
            self.dispatcher.enqueue(alert);
        }
        Ok(saved)
    }

    pub async fn update_status(
        &self,
        principal: Option<&Principal>,
        id: &InvoiceId,
        target: InvoiceStatus,
    ) -> Result<Invoice, ServiceError> {
        self.policy.authorize(principal, ResourceKind::Invoice, Action::UpdateStatus)?;

        let mut attempt = 0;
        loop {
            let invoice = self.invoices.get(id).await?;
            let context = AuditContext::new(
                Some(ResourceKind::Invoice),
                Some(id.0.clone()),
                new_correlation_id(),
                actor_label(principal),
            );

            if let Err(error) = validate_invoice_transition(&invoice, target) {
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

            match self.invoices.update_status(id, invoice.status, target).await {
                Ok(updated) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "workflow.transition_applied",
                            AuditCategory::Workflow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", invoice.status.as_str())
                        .with_metadata("to", updated.status.as_str()),
                    );
                    info!(
                        invoice_id = %updated.id.0,
                        from = %invoice.status,
                        to = %updated.status,
                        "invoice transition applied"
                    );

                    self.dispatcher.enqueue(invoice_status_changed(&updated));
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
