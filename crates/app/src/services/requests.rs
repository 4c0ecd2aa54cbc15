use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fieldops_core::access::{Action, PolicyEngine, RecordScope, ResourceKind};
use fieldops_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use fieldops_core::domain::request::{
    Priority, RequestId, RequestKind, RequestStatus, ServiceRequest,
};
use fieldops_core::domain::{ObjectId, UserId};
use fieldops_core::identity::{Principal, Role};
use fieldops_core::sla::{check_breach, Clock, SlaPolicy};
use fieldops_core::workflow::validate_request_transition;
use fieldops_dispatch::{
    request_created, request_status_changed, sla_breach, NotificationDispatcher,
};
use fieldops_store::{ServiceObjectRepository, ServiceRequestRepository, StoreError};

use super::{actor_label, new_correlation_id, principal_or_bail, MAX_WRITE_ATTEMPTS};
use crate::errors::ServiceError;

#[derive(Clone, Debug)]
pub struct NewServiceRequest {
    pub title: String,
    pub object_id: ObjectId,
    pub kind: RequestKind,
    pub priority: Priority,
    pub assigned_engineer_id: Option<UserId>,
}

pub struct RequestService {
    requests: Arc<dyn ServiceRequestRepository>,
    objects: Arc<dyn ServiceObjectRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    policy: PolicyEngine,
    sla: SlaPolicy,
    breach_roles: Vec<Role>,
}

impl RequestService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn ServiceRequestRepository>,
        objects: Arc<dyn ServiceObjectRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        sla: SlaPolicy,
        breach_roles: Vec<Role>,
    ) -> Self {
        Self {
            requests,
            objects,
            dispatcher,
            audit,
            clock,
            policy: PolicyEngine::new(),
            sla,
            breach_roles,
        }
    }

    pub async fn list(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<ServiceRequest>, ServiceError> {
        let filter = self.policy.scope_filter(principal, ResourceKind::ServiceRequest)?;
        Ok(self.requests.list(&filter).await?)
    }

    pub async fn get(
        &self,
        principal: Option<&Principal>,
        id: &RequestId,
    ) -> Result<ServiceRequest, ServiceError> {
        let request = self.requests.get(id).await?;
        self.policy.authorize_record(
            principal,
            ResourceKind::ServiceRequest,
            Action::Read,
            &RecordScope::of_request(&request),
        )?;
        Ok(request)
    }

    /// Creates an Open request. Customer and project are derived from the
    /// service object, and the SLA deadline from kind and priority.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        new: NewServiceRequest,
    ) -> Result<ServiceRequest, ServiceError> {
        self.policy.authorize(principal, ResourceKind::ServiceRequest, Action::Create)?;

        let object = self.objects.get(&new.object_id).await?;
        let created_at = self.clock.now();
        let request = ServiceRequest {
            id: RequestId(format!("SR-{}", Uuid::new_v4())),
            title: new.title,
            customer_id: object.customer_id,
            project_id: object.project_id,
            object_id: new.object_id,
            assigned_engineer_id: new.assigned_engineer_id,
            status: RequestStatus::Open,
            kind: new.kind,
            priority: new.priority,
            created_at,
            sla_deadline: self.sla.deadline(new.kind, new.priority, created_at),
            linked_report_id: None,
            actual_start: None,
            actual_end: None,
        };

        let saved = self.requests.insert(request).await?;

        let context = AuditContext::new(
            Some(ResourceKind::ServiceRequest),
            Some(saved.id.0.clone()),
            new_correlation_id(),
            actor_label(principal),
        );
        self.audit.emit(
            AuditEvent::new(
                &context,
                "request.created",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("priority", saved.priority.as_str())
            .with_metadata("sla_deadline", saved.sla_deadline.to_rfc3339()),
        );
        info!(request_id = %saved.id.0, priority = %saved.priority, "service request created");

        self.dispatcher.enqueue(request_created(&saved));
        Ok(saved)
    }

    /// Validates against the persisted status and applies the change with a
    /// conditional write; a lost race re-reads and re-validates.
    pub async fn update_status(
        &self,
        principal: Option<&Principal>,
        id: &RequestId,
        target: RequestStatus,
    ) -> Result<ServiceRequest, ServiceError> {
        let mut attempt = 0;
        loop {
            let request = self.requests.get(id).await?;
            let context = AuditContext::new(
                Some(ResourceKind::ServiceRequest),
                Some(id.0.clone()),
                new_correlation_id(),
                actor_label(principal),
            );

            if let Err(error) = self.policy.authorize_record(
                principal,
                ResourceKind::ServiceRequest,
                Action::UpdateStatus,
                &RecordScope::of_request(&request),
            ) {
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "access.denied",
                        AuditCategory::Access,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(error.into());
            }

            if let Err(error) = validate_request_transition(&request, target, principal_or_bail(principal)?) {
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

            match self.requests.update_status(id, request.status, target).await {
                Ok(updated) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "workflow.transition_applied",
                            AuditCategory::Workflow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", request.status.as_str())
                        .with_metadata("to", updated.status.as_str()),
                    );
                    info!(
                        request_id = %updated.id.0,
                        from = %request.status,
                        to = %updated.status,
                        "service request transition applied"
                    );

                    // Breach state is evaluated on every observed mutation.
                    if let Some(breach) = check_breach(&updated, self.clock.now()) {
                        self.audit.emit(
                            AuditEvent::new(
                                &context,
                                "sla.breach_observed",
                                AuditCategory::Sla,
                                AuditOutcome::Failed,
                            )
                            .with_metadata("deadline", breach.deadline.to_rfc3339()),
                        );
                        self.dispatcher
                            .enqueue(sla_breach(&breach, self.breach_roles.clone()));
                    }

                    self.dispatcher.enqueue(request_status_changed(&updated));
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
