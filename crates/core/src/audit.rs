use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::ResourceKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Access,
    Workflow,
    Sla,
    Persistence,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub subject_kind: Option<ResourceKind>,
    pub subject_id: Option<String>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        subject_kind: Option<ResourceKind>,
        subject_id: Option<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            subject_kind,
            subject_id,
            correlation_id: correlation_id.into(),
            actor: actor.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub subject_kind: Option<ResourceKind>,
    pub subject_id: Option<String>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        context: &AuditContext,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            subject_kind: context.subject_kind,
            subject_id: context.subject_id.clone(),
            correlation_id: context.correlation_id.clone(),
            event_type: event_type.into(),
            category,
            actor: context.actor.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::access::ResourceKind;

    use super::{
        AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    };

    #[test]
    fn in_memory_sink_records_events_with_subject_fields() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(
            Some(ResourceKind::ServiceRequest),
            Some("SR-042".to_string()),
            "req-123",
            "u-admin",
        );

        sink.emit(
            AuditEvent::new(
                &context,
                "workflow.transition_applied",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("from", "Open")
            .with_metadata("to", "In Progress"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].subject_id.as_deref(), Some("SR-042"));
        assert_eq!(events[0].subject_kind, Some(ResourceKind::ServiceRequest));
        assert!(events[0].metadata.contains_key("from"));
    }

    #[test]
    fn rejected_outcomes_keep_their_reason_metadata() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(None, None, "req-9", "policy-engine");

        sink.emit(
            AuditEvent::new(&context, "access.denied", AuditCategory::Access, AuditOutcome::Rejected)
                .with_metadata("error", "not authorized to update-status Invoice"),
        );

        let events = sink.events();
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
        assert_eq!(
            events[0].metadata.get("error").map(String::as_str),
            Some("not authorized to update-status Invoice")
        );
    }
}
