pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod identity;
pub mod sla;
pub mod workflow;

pub use access::{
    AccessError, Action, PolicyEngine, RecordFilter, RecordScope, ResourceKind,
};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::invoice::{CounterpartyType, Invoice, InvoiceId, InvoiceStatus};
pub use domain::object::ServiceObject;
pub use domain::report::{ReportId, ReportStatus, ServiceReport, WorkItem};
pub use domain::request::{
    Priority, RequestId, RequestKind, RequestStatus, ServiceRequest,
};
pub use domain::{CustomerId, ObjectId, ProjectId, UserId};
pub use identity::{
    AuthError, CredentialVerifier, IdentityDirectory, IdentityRecord, IdentityResolver,
    InMemoryIdentityDirectory, Principal, Role, StaticCredentialVerifier,
};
pub use sla::{check_breach, Clock, FixedClock, SlaBreach, SlaPolicy, SystemClock};
pub use workflow::{
    plan_report_submission, validate_invoice_transition, validate_report_transition,
    validate_request_transition, ReportSubmission, TransitionError,
};
