use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::invoice::Invoice;
use crate::domain::report::ServiceReport;
use crate::domain::request::ServiceRequest;
use crate::domain::{CustomerId, ProjectId, UserId};
use crate::identity::{Principal, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ServiceRequest,
    ServiceReport,
    Invoice,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceRequest => "ServiceRequest",
            Self::ServiceReport => "ServiceReport",
            Self::Invoice => "Invoice",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Read,
    Create,
    UpdateStatus,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::UpdateStatus => "update-status",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("not authorized to {action} {resource}")]
    Forbidden { resource: ResourceKind, action: Action },
    #[error("{role} visibility for {resource} is not implemented")]
    UnsupportedScope { role: Role, resource: ResourceKind },
}

/// Visibility granted by a single policy rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadScope {
    All,
    ManagedProjects,
    AssignedSelf,
    OwnCustomer,
    /// Known role, but the filter needs a join the store boundary cannot
    /// express yet. Fails closed instead of granting anything.
    Unsupported,
}

/// List-query predicate derived from the principal's first matching rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Projects(BTreeSet<ProjectId>),
    AssignedEngineer(UserId),
    Customer(CustomerId),
    /// Scoping attribute missing (PM with no projects, Client without a
    /// customer link): list resolves to empty, single reads deny.
    Nothing,
}

impl RecordFilter {
    /// The one predicate shared by list filtering and single-record checks,
    /// so the two paths cannot diverge.
    pub fn permits(&self, scope: &RecordScope) -> bool {
        match self {
            Self::All => true,
            Self::Projects(ids) => {
                scope.project_id.as_ref().is_some_and(|project| ids.contains(project))
            }
            Self::AssignedEngineer(user) => scope.assigned_engineer_id.as_ref() == Some(user),
            Self::Customer(customer) => scope.customer_id.as_ref() == Some(customer),
            Self::Nothing => false,
        }
    }
}

/// The scoping fields of a loaded record, extracted so the policy engine
/// never needs the full entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordScope {
    pub project_id: Option<ProjectId>,
    pub customer_id: Option<CustomerId>,
    pub assigned_engineer_id: Option<UserId>,
}

impl RecordScope {
    pub fn of_request(request: &ServiceRequest) -> Self {
        Self {
            project_id: Some(request.project_id.clone()),
            customer_id: Some(request.customer_id.clone()),
            assigned_engineer_id: request.assigned_engineer_id.clone(),
        }
    }

    pub fn of_report(_report: &ServiceReport) -> Self {
        // Reports carry no direct scoping fields; only All-scoped roles can
        // see them until the request join lands.
        Self::default()
    }

    pub fn of_invoice(invoice: &Invoice) -> Self {
        Self {
            project_id: Some(invoice.project_id.clone()),
            customer_id: invoice.customer_id.clone(),
            assigned_engineer_id: None,
        }
    }
}

// Rule order reproduces the role precedence of the legacy routers: the first
// rule whose role the principal holds decides the scope.
const REQUEST_READ_RULES: &[(Role, ReadScope)] = &[
    (Role::Administrator, ReadScope::All),
    (Role::OfficeManager, ReadScope::All),
    (Role::ProjectManager, ReadScope::ManagedProjects),
    (Role::Engineer, ReadScope::AssignedSelf),
    (Role::Client, ReadScope::OwnCustomer),
];

const REPORT_READ_RULES: &[(Role, ReadScope)] = &[
    (Role::Administrator, ReadScope::All),
    (Role::DepartmentHead, ReadScope::All),
    (Role::ProjectManager, ReadScope::Unsupported),
    (Role::Engineer, ReadScope::Unsupported),
    (Role::Client, ReadScope::Unsupported),
];

const INVOICE_READ_RULES: &[(Role, ReadScope)] = &[
    (Role::Administrator, ReadScope::All),
    (Role::Accountant, ReadScope::All),
    (Role::OfficeManager, ReadScope::All),
    (Role::ProjectManager, ReadScope::ManagedProjects),
    (Role::Client, ReadScope::OwnCustomer),
];

const REQUEST_CREATE_ROLES: &[Role] =
    &[Role::Administrator, Role::OfficeManager, Role::ProjectManager, Role::Client];

const REQUEST_UPDATE_ROLES: &[Role] =
    &[Role::Administrator, Role::ProjectManager, Role::DepartmentHead, Role::Engineer];

const REPORT_CREATE_ROLES: &[Role] =
    &[Role::Administrator, Role::ProjectManager, Role::Engineer];

const REPORT_UPDATE_ROLES: &[Role] =
    &[Role::Administrator, Role::DepartmentHead, Role::ProjectManager, Role::Engineer];

const INVOICE_CREATE_ROLES: &[Role] =
    &[Role::Administrator, Role::OfficeManager, Role::ProjectManager];

const INVOICE_UPDATE_ROLES: &[Role] = &[Role::Administrator, Role::Accountant];

#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Coarse role gate. For reads this only proves *some* scope exists;
    /// list queries must still apply [`PolicyEngine::scope_filter`].
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        resource: ResourceKind,
        action: Action,
    ) -> Result<(), AccessError> {
        let principal = principal.ok_or(AccessError::Unauthenticated)?;
        match action {
            Action::Read => self.read_scope(principal, resource).map(|_| ()),
            Action::Create | Action::UpdateStatus => {
                let allowed = mutation_roles(resource, action);
                if allowed.iter().any(|role| principal.has_role(*role)) {
                    Ok(())
                } else {
                    Err(AccessError::Forbidden { resource, action })
                }
            }
        }
    }

    /// Predicate for list queries.
    pub fn scope_filter(
        &self,
        principal: Option<&Principal>,
        resource: ResourceKind,
    ) -> Result<RecordFilter, AccessError> {
        let principal = principal.ok_or(AccessError::Unauthenticated)?;
        let (role, scope) = self.read_scope(principal, resource)?;
        Ok(match scope {
            ReadScope::All => RecordFilter::All,
            ReadScope::ManagedProjects => {
                if principal.managed_project_ids.is_empty() {
                    RecordFilter::Nothing
                } else {
                    RecordFilter::Projects(principal.managed_project_ids.clone())
                }
            }
            ReadScope::AssignedSelf => RecordFilter::AssignedEngineer(principal.id.clone()),
            ReadScope::OwnCustomer => match principal.customer_id.clone() {
                Some(customer) => RecordFilter::Customer(customer),
                None => RecordFilter::Nothing,
            },
            ReadScope::Unsupported => {
                return Err(AccessError::UnsupportedScope { role, resource })
            }
        })
    }

    /// Re-derives the list-scope decision against a loaded record. Any
    /// record the scope filter would hide is denied here too.
    pub fn authorize_record(
        &self,
        principal: Option<&Principal>,
        resource: ResourceKind,
        action: Action,
        record: &RecordScope,
    ) -> Result<(), AccessError> {
        let principal = principal.ok_or(AccessError::Unauthenticated)?;
        match action {
            Action::Read => {
                let filter = self.scope_filter(Some(principal), resource)?;
                if filter.permits(record) {
                    Ok(())
                } else {
                    Err(AccessError::Forbidden { resource, action })
                }
            }
            Action::Create => self.authorize(Some(principal), resource, action),
            Action::UpdateStatus => {
                // An engineer may only touch requests assigned to them, even
                // when also holding a broader role.
                if resource == ResourceKind::ServiceRequest
                    && principal.has_role(Role::Engineer)
                    && record.assigned_engineer_id.as_ref() != Some(&principal.id)
                {
                    return Err(AccessError::Forbidden { resource, action });
                }
                self.authorize(Some(principal), resource, action)
            }
        }
    }

    fn read_scope(
        &self,
        principal: &Principal,
        resource: ResourceKind,
    ) -> Result<(Role, ReadScope), AccessError> {
        let rules = match resource {
            ResourceKind::ServiceRequest => REQUEST_READ_RULES,
            ResourceKind::ServiceReport => REPORT_READ_RULES,
            ResourceKind::Invoice => INVOICE_READ_RULES,
        };
        rules
            .iter()
            .find(|(role, _)| principal.has_role(*role))
            .copied()
            .ok_or(AccessError::Forbidden { resource, action: Action::Read })
    }
}

fn mutation_roles(resource: ResourceKind, action: Action) -> &'static [Role] {
    match (resource, action) {
        (ResourceKind::ServiceRequest, Action::Create) => REQUEST_CREATE_ROLES,
        (ResourceKind::ServiceRequest, Action::UpdateStatus) => REQUEST_UPDATE_ROLES,
        (ResourceKind::ServiceReport, Action::Create) => REPORT_CREATE_ROLES,
        (ResourceKind::ServiceReport, Action::UpdateStatus) => REPORT_UPDATE_ROLES,
        (ResourceKind::Invoice, Action::Create) => INVOICE_CREATE_ROLES,
        (ResourceKind::Invoice, Action::UpdateStatus) => INVOICE_UPDATE_ROLES,
        (_, Action::Read) => &[],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::domain::{CustomerId, ProjectId, UserId};
    use crate::identity::{Principal, Role};

    use super::{
        AccessError, Action, PolicyEngine, RecordFilter, RecordScope, ResourceKind,
    };

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            id: UserId("u-1".to_string()),
            roles: roles.iter().copied().collect(),
            managed_project_ids: BTreeSet::new(),
            customer_id: None,
        }
    }

    fn project_manager(projects: &[&str]) -> Principal {
        Principal {
            id: UserId("u-pm".to_string()),
            roles: [Role::ProjectManager].into_iter().collect(),
            managed_project_ids: projects
                .iter()
                .map(|id| ProjectId((*id).to_string()))
                .collect(),
            customer_id: None,
        }
    }

    fn client(customer: Option<&str>) -> Principal {
        Principal {
            id: UserId("u-client".to_string()),
            roles: [Role::Client].into_iter().collect(),
            managed_project_ids: BTreeSet::new(),
            customer_id: customer.map(|id| CustomerId(id.to_string())),
        }
    }

    fn request_scope(project: &str, customer: &str, engineer: Option<&str>) -> RecordScope {
        RecordScope {
            project_id: Some(ProjectId(project.to_string())),
            customer_id: Some(CustomerId(customer.to_string())),
            assigned_engineer_id: engineer.map(|id| UserId(id.to_string())),
        }
    }

    #[test]
    fn unauthenticated_is_distinct_from_forbidden() {
        let engine = PolicyEngine::new();

        let anonymous =
            engine.authorize(None, ResourceKind::Invoice, Action::UpdateStatus).expect_err("deny");
        assert_eq!(anonymous, AccessError::Unauthenticated);

        let engineer = principal(&[Role::Engineer]);
        let held = engine
            .authorize(Some(&engineer), ResourceKind::Invoice, Action::UpdateStatus)
            .expect_err("deny");
        assert_eq!(
            held,
            AccessError::Forbidden { resource: ResourceKind::Invoice, action: Action::UpdateStatus }
        );
    }

    #[test]
    fn guest_holds_no_grants() {
        let engine = PolicyEngine::new();
        let guest = principal(&[Role::Guest]);

        for resource in
            [ResourceKind::ServiceRequest, ResourceKind::ServiceReport, ResourceKind::Invoice]
        {
            for action in [Action::Read, Action::Create, Action::UpdateStatus] {
                assert!(
                    engine.authorize(Some(&guest), resource, action).is_err(),
                    "guest must be denied {action} on {resource}"
                );
            }
        }
    }

    #[test]
    fn request_read_scopes_follow_role_precedence() {
        let engine = PolicyEngine::new();

        assert_eq!(
            engine
                .scope_filter(Some(&principal(&[Role::Administrator])), ResourceKind::ServiceRequest)
                .expect("admin scope"),
            RecordFilter::All
        );
        assert_eq!(
            engine
                .scope_filter(Some(&principal(&[Role::OfficeManager])), ResourceKind::ServiceRequest)
                .expect("office manager scope"),
            RecordFilter::All
        );
        assert_eq!(
            engine
                .scope_filter(Some(&project_manager(&["PROJ-1"])), ResourceKind::ServiceRequest)
                .expect("pm scope"),
            RecordFilter::Projects([ProjectId("PROJ-1".to_string())].into_iter().collect())
        );
        assert_eq!(
            engine
                .scope_filter(Some(&principal(&[Role::Engineer])), ResourceKind::ServiceRequest)
                .expect("engineer scope"),
            RecordFilter::AssignedEngineer(UserId("u-1".to_string()))
        );
        assert_eq!(
            engine
                .scope_filter(Some(&client(Some("CUST-7"))), ResourceKind::ServiceRequest)
                .expect("client scope"),
            RecordFilter::Customer(CustomerId("CUST-7".to_string()))
        );
    }

    #[test]
    fn missing_scoping_attribute_collapses_to_empty_visibility() {
        let engine = PolicyEngine::new();

        assert_eq!(
            engine
                .scope_filter(Some(&project_manager(&[])), ResourceKind::ServiceRequest)
                .expect("pm without projects"),
            RecordFilter::Nothing
        );
        assert_eq!(
            engine
                .scope_filter(Some(&client(None)), ResourceKind::Invoice)
                .expect("client without customer link"),
            RecordFilter::Nothing
        );

        // Nothing hides every record on the single-read path too.
        let scope = request_scope("PROJ-1", "CUST-7", None);
        assert!(!RecordFilter::Nothing.permits(&scope));
    }

    #[test]
    fn report_scopes_fail_closed_for_unimplemented_roles() {
        let engine = PolicyEngine::new();

        for role in [Role::ProjectManager, Role::Engineer, Role::Client] {
            let error = engine
                .scope_filter(Some(&principal(&[role])), ResourceKind::ServiceReport)
                .expect_err("must fail closed");
            assert_eq!(
                error,
                AccessError::UnsupportedScope { role, resource: ResourceKind::ServiceReport }
            );
        }

        assert_eq!(
            engine
                .scope_filter(Some(&principal(&[Role::DepartmentHead])), ResourceKind::ServiceReport)
                .expect("department head sees all reports"),
            RecordFilter::All
        );
    }

    #[test]
    fn accountant_reads_invoices_but_not_requests() {
        let engine = PolicyEngine::new();
        let accountant = principal(&[Role::Accountant]);

        assert_eq!(
            engine.scope_filter(Some(&accountant), ResourceKind::Invoice).expect("invoice scope"),
            RecordFilter::All
        );
        assert!(engine
            .scope_filter(Some(&accountant), ResourceKind::ServiceRequest)
            .is_err());
    }

    #[test]
    fn single_record_read_agrees_with_list_scope() {
        let engine = PolicyEngine::new();
        let pm = project_manager(&["PROJ-1", "PROJ-2"]);

        let inside = request_scope("PROJ-2", "CUST-7", None);
        let outside = request_scope("PROJ-9", "CUST-7", None);

        let filter =
            engine.scope_filter(Some(&pm), ResourceKind::ServiceRequest).expect("pm filter");
        assert!(filter.permits(&inside));
        assert!(!filter.permits(&outside));

        assert!(engine
            .authorize_record(Some(&pm), ResourceKind::ServiceRequest, Action::Read, &inside)
            .is_ok());
        let denied = engine
            .authorize_record(Some(&pm), ResourceKind::ServiceRequest, Action::Read, &outside)
            .expect_err("out-of-scope record");
        assert_eq!(
            denied,
            AccessError::Forbidden { resource: ResourceKind::ServiceRequest, action: Action::Read }
        );
    }

    #[test]
    fn engineer_update_requires_assignment() {
        let engine = PolicyEngine::new();
        let engineer = Principal {
            id: UserId("eng-f".to_string()),
            roles: [Role::Engineer].into_iter().collect(),
            managed_project_ids: BTreeSet::new(),
            customer_id: None,
        };

        let own = request_scope("PROJ-1", "CUST-7", Some("eng-f"));
        let foreign = request_scope("PROJ-1", "CUST-7", Some("eng-e"));

        assert!(engine
            .authorize_record(
                Some(&engineer),
                ResourceKind::ServiceRequest,
                Action::UpdateStatus,
                &own
            )
            .is_ok());
        assert!(engine
            .authorize_record(
                Some(&engineer),
                ResourceKind::ServiceRequest,
                Action::UpdateStatus,
                &foreign
            )
            .is_err());
    }

    #[test]
    fn engineer_assignment_gate_applies_even_with_broader_roles() {
        let engine = PolicyEngine::new();
        let hybrid = Principal {
            id: UserId("eng-f".to_string()),
            roles: [Role::Engineer, Role::ProjectManager].into_iter().collect(),
            managed_project_ids: [ProjectId("PROJ-1".to_string())].into_iter().collect(),
            customer_id: None,
        };
        let foreign = request_scope("PROJ-1", "CUST-7", Some("eng-e"));

        assert!(engine
            .authorize_record(
                Some(&hybrid),
                ResourceKind::ServiceRequest,
                Action::UpdateStatus,
                &foreign
            )
            .is_err());
    }

    #[test]
    fn create_grants_match_policy_table() {
        let engine = PolicyEngine::new();

        assert!(engine
            .authorize(Some(&client(Some("CUST-7"))), ResourceKind::ServiceRequest, Action::Create)
            .is_ok());
        assert!(engine
            .authorize(Some(&principal(&[Role::Engineer])), ResourceKind::ServiceRequest, Action::Create)
            .is_err());
        assert!(engine
            .authorize(Some(&principal(&[Role::Engineer])), ResourceKind::ServiceReport, Action::Create)
            .is_ok());
        assert!(engine
            .authorize(Some(&client(Some("CUST-7"))), ResourceKind::Invoice, Action::Create)
            .is_err());
        assert!(engine
            .authorize(Some(&principal(&[Role::OfficeManager])), ResourceKind::Invoice, Action::Create)
            .is_ok());
    }

    #[test]
    fn invoice_status_updates_are_admin_and_accountant_only() {
        let engine = PolicyEngine::new();

        assert!(engine
            .authorize(Some(&principal(&[Role::Accountant])), ResourceKind::Invoice, Action::UpdateStatus)
            .is_ok());
        for role in [Role::OfficeManager, Role::ProjectManager, Role::DepartmentHead, Role::Client] {
            assert!(
                engine
                    .authorize(Some(&principal(&[role])), ResourceKind::Invoice, Action::UpdateStatus)
                    .is_err(),
                "{role} must not update invoice status"
            );
        }
    }

    #[test]
    fn any_held_role_grants_mutations() {
        let engine = PolicyEngine::new();
        let hybrid = principal(&[Role::Engineer, Role::Accountant]);

        // Engineer alone cannot touch invoices; Accountant alongside can.
        assert!(engine
            .authorize(Some(&hybrid), ResourceKind::Invoice, Action::UpdateStatus)
            .is_ok());
    }

    #[test]
    fn client_reads_only_own_customer_invoices() {
        let engine = PolicyEngine::new();
        let client = client(Some("CUST-7"));

        let own = RecordScope {
            project_id: Some(ProjectId("PROJ-1".to_string())),
            customer_id: Some(CustomerId("CUST-7".to_string())),
            assigned_engineer_id: None,
        };
        let foreign = RecordScope {
            project_id: Some(ProjectId("PROJ-1".to_string())),
            customer_id: Some(CustomerId("CUST-8".to_string())),
            assigned_engineer_id: None,
        };

        assert!(engine
            .authorize_record(Some(&client), ResourceKind::Invoice, Action::Read, &own)
            .is_ok());
        assert!(engine
            .authorize_record(Some(&client), ResourceKind::Invoice, Action::Read, &foreign)
            .is_err());
    }
}
