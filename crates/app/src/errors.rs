use thiserror::Error;

use fieldops_core::access::{AccessError, ResourceKind};
use fieldops_core::identity::{AuthError, Role};
use fieldops_core::workflow::TransitionError;
use fieldops_store::StoreError;

/// Application-facing error taxonomy. Every decision failure is surfaced
/// verbatim so the adapter layer can map it onto user-facing responses;
/// nothing is downgraded to a generic failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: String, id: String },
    #[error("illegal transition from {from} to {to}: {reason}")]
    IllegalTransition { from: String, to: String, reason: String },
    #[error("{role} visibility for {resource} is not implemented")]
    UnsupportedScope { role: Role, resource: ResourceKind },
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("identity directory lookup failed: {0}")]
    IdentityLookupFailed(String),
}

impl From<AccessError> for ServiceError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Unauthenticated => Self::Unauthenticated,
            AccessError::Forbidden { resource, action } => {
                Self::Forbidden(format!("not authorized to {action} {resource}"))
            }
            AccessError::UnsupportedScope { role, resource } => {
                Self::UnsupportedScope { role, resource }
            }
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredential => Self::Unauthenticated,
            AuthError::LookupFailed(message) => Self::IdentityLookupFailed(message),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::Illegal { from, to, reason } => {
                Self::IllegalTransition { from, to, reason }
            }
            TransitionError::RequiresManagerRole { from, to } => Self::Forbidden(format!(
                "transition from {from} to {to} requires a manager-level role"
            )),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { kind, id } => Self::NotFound { kind: kind.to_string(), id },
            StoreError::Conflict { kind, id } => {
                Self::StoreUnavailable(format!("concurrent update contention on {kind} `{id}`"))
            }
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::Decode(message) => {
                Self::StoreUnavailable(format!("corrupt record: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fieldops_core::access::{AccessError, Action, ResourceKind};
    use fieldops_core::identity::{AuthError, Role};
    use fieldops_core::workflow::TransitionError;
    use fieldops_store::StoreError;

    use super::ServiceError;

    #[test]
    fn access_errors_keep_their_identity() {
        assert!(matches!(
            ServiceError::from(AccessError::Unauthenticated),
            ServiceError::Unauthenticated
        ));
        assert!(matches!(
            ServiceError::from(AccessError::Forbidden {
                resource: ResourceKind::Invoice,
                action: Action::UpdateStatus,
            }),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            ServiceError::from(AccessError::UnsupportedScope {
                role: Role::Client,
                resource: ResourceKind::ServiceReport,
            }),
            ServiceError::UnsupportedScope { role: Role::Client, .. }
        ));
    }

    #[test]
    fn manager_gate_surfaces_as_forbidden_not_illegal() {
        let error = ServiceError::from(TransitionError::RequiresManagerRole {
            from: "Completed".to_string(),
            to: "Closed".to_string(),
        });
        assert!(matches!(error, ServiceError::Forbidden(_)));
    }

    #[test]
    fn transient_infrastructure_errors_stay_distinguishable() {
        assert!(matches!(
            ServiceError::from(StoreError::Unavailable("socket closed".to_string())),
            ServiceError::StoreUnavailable(_)
        ));
        assert!(matches!(
            ServiceError::from(AuthError::LookupFailed("directory timeout".to_string())),
            ServiceError::IdentityLookupFailed(_)
        ));
    }

    #[test]
    fn invalid_credentials_read_as_unauthenticated() {
        assert!(matches!(
            ServiceError::from(AuthError::InvalidCredential),
            ServiceError::Unauthenticated
        ));
    }
}
