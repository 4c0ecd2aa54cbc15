use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CustomerId, ProjectId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    OfficeManager,
    ProjectManager,
    Engineer,
    Accountant,
    DepartmentHead,
    Client,
    Guest,
}

impl Role {
    /// Parses a directory role name. Unknown names yield `None` and are
    /// dropped by the resolver rather than granting anything.
    pub fn parse(name: &str) -> Option<Self> {
        match normalize_key(name).as_str() {
            "administrator" => Some(Self::Administrator),
            "office_manager" => Some(Self::OfficeManager),
            "project_manager" => Some(Self::ProjectManager),
            "engineer" => Some(Self::Engineer),
            "accountant" => Some(Self::Accountant),
            "department_head" => Some(Self::DepartmentHead),
            "client" => Some(Self::Client),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "Administrator",
            Self::OfficeManager => "Office Manager",
            Self::ProjectManager => "Project Manager",
            Self::Engineer => "Engineer",
            Self::Accountant => "Accountant",
            Self::DepartmentHead => "Department Head",
            Self::Client => "Client",
            Self::Guest => "Guest",
        }
    }

    /// Roles allowed to close requests and approve/archive reports.
    pub fn is_manager_level(self) -> bool {
        matches!(self, Self::Administrator | Self::ProjectManager | Self::DepartmentHead)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Resolved actor for a single request. Built fresh on every call; scoping
/// attributes are present only when the role that uses them is held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub roles: BTreeSet<Role>,
    pub managed_project_ids: BTreeSet<ProjectId>,
    pub customer_id: Option<CustomerId>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_manager_role(&self) -> bool {
        self.roles.iter().any(|role| role.is_manager_level())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("credential could not be verified")]
    InvalidCredential,
    #[error("identity directory lookup failed: {0}")]
    LookupFailed(String),
}

/// Raw directory record before role mapping. Role names are whatever the
/// backing directory stores; unknown ones are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityRecord {
    pub roles: Vec<String>,
    pub managed_project_ids: Vec<ProjectId>,
    pub customer_id: Option<CustomerId>,
}

pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &SecretString) -> Result<UserId, AuthError>;
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn lookup(&self, user_id: &UserId) -> Result<IdentityRecord, AuthError>;
}

pub struct IdentityResolver<V, D> {
    verifier: V,
    directory: D,
}

impl<V, D> IdentityResolver<V, D>
where
    V: CredentialVerifier,
    D: IdentityDirectory,
{
    pub fn new(verifier: V, directory: D) -> Self {
        Self { verifier, directory }
    }

    pub async fn resolve(&self, token: &SecretString) -> Result<Principal, AuthError> {
        let user_id = self.verifier.verify(token)?;
        let record = self.directory.lookup(&user_id).await?;

        let roles: BTreeSet<Role> =
            record.roles.iter().filter_map(|name| Role::parse(name)).collect();

        // Scoping attributes only travel with the role that needs them, so
        // authorization for other roles never sees unrelated data.
        let managed_project_ids = if roles.contains(&Role::ProjectManager) {
            record.managed_project_ids.into_iter().collect()
        } else {
            BTreeSet::new()
        };
        let customer_id =
            if roles.contains(&Role::Client) { record.customer_id } else { None };

        Ok(Principal { id: user_id, roles, managed_project_ids, customer_id })
    }
}

/// Token table verifier for tests and single-node deployments.
#[derive(Default)]
pub struct StaticCredentialVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticCredentialVerifier {
    pub fn new(tokens: Vec<(String, UserId)>) -> Self {
        Self { tokens: tokens.into_iter().collect() }
    }
}

impl CredentialVerifier for StaticCredentialVerifier {
    fn verify(&self, token: &SecretString) -> Result<UserId, AuthError> {
        self.tokens.get(token.expose_secret()).cloned().ok_or(AuthError::InvalidCredential)
    }
}

#[derive(Default)]
pub struct InMemoryIdentityDirectory {
    records: HashMap<String, IdentityRecord>,
}

impl InMemoryIdentityDirectory {
    pub fn new(records: Vec<(UserId, IdentityRecord)>) -> Self {
        Self { records: records.into_iter().map(|(id, record)| (id.0, record)).collect() }
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn lookup(&self, user_id: &UserId) -> Result<IdentityRecord, AuthError> {
        self.records
            .get(&user_id.0)
            .cloned()
            .ok_or_else(|| AuthError::LookupFailed(format!("no directory entry for {}", user_id.0)))
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use crate::domain::{CustomerId, ProjectId, UserId};

    use super::{
        AuthError, CredentialVerifier, IdentityDirectory, IdentityRecord, IdentityResolver,
        InMemoryIdentityDirectory, Role, StaticCredentialVerifier,
    };

    fn resolver(
        record: IdentityRecord,
    ) -> IdentityResolver<StaticCredentialVerifier, InMemoryIdentityDirectory> {
        IdentityResolver::new(
            StaticCredentialVerifier::new(vec![(
                "tok-alice".to_string(),
                UserId("alice".to_string()),
            )]),
            InMemoryIdentityDirectory::new(vec![(UserId("alice".to_string()), record)]),
        )
    }

    fn token() -> SecretString {
        "tok-alice".to_string().into()
    }

    #[test]
    fn role_names_parse_with_directory_spelling() {
        assert_eq!(Role::parse("Office Manager"), Some(Role::OfficeManager));
        assert_eq!(Role::parse("project-manager"), Some(Role::ProjectManager));
        assert_eq!(Role::parse(" DEPARTMENT HEAD "), Some(Role::DepartmentHead));
        assert_eq!(Role::parse("System Manager"), None);
    }

    #[tokio::test]
    async fn resolve_builds_principal_with_role_scoped_attributes() {
        let resolver = resolver(IdentityRecord {
            roles: vec!["Project Manager".to_string(), "Engineer".to_string()],
            managed_project_ids: vec![ProjectId("PROJ-1".to_string())],
            customer_id: Some(CustomerId("CUST-9".to_string())),
        });

        let principal = resolver.resolve(&token()).await.expect("resolve");

        assert!(principal.has_role(Role::ProjectManager));
        assert!(principal.has_role(Role::Engineer));
        assert!(principal.managed_project_ids.contains(&ProjectId("PROJ-1".to_string())));
        // Client role is absent, so the customer id must not leak through.
        assert_eq!(principal.customer_id, None);
    }

    #[tokio::test]
    async fn client_scoping_travels_only_with_the_client_role() {
        let resolver = resolver(IdentityRecord {
            roles: vec!["Client".to_string()],
            managed_project_ids: vec![ProjectId("PROJ-1".to_string())],
            customer_id: Some(CustomerId("CUST-9".to_string())),
        });

        let principal = resolver.resolve(&token()).await.expect("resolve");

        assert_eq!(principal.customer_id, Some(CustomerId("CUST-9".to_string())));
        // And the inverse: no ProjectManager role, no managed projects.
        assert!(principal.managed_project_ids.is_empty());
    }

    #[tokio::test]
    async fn resolve_ignores_unknown_directory_roles() {
        let resolver = resolver(IdentityRecord {
            roles: vec!["System Manager".to_string(), "Engineer".to_string()],
            managed_project_ids: Vec::new(),
            customer_id: None,
        });

        let principal = resolver.resolve(&token()).await.expect("resolve");

        assert_eq!(principal.roles.len(), 1);
        assert!(principal.has_role(Role::Engineer));
    }

    #[tokio::test]
    async fn unknown_token_fails_with_invalid_credential() {
        let resolver = resolver(IdentityRecord {
            roles: vec!["Engineer".to_string()],
            managed_project_ids: Vec::new(),
            customer_id: None,
        });

        let error = resolver
            .resolve(&SecretString::from("tok-mallory".to_string()))
            .await
            .expect_err("must reject");
        assert_eq!(error, AuthError::InvalidCredential);
    }

    #[tokio::test]
    async fn missing_directory_entry_fails_with_lookup_error() {
        let verifier = StaticCredentialVerifier::new(vec![(
            "tok-ghost".to_string(),
            UserId("ghost".to_string()),
        )]);
        let directory = InMemoryIdentityDirectory::default();

        let error = IdentityResolver::new(verifier, directory)
            .resolve(&SecretString::from("tok-ghost".to_string()))
            .await
            .expect_err("must fail lookup");
        assert!(matches!(error, AuthError::LookupFailed(_)));
    }

    #[test]
    fn manager_level_roles() {
        assert!(Role::Administrator.is_manager_level());
        assert!(Role::ProjectManager.is_manager_level());
        assert!(Role::DepartmentHead.is_manager_level());
        assert!(!Role::Engineer.is_manager_level());
        assert!(!Role::OfficeManager.is_manager_level());
        assert!(!Role::Guest.is_manager_level());
    }

    #[test]
    fn static_verifier_rejects_unknown_token() {
        let verifier = StaticCredentialVerifier::default();
        let error = verifier
            .verify(&SecretString::from("anything".to_string()))
            .expect_err("empty table rejects");
        assert_eq!(error, AuthError::InvalidCredential);
    }

    #[tokio::test]
    async fn in_memory_directory_reports_missing_user() {
        let directory = InMemoryIdentityDirectory::default();
        let error = directory
            .lookup(&UserId("nobody".to_string()))
            .await
            .expect_err("missing entry");
        assert!(matches!(error, AuthError::LookupFailed(_)));
    }
}
